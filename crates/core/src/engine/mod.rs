//! Ledger engine.
//!
//! [`LedgerEngine`] runs every public ledger operation as one unit of work on
//! a [`LedgerStore`], bounded by the configured transaction timeout. A unit of
//! work that fails or times out is dropped, which rolls it back.

mod accounts;
mod balances;
mod closing;
mod integrity;
mod posting;

#[cfg(test)]
mod tests;

use std::collections::{BTreeSet, HashMap};
use std::future::Future;

use chrono::Utc;
use rust_decimal::Decimal;
use tally_shared::LedgerConfig;
use tally_shared::types::{AccountId, JournalEntryId, UserId};
use tracing::{debug, warn};

use crate::ledger::balance::{expected_header_balances, totals_by_account};
use crate::ledger::entry::{entry_code, number_lines};
use crate::ledger::period::ensure_date_open;
use crate::ledger::validation::{AccountPolicy, validate_entry_with};
use crate::ledger::{
    Account, Chart, EntryStatus, EntryTotals, JournalEntry, JournalEntryDetail, JournalLine,
    LedgerError, LineAmounts, NewJournalEntry, PostingRules,
};
use crate::store::{LedgerStore, LedgerTx, LineScope};

pub use balances::SyncSummary;
pub use closing::{ClosingOutcome, ClosingPreview};

/// Orchestrates ledger operations over a store.
#[derive(Debug, Clone)]
pub struct LedgerEngine<S> {
    store: S,
    config: LedgerConfig,
}

impl<S: LedgerStore> LedgerEngine<S> {
    /// Creates an engine.
    #[must_use]
    pub fn new(store: S, config: LedgerConfig) -> Self {
        Self { store, config }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The engine configuration.
    #[must_use]
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Runs a unit of work under the transaction timeout.
    async fn bounded<T, F>(&self, operation: &'static str, work: F) -> Result<T, LedgerError>
    where
        F: Future<Output = Result<T, LedgerError>>,
    {
        let budget = self.config.transaction_timeout();
        if let Ok(result) = tokio::time::timeout(budget, work).await {
            result
        } else {
            warn!(operation, timeout_secs = budget.as_secs(), "ledger transaction timed out and was rolled back");
            Err(LedgerError::TransactionTimeout {
                secs: budget.as_secs(),
            })
        }
    }
}

/// Distinct accounts referenced by lines, ascending.
fn distinct_accounts<L: LineAmounts>(lines: &[L]) -> Vec<AccountId> {
    lines
        .iter()
        .map(LineAmounts::account_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Locks the given accounts plus every header above them in one call.
///
/// Unknown ids are skipped, so line validation can name the offending line.
async fn lock_with_ancestors<T: LedgerTx>(
    tx: &mut T,
    ids: &[AccountId],
) -> Result<HashMap<AccountId, Account>, LedgerError> {
    let accounts = tx.list_accounts().await?;
    let lock_set = {
        let chart = Chart::new(&accounts);
        chart.with_ancestors(ids.iter().copied().filter(|id| chart.get(*id).is_some()))
    };
    let locked = tx.lock_accounts(&lock_set).await?;
    Ok(locked.into_iter().map(|a| (a.id, a)).collect())
}

/// Reads the accounts referenced by lines without locking them.
async fn read_accounts<T: LedgerTx>(
    tx: &mut T,
    ids: &[AccountId],
) -> Result<HashMap<AccountId, Account>, LedgerError> {
    let mut accounts = HashMap::with_capacity(ids.len());
    for id in ids {
        if let Some(account) = tx.find_account(*id).await? {
            accounts.insert(account.id, account);
        }
    }
    Ok(accounts)
}

/// Stores a new draft with a generated code and lines numbered 1..n.
async fn insert_draft<T: LedgerTx>(
    tx: &mut T,
    input: NewJournalEntry,
) -> Result<JournalEntryDetail, LedgerError> {
    let sequence = tx.next_entry_sequence().await?;
    let id = JournalEntryId::new();
    let totals = EntryTotals::of(&input.lines);
    let lines = number_lines(id, &input.lines);
    let entry = JournalEntry {
        id,
        code: entry_code(input.source_type, input.entry_date, sequence),
        entry_date: input.entry_date,
        description: input.description,
        source_type: input.source_type,
        source_id: input.source_id,
        status: EntryStatus::Draft,
        total_debit: totals.debit,
        total_credit: totals.credit,
        reversal_id: None,
        created_by: input.created_by,
        created_at: Utc::now(),
        posted_by: None,
        posted_at: None,
        deleted_at: None,
    };
    tx.insert_entry(&entry, &lines).await?;
    Ok(JournalEntryDetail { entry, lines })
}

/// Posts a draft inside the caller's unit of work.
///
/// Re-validates the stored lines against the locked accounts, stamps the
/// entry, and synchronizes every touched account. The caller holds the locks.
async fn post_in_tx<T: LedgerTx>(
    tx: &mut T,
    entry: &mut JournalEntry,
    lines: &[JournalLine],
    posted_by: UserId,
    locked: &HashMap<AccountId, Account>,
    policy: AccountPolicy,
) -> Result<(), LedgerError> {
    PostingRules::ensure_postable(entry)?;
    let totals = validate_entry_with(lines, locked, policy)?;
    let periods = tx.list_periods().await?;
    ensure_date_open(entry.entry_date, &periods)?;

    entry.status = EntryStatus::Posted;
    entry.total_debit = totals.debit;
    entry.total_credit = totals.credit;
    entry.posted_by = Some(posted_by);
    entry.posted_at = Some(Utc::now());
    tx.update_entry(entry).await?;

    sync_accounts(tx, &distinct_accounts(lines), &[]).await?;
    Ok(())
}

/// Rewrites cached balances from the ledger.
///
/// Leaves are derived from posted lines, then every header above them (plus
/// `headers`) gets the roll-up of its children. Writes only what changed.
/// The caller holds the locks.
async fn sync_accounts<T: LedgerTx>(
    tx: &mut T,
    leaves: &[AccountId],
    headers: &[AccountId],
) -> Result<SyncSummary, LedgerError> {
    let mut summary = SyncSummary::default();

    let accounts = tx.list_accounts().await?;
    let totals = tx.posted_totals(&LineScope::accounts(leaves.iter().copied())).await?;
    let totals = totals_by_account(&totals);

    let mut header_set: BTreeSet<AccountId> = headers.iter().copied().collect();
    let mut writes = Vec::new();
    {
        let chart = Chart::new(&accounts);
        for id in leaves {
            let Some(account) = chart.get(*id).filter(|a| !a.is_header) else {
                continue;
            };
            header_set.extend(chart.ancestors(account.id));
            summary.checked += 1;
            let derived = totals
                .get(&account.id)
                .map_or(Decimal::ZERO, |t| t.balance(account.account_type));
            if account.balance == derived {
                debug!(account_code = %account.code, balance = %derived, "balance already in sync");
            } else {
                debug!(account_code = %account.code, cached = %account.balance, derived = %derived, "cached balance rewritten");
                writes.push((account.id, derived));
            }
        }
    }
    for (id, balance) in writes {
        tx.write_balance(id, balance).await?;
        summary.updated += 1;
    }

    if header_set.is_empty() {
        return Ok(summary);
    }

    let accounts = tx.list_accounts().await?;
    let expected = expected_header_balances(&accounts);
    let mut writes = Vec::new();
    for account in accounts.iter().filter(|a| header_set.contains(&a.id) && a.is_header) {
        summary.checked += 1;
        let rollup = expected.get(&account.id).copied().unwrap_or_default();
        if account.balance != rollup {
            debug!(account_code = %account.code, cached = %account.balance, rollup = %rollup, "header roll-up rewritten");
            writes.push((account.id, rollup));
        }
    }
    for (id, balance) in writes {
        tx.write_balance(id, balance).await?;
        summary.updated += 1;
    }

    Ok(summary)
}
