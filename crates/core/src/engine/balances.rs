//! Balance derivation and synchronization operations.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_shared::types::AccountId;
use tracing::info;

use super::{LedgerEngine, sync_accounts};
use crate::ledger::{Chart, LedgerError, TrialBalance};
use crate::ledger::balance::totals_by_account;
use crate::store::{LedgerStore, LedgerTx, LineScope};

/// Outcome of a synchronization run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSummary {
    /// Accounts compared.
    pub checked: usize,
    /// Accounts whose cached balance was rewritten.
    pub updated: usize,
}

/// Derived balance of an account: its own lines for a leaf, its descendant
/// leaves for a header.
pub(super) async fn derive_in_tx<T: LedgerTx>(
    tx: &mut T,
    account_id: AccountId,
    as_of: Option<NaiveDate>,
) -> Result<Decimal, LedgerError> {
    let accounts = tx.list_accounts().await?;
    let chart = Chart::new(&accounts);
    if chart.get(account_id).is_none() {
        return Err(LedgerError::AccountNotFound(account_id));
    }

    let leaves = chart.descendant_leaves(account_id);
    let mut scope = LineScope::accounts(leaves.iter().copied());
    scope.as_of = as_of;
    let totals = tx.posted_totals(&scope).await?;
    let totals = totals_by_account(&totals);

    Ok(leaves
        .iter()
        .filter_map(|id| chart.get(*id))
        .map(|leaf| {
            totals
                .get(&leaf.id)
                .map_or(Decimal::ZERO, |t| t.balance(leaf.account_type))
        })
        .sum())
}

impl<S: LedgerStore> LedgerEngine<S> {
    /// Derives an account's balance from posted lines.
    ///
    /// Read-only; the cached balance is not consulted.
    pub async fn derive_balance(&self, account_id: AccountId) -> Result<Decimal, LedgerError> {
        self.bounded("derive_balance", async move {
            let mut tx = self.store.begin().await?;
            derive_in_tx(&mut tx, account_id, None).await
        })
        .await
    }

    /// Derives an account's balance over entries dated on or before `date`.
    pub async fn derive_balance_as_of(
        &self,
        account_id: AccountId,
        date: NaiveDate,
    ) -> Result<Decimal, LedgerError> {
        self.bounded("derive_balance_as_of", async move {
            let mut tx = self.store.begin().await?;
            derive_in_tx(&mut tx, account_id, Some(date)).await
        })
        .await
    }

    /// Rewrites one account's cached balance from the ledger.
    ///
    /// For a header, every descendant leaf is synced and the roll-ups above
    /// them refreshed. Idempotent: a second call writes nothing.
    pub async fn sync_balance(&self, account_id: AccountId) -> Result<SyncSummary, LedgerError> {
        self.bounded("sync_balance", async move {
            let mut tx = self.store.begin().await?;
            let accounts = tx.list_accounts().await?;
            let (leaves, headers, lock_set) = {
                let chart = Chart::new(&accounts);
                let account = chart
                    .get(account_id)
                    .ok_or(LedgerError::AccountNotFound(account_id))?;
                let leaves = chart.descendant_leaves(account_id);
                let headers = if account.is_header { vec![account_id] } else { Vec::new() };
                let lock_set = chart.with_ancestors(leaves.iter().chain(&headers).copied());
                (leaves, headers, lock_set)
            };

            tx.lock_accounts(&lock_set).await?;
            let summary = sync_accounts(&mut tx, &leaves, &headers).await?;
            tx.commit().await?;

            if summary.updated > 0 {
                info!(%account_id, updated = summary.updated, "account balance synced");
            }
            Ok(summary)
        })
        .await
    }

    /// Rewrites every cached balance from the ledger.
    ///
    /// Produces the same balances as calling [`Self::sync_balance`] on every
    /// account, in one unit of work.
    pub async fn sync_all(&self) -> Result<SyncSummary, LedgerError> {
        self.bounded("sync_all", async move {
            let mut tx = self.store.begin().await?;
            let accounts = tx.list_accounts().await?;
            let ids: Vec<AccountId> = accounts.iter().map(|a| a.id).collect();
            let (leaves, headers): (Vec<_>, Vec<_>) = accounts.iter().partition(|a| !a.is_header);
            let leaves: Vec<AccountId> = leaves.into_iter().map(|a| a.id).collect();
            let headers: Vec<AccountId> = headers.into_iter().map(|a| a.id).collect();

            tx.lock_accounts(&ids).await?;
            let summary = sync_accounts(&mut tx, &leaves, &headers).await?;
            tx.commit().await?;

            info!(
                checked = summary.checked,
                updated = summary.updated,
                "all account balances synced"
            );
            Ok(summary)
        })
        .await
    }

    /// Trial balance over posted lines, optionally as of a date.
    pub async fn trial_balance(&self, as_of: Option<NaiveDate>) -> Result<TrialBalance, LedgerError> {
        self.bounded("trial_balance", async move {
            let mut tx = self.store.begin().await?;
            let accounts = tx.list_accounts().await?;
            let scope = LineScope {
                accounts: None,
                as_of,
            };
            let totals = tx.posted_totals(&scope).await?;
            Ok(TrialBalance::build(&accounts, &totals))
        })
        .await
    }
}
