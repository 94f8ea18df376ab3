//! In-memory ledger store.
//!
//! Units of work are serialized behind one async mutex. Each unit of work
//! edits a private copy of the state and swaps it in on commit, so a dropped
//! or failed unit of work leaves nothing behind.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tally_shared::types::{AccountId, JournalEntryId, PeriodId};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{LedgerStore, LedgerTx, LineScope};
use crate::ledger::{
    Account, AccountTotals, AccountingPeriod, EntryFilter, EntryTotals, JournalEntry, JournalLine,
    LedgerError,
};

#[derive(Debug, Clone, Default)]
struct LedgerState {
    accounts: BTreeMap<AccountId, Account>,
    entries: BTreeMap<JournalEntryId, JournalEntry>,
    lines: HashMap<JournalEntryId, Vec<JournalLine>>,
    periods: BTreeMap<PeriodId, AccountingPeriod>,
    sequence: i64,
}

impl LedgerState {
    fn live_account(&self, id: AccountId) -> Option<&Account> {
        self.accounts.get(&id).filter(|a| !a.is_deleted())
    }

    fn live_entry(&self, id: JournalEntryId) -> Option<&JournalEntry> {
        self.entries.get(&id).filter(|e| e.deleted_at.is_none())
    }

    fn contributing_entries(&self) -> impl Iterator<Item = &JournalEntry> {
        self.entries
            .values()
            .filter(|e| e.deleted_at.is_none() && e.status.contributes_to_balance())
    }
}

/// Ledger store kept in process memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<LedgerState>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Unit of work over a [`MemoryStore`].
#[derive(Debug)]
pub struct MemoryTx {
    guard: OwnedMutexGuard<LedgerState>,
    working: LedgerState,
}

#[async_trait]
impl LedgerStore for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx, LedgerError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();
        Ok(MemoryTx { guard, working })
    }
}

#[async_trait]
impl LedgerTx for MemoryTx {
    async fn insert_account(&mut self, account: &Account) -> Result<(), LedgerError> {
        let taken = self
            .working
            .accounts
            .values()
            .any(|a| !a.is_deleted() && a.code == account.code);
        if taken {
            return Err(LedgerError::DuplicateAccountCode(account.code.clone()));
        }
        self.working.accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn find_account(&mut self, id: AccountId) -> Result<Option<Account>, LedgerError> {
        Ok(self.working.live_account(id).cloned())
    }

    async fn find_account_by_code(&mut self, code: &str) -> Result<Option<Account>, LedgerError> {
        Ok(self
            .working
            .accounts
            .values()
            .find(|a| !a.is_deleted() && a.code == code)
            .cloned())
    }

    async fn list_accounts(&mut self) -> Result<Vec<Account>, LedgerError> {
        let mut accounts: Vec<_> = self
            .working
            .accounts
            .values()
            .filter(|a| !a.is_deleted())
            .cloned()
            .collect();
        accounts.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(accounts)
    }

    async fn lock_accounts(&mut self, ids: &[AccountId]) -> Result<Vec<Account>, LedgerError> {
        // the whole store is already held by this unit of work
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();
        ids.into_iter()
            .map(|id| {
                self.working
                    .live_account(id)
                    .cloned()
                    .ok_or(LedgerError::AccountNotFound(id))
            })
            .collect()
    }

    async fn update_account(&mut self, account: &Account) -> Result<(), LedgerError> {
        let stored = self
            .working
            .accounts
            .get_mut(&account.id)
            .ok_or(LedgerError::AccountNotFound(account.id))?;
        stored.name.clone_from(&account.name);
        stored.is_active = account.is_active;
        stored.deleted_at = account.deleted_at;
        Ok(())
    }

    async fn write_balance(&mut self, id: AccountId, balance: Decimal) -> Result<(), LedgerError> {
        let stored = self
            .working
            .accounts
            .get_mut(&id)
            .ok_or(LedgerError::AccountNotFound(id))?;
        stored.balance = balance;
        Ok(())
    }

    async fn account_has_lines(&mut self, id: AccountId) -> Result<bool, LedgerError> {
        let state = &self.working;
        Ok(state
            .entries
            .values()
            .filter(|e| e.deleted_at.is_none())
            .filter_map(|e| state.lines.get(&e.id))
            .flatten()
            .any(|l| l.account_id == id))
    }

    async fn next_entry_sequence(&mut self) -> Result<i64, LedgerError> {
        self.working.sequence += 1;
        Ok(self.working.sequence)
    }

    async fn insert_entry(
        &mut self,
        entry: &JournalEntry,
        lines: &[JournalLine],
    ) -> Result<(), LedgerError> {
        self.working.entries.insert(entry.id, entry.clone());
        self.working.lines.insert(entry.id, lines.to_vec());
        Ok(())
    }

    async fn find_entry(&mut self, id: JournalEntryId) -> Result<Option<JournalEntry>, LedgerError> {
        Ok(self.working.live_entry(id).cloned())
    }

    async fn lock_entry(&mut self, id: JournalEntryId) -> Result<Option<JournalEntry>, LedgerError> {
        Ok(self.working.live_entry(id).cloned())
    }

    async fn entry_lines(&mut self, id: JournalEntryId) -> Result<Vec<JournalLine>, LedgerError> {
        let mut lines = self.working.lines.get(&id).cloned().unwrap_or_default();
        lines.sort_by_key(|l| l.line_number);
        Ok(lines)
    }

    async fn update_entry(&mut self, entry: &JournalEntry) -> Result<(), LedgerError> {
        let stored = self
            .working
            .entries
            .get_mut(&entry.id)
            .ok_or(LedgerError::EntryNotFound(entry.id))?;
        *stored = entry.clone();
        Ok(())
    }

    async fn list_entries(&mut self, filter: &EntryFilter) -> Result<Vec<JournalEntry>, LedgerError> {
        let mut entries: Vec<_> = self
            .working
            .entries
            .values()
            .filter(|e| e.deleted_at.is_none() && filter.matches(e))
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.entry_date.cmp(&b.entry_date).then_with(|| a.code.cmp(&b.code)));
        Ok(entries)
    }

    async fn posted_totals(&mut self, scope: &LineScope) -> Result<Vec<AccountTotals>, LedgerError> {
        let state = &self.working;
        let mut sums: BTreeMap<AccountId, AccountTotals> = BTreeMap::new();
        for entry in state.contributing_entries() {
            let Some(lines) = state.lines.get(&entry.id) else {
                continue;
            };
            for line in lines.iter().filter(|l| scope.covers(l.account_id, entry.entry_date)) {
                let totals = sums
                    .entry(line.account_id)
                    .or_insert_with(|| AccountTotals::empty(line.account_id));
                totals.debit_total += line.debit_amount;
                totals.credit_total += line.credit_amount;
            }
        }
        Ok(sums.into_values().collect())
    }

    async fn posted_entry_totals(
        &mut self,
    ) -> Result<HashMap<JournalEntryId, EntryTotals>, LedgerError> {
        let state = &self.working;
        Ok(state
            .contributing_entries()
            .map(|entry| {
                let lines = state.lines.get(&entry.id).map_or(&[][..], Vec::as_slice);
                (entry.id, EntryTotals::of(lines))
            })
            .collect())
    }

    async fn insert_period(&mut self, period: &AccountingPeriod) -> Result<(), LedgerError> {
        self.working.periods.insert(period.id, period.clone());
        Ok(())
    }

    async fn find_period(&mut self, id: PeriodId) -> Result<Option<AccountingPeriod>, LedgerError> {
        Ok(self.working.periods.get(&id).cloned())
    }

    async fn lock_period(&mut self, id: PeriodId) -> Result<Option<AccountingPeriod>, LedgerError> {
        Ok(self.working.periods.get(&id).cloned())
    }

    async fn list_periods(&mut self) -> Result<Vec<AccountingPeriod>, LedgerError> {
        let mut periods: Vec<_> = self.working.periods.values().cloned().collect();
        periods.sort_by_key(|p| p.start_date);
        Ok(periods)
    }

    async fn update_period(&mut self, period: &AccountingPeriod) -> Result<(), LedgerError> {
        let stored = self
            .working
            .periods
            .get_mut(&period.id)
            .ok_or(LedgerError::PeriodNotFound(period.id))?;
        if stored.is_closed {
            return Err(LedgerError::AlreadyClosed(period.id));
        }
        *stored = period.clone();
        Ok(())
    }

    async fn commit(mut self) -> Result<(), LedgerError> {
        *self.guard = self.working;
        Ok(())
    }

    async fn rollback(self) -> Result<(), LedgerError> {
        Ok(())
    }
}
