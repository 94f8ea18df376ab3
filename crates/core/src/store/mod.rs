//! Storage seam for the ledger engine.
//!
//! A [`LedgerStore`] hands out [`LedgerTx`] units of work. Everything a unit
//! of work writes becomes visible atomically on [`LedgerTx::commit`]; dropping
//! it without committing rolls it back. Mutating engine operations take every
//! account lock they need through a single [`LedgerTx::lock_accounts`] call,
//! which locks in ascending id order.

pub mod memory;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use tally_shared::types::{AccountId, JournalEntryId, PeriodId};

use crate::ledger::{
    Account, AccountTotals, AccountingPeriod, EntryFilter, EntryTotals, JournalEntry, JournalLine,
    LedgerError,
};

pub use memory::MemoryStore;

/// Which posted lines a totals query covers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineScope {
    /// Restrict to these accounts; `None` means every account.
    pub accounts: Option<Vec<AccountId>>,
    /// Only entries dated on or before this day.
    pub as_of: Option<NaiveDate>,
}

impl LineScope {
    /// Every posted line.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Posted lines of the given accounts.
    #[must_use]
    pub fn accounts(ids: impl IntoIterator<Item = AccountId>) -> Self {
        Self {
            accounts: Some(ids.into_iter().collect()),
            as_of: None,
        }
    }

    /// Restricts the scope to entries dated on or before `date`.
    #[must_use]
    pub fn as_of(mut self, date: NaiveDate) -> Self {
        self.as_of = Some(date);
        self
    }

    /// Returns true if lines of this account dated `date` are in scope.
    #[must_use]
    pub fn covers(&self, account_id: AccountId, date: NaiveDate) -> bool {
        self.accounts.as_ref().is_none_or(|ids| ids.contains(&account_id))
            && self.as_of.is_none_or(|limit| date <= limit)
    }
}

/// Opens units of work.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// The unit-of-work type.
    type Tx: LedgerTx;

    /// Opens a unit of work.
    async fn begin(&self) -> Result<Self::Tx, LedgerError>;
}

/// One atomic unit of work over the ledger tables.
///
/// Reads of soft-deleted rows return nothing. Lists are ordered: accounts by
/// code, entries by date then code, periods by start date.
#[async_trait]
pub trait LedgerTx: Send + Sized {
    // ========== Accounts ==========

    /// Inserts a new account.
    async fn insert_account(&mut self, account: &Account) -> Result<(), LedgerError>;

    /// Reads a live account.
    async fn find_account(&mut self, id: AccountId) -> Result<Option<Account>, LedgerError>;

    /// Reads the live account carrying `code`.
    async fn find_account_by_code(&mut self, code: &str) -> Result<Option<Account>, LedgerError>;

    /// Every live account.
    async fn list_accounts(&mut self) -> Result<Vec<Account>, LedgerError>;

    /// Locks the given live accounts for the rest of the unit of work, in
    /// ascending id order, and returns them in that order.
    ///
    /// Fails with `AccountNotFound` if any id is unknown or deleted.
    async fn lock_accounts(&mut self, ids: &[AccountId]) -> Result<Vec<Account>, LedgerError>;

    /// Persists name, active flag and tombstone of an account.
    async fn update_account(&mut self, account: &Account) -> Result<(), LedgerError>;

    /// Writes the cached balance column.
    async fn write_balance(&mut self, id: AccountId, balance: Decimal) -> Result<(), LedgerError>;

    /// Returns true if any journal line of a live entry references the account.
    async fn account_has_lines(&mut self, id: AccountId) -> Result<bool, LedgerError>;

    // ========== Journal entries ==========

    /// Next value of the store-wide entry code sequence.
    async fn next_entry_sequence(&mut self) -> Result<i64, LedgerError>;

    /// Inserts an entry with its lines.
    async fn insert_entry(
        &mut self,
        entry: &JournalEntry,
        lines: &[JournalLine],
    ) -> Result<(), LedgerError>;

    /// Reads a live entry.
    async fn find_entry(&mut self, id: JournalEntryId) -> Result<Option<JournalEntry>, LedgerError>;

    /// Reads and locks a live entry.
    async fn lock_entry(&mut self, id: JournalEntryId) -> Result<Option<JournalEntry>, LedgerError>;

    /// Lines of an entry ordered by line number.
    async fn entry_lines(&mut self, id: JournalEntryId) -> Result<Vec<JournalLine>, LedgerError>;

    /// Persists status, totals, reversal link, posting stamps and tombstone.
    async fn update_entry(&mut self, entry: &JournalEntry) -> Result<(), LedgerError>;

    /// Live entries passing the filter.
    async fn list_entries(&mut self, filter: &EntryFilter) -> Result<Vec<JournalEntry>, LedgerError>;

    // ========== Derivation ==========

    /// Per-account debit/credit sums over lines of contributing entries.
    ///
    /// Accounts without lines in scope are omitted.
    async fn posted_totals(&mut self, scope: &LineScope) -> Result<Vec<AccountTotals>, LedgerError>;

    /// Per-entry line sums over every contributing entry.
    async fn posted_entry_totals(
        &mut self,
    ) -> Result<HashMap<JournalEntryId, EntryTotals>, LedgerError>;

    // ========== Periods ==========

    /// Inserts a new period.
    async fn insert_period(&mut self, period: &AccountingPeriod) -> Result<(), LedgerError>;

    /// Reads a period.
    async fn find_period(&mut self, id: PeriodId) -> Result<Option<AccountingPeriod>, LedgerError>;

    /// Reads and locks a period.
    async fn lock_period(&mut self, id: PeriodId) -> Result<Option<AccountingPeriod>, LedgerError>;

    /// Every period.
    async fn list_periods(&mut self) -> Result<Vec<AccountingPeriod>, LedgerError>;

    /// Persists the closing snapshot of a period.
    ///
    /// Fails with `AlreadyClosed` if the stored period is already closed.
    async fn update_period(&mut self, period: &AccountingPeriod) -> Result<(), LedgerError>;

    // ========== Boundary ==========

    /// Makes every write visible.
    async fn commit(self) -> Result<(), LedgerError>;

    /// Discards every write.
    async fn rollback(self) -> Result<(), LedgerError>;
}
