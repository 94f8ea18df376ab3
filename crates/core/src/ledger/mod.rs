//! Double-entry bookkeeping rules.
//!
//! Everything here is pure: no storage, no clock-dependent decisions.
//! - Account types and the normal-balance sign rule
//! - Journal entry validation
//! - Balance derivation and header roll-ups
//! - Entry lifecycle and reversal lines
//! - Period ordering and the closing plan
//! - Reconciliation reports

pub mod account;
pub mod balance;
pub mod closing;
pub mod entry;
pub mod error;
pub mod period;
pub mod posting;
pub mod reconciliation;
pub mod types;
pub mod validation;

#[cfg(test)]
mod closing_props;
#[cfg(test)]
mod reversal_props;
#[cfg(test)]
mod validation_props;

pub use account::{Account, Chart, NewAccount};
pub use balance::{AccountTotals, TrialBalance, TrialBalanceRow, derive_balance};
pub use closing::{ClosingBalance, ClosingPlan};
pub use entry::{
    EntryFilter, JournalEntry, JournalEntryDetail, JournalLine, JournalLineInput, LineAmounts,
    NewJournalEntry,
};
pub use error::{ErrorKind, LedgerError};
pub use period::AccountingPeriod;
pub use posting::PostingRules;
pub use reconciliation::{AccountCheck, BalanceSheetCheck, DriftError, EntryCheck, IntegrityReport};
pub use types::{AccountType, EntryStatus, NormalBalance, SourceType};
pub use validation::EntryTotals;
