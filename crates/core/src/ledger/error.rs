//! Ledger error types.
//!
//! Every engine operation fails with a [`LedgerError`]. Variants are grouped
//! into the [`ErrorKind`] families callers branch on: validation failures are
//! rejected before any mutation, state errors reject an illegal lifecycle
//! transition, drift blocks period closing, and transaction errors are
//! retried at the unit-of-work boundary.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tally_shared::types::{AccountId, JournalEntryId, PeriodId};
use thiserror::Error;

use super::types::EntryStatus;

/// Error family of a [`LedgerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input; safe to retry after correction.
    Validation,
    /// Operation not allowed in the current lifecycle state.
    State,
    /// Cached state diverges from the ledger of record.
    Drift,
    /// Referenced record does not exist.
    NotFound,
    /// Storage transaction failed; retry the whole unit of work.
    Transaction,
}

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    // ========== Validation Errors ==========
    /// Entry must have at least 2 lines.
    #[error("Journal entry must have at least 2 lines")]
    InsufficientLines,

    /// Entry is not balanced (debits != credits).
    #[error("Journal entry is unbalanced. Debit: {debit}, Credit: {credit}")]
    UnbalancedEntry {
        /// Total debit amount.
        debit: Decimal,
        /// Total credit amount.
        credit: Decimal,
    },

    /// Line carries neither a debit nor a credit.
    #[error("Line {line}: amount cannot be zero")]
    ZeroAmount {
        /// 1-based line number.
        line: usize,
    },

    /// Line carries a negative amount.
    #[error("Line {line}: amount cannot be negative")]
    NegativeAmount {
        /// 1-based line number.
        line: usize,
    },

    /// Line carries both a debit and a credit.
    #[error("Line {line}: must specify either debit or credit, not both")]
    DebitAndCredit {
        /// 1-based line number.
        line: usize,
    },

    /// Line amount has more decimal places than the currency allows.
    #[error("Line {line}: amount {amount} has more than 2 decimal places")]
    ExcessPrecision {
        /// 1-based line number.
        line: usize,
        /// The offending amount.
        amount: Decimal,
    },

    /// Line references an account that does not exist or was deleted.
    #[error("Line {line}: account {account_id} does not exist")]
    UnknownAccount {
        /// 1-based line number.
        line: usize,
        /// The referenced account.
        account_id: AccountId,
    },

    /// Line posts to a header (group) account.
    #[error("Line {line}: account {code} is a header account and cannot receive postings")]
    HeaderAccountPosting {
        /// 1-based line number.
        line: usize,
        /// Account code.
        code: String,
    },

    /// Line posts to an inactive account.
    #[error("Line {line}: account {code} is inactive")]
    AccountInactive {
        /// 1-based line number.
        line: usize,
        /// Account code.
        code: String,
    },

    /// Account code is empty.
    #[error("Account code cannot be empty")]
    EmptyAccountCode,

    /// Account code already used by a live account.
    #[error("Account code {0} already exists")]
    DuplicateAccountCode(String),

    /// Parent account is missing, not a header, or of another type.
    #[error("Invalid parent account {0}: parent must be a header account of the same type")]
    InvalidParent(String),

    /// Period start is after its end.
    #[error("Invalid period range: {start} is after {end}")]
    InvalidPeriodRange {
        /// Period start date.
        start: NaiveDate,
        /// Period end date.
        end: NaiveDate,
    },

    /// Period overlaps an existing one.
    #[error("Period {start}..={end} overlaps an existing period")]
    OverlappingPeriod {
        /// Period start date.
        start: NaiveDate,
        /// Period end date.
        end: NaiveDate,
    },

    /// Reversal requested without a reason.
    #[error("A reason is required to reverse a journal entry")]
    ReversalReasonRequired,

    // ========== State Errors ==========
    /// Entry must be a draft for this operation.
    #[error("Journal entry {entry_id} is {status}, expected DRAFT")]
    NotDraft {
        /// The entry.
        entry_id: JournalEntryId,
        /// Its current status.
        status: EntryStatus,
    },

    /// Only posted entries can be reversed.
    #[error("Journal entry {entry_id} is {status}, only POSTED entries can be reversed")]
    NotPosted {
        /// The entry.
        entry_id: JournalEntryId,
        /// Its current status.
        status: EntryStatus,
    },

    /// Entry was already reversed, or is itself a reversal.
    #[error("Journal entry {0} already has a reversal link")]
    AlreadyReversed(JournalEntryId),

    /// Entry date falls inside a closed accounting period.
    #[error("Date {0} falls inside a closed accounting period")]
    PeriodClosed(NaiveDate),

    /// Period was already closed.
    #[error("Accounting period {0} is already closed")]
    AlreadyClosed(PeriodId),

    /// An earlier period is still open.
    #[error("Cannot close period {period_id}: earlier period {open_period_id} is still open")]
    PeriodOrder {
        /// The period being closed.
        period_id: PeriodId,
        /// The earliest open period before it.
        open_period_id: PeriodId,
    },

    /// Account still carries a balance.
    #[error("Account {code} has a non-zero balance of {balance}")]
    AccountHasBalance {
        /// Account code.
        code: String,
        /// Derived balance.
        balance: Decimal,
    },

    /// Account is referenced by journal lines.
    #[error("Account {0} is referenced by journal lines")]
    AccountInUse(String),

    /// Header account still has live children.
    #[error("Header account {0} still has child accounts")]
    AccountHasChildren(String),

    // ========== Drift Errors ==========
    /// Cached balances diverge from the ledger.
    #[error("Balance drift detected on {count} account(s); heal before closing")]
    DriftDetected {
        /// Number of drifted accounts.
        count: usize,
    },

    // ========== Not Found Errors ==========
    /// Account not found.
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// No live account carries this code.
    #[error("Account code not found: {0}")]
    AccountCodeNotFound(String),

    /// Journal entry not found.
    #[error("Journal entry not found: {0}")]
    EntryNotFound(JournalEntryId),

    /// Accounting period not found.
    #[error("Accounting period not found: {0}")]
    PeriodNotFound(PeriodId),

    /// Retained earnings account is missing or unusable.
    #[error("Retained earnings account {0} not found (must be an active EQUITY leaf)")]
    RetainedEarningsNotFound(String),

    // ========== Transaction Errors ==========
    /// Unit of work exceeded its time budget and was rolled back.
    #[error("Ledger transaction timed out after {secs}s and was rolled back")]
    TransactionTimeout {
        /// The configured budget in seconds.
        secs: u64,
    },

    /// Row lock could not be acquired in time.
    #[error("Timed out waiting for a row lock, please retry")]
    LockTimeout,

    /// Concurrent modification detected.
    #[error("Concurrent modification detected, please retry")]
    ConcurrentModification,

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),
}

impl LedgerError {
    /// Returns the error family.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InsufficientLines
            | Self::UnbalancedEntry { .. }
            | Self::ZeroAmount { .. }
            | Self::NegativeAmount { .. }
            | Self::DebitAndCredit { .. }
            | Self::ExcessPrecision { .. }
            | Self::UnknownAccount { .. }
            | Self::HeaderAccountPosting { .. }
            | Self::AccountInactive { .. }
            | Self::EmptyAccountCode
            | Self::DuplicateAccountCode(_)
            | Self::InvalidParent(_)
            | Self::InvalidPeriodRange { .. }
            | Self::OverlappingPeriod { .. }
            | Self::ReversalReasonRequired => ErrorKind::Validation,

            Self::NotDraft { .. }
            | Self::NotPosted { .. }
            | Self::AlreadyReversed(_)
            | Self::PeriodClosed(_)
            | Self::AlreadyClosed(_)
            | Self::PeriodOrder { .. }
            | Self::AccountHasBalance { .. }
            | Self::AccountInUse(_)
            | Self::AccountHasChildren(_) => ErrorKind::State,

            Self::DriftDetected { .. } => ErrorKind::Drift,

            Self::AccountNotFound(_)
            | Self::AccountCodeNotFound(_)
            | Self::EntryNotFound(_)
            | Self::PeriodNotFound(_)
            | Self::RetainedEarningsNotFound(_) => ErrorKind::NotFound,

            Self::TransactionTimeout { .. }
            | Self::LockTimeout
            | Self::ConcurrentModification
            | Self::Database(_) => ErrorKind::Transaction,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InsufficientLines => "INSUFFICIENT_LINES",
            Self::UnbalancedEntry { .. } => "UNBALANCED_ENTRY",
            Self::ZeroAmount { .. } => "ZERO_AMOUNT",
            Self::NegativeAmount { .. } => "NEGATIVE_AMOUNT",
            Self::DebitAndCredit { .. } => "DEBIT_AND_CREDIT",
            Self::ExcessPrecision { .. } => "EXCESS_PRECISION",
            Self::UnknownAccount { .. } => "UNKNOWN_ACCOUNT",
            Self::HeaderAccountPosting { .. } => "HEADER_ACCOUNT_POSTING",
            Self::AccountInactive { .. } => "ACCOUNT_INACTIVE",
            Self::EmptyAccountCode => "EMPTY_ACCOUNT_CODE",
            Self::DuplicateAccountCode(_) => "DUPLICATE_ACCOUNT_CODE",
            Self::InvalidParent(_) => "INVALID_PARENT",
            Self::InvalidPeriodRange { .. } => "INVALID_PERIOD_RANGE",
            Self::OverlappingPeriod { .. } => "OVERLAPPING_PERIOD",
            Self::ReversalReasonRequired => "REVERSAL_REASON_REQUIRED",
            Self::NotDraft { .. } => "NOT_DRAFT",
            Self::NotPosted { .. } => "NOT_POSTED",
            Self::AlreadyReversed(_) => "ALREADY_REVERSED",
            Self::PeriodClosed(_) => "PERIOD_CLOSED",
            Self::AlreadyClosed(_) => "ALREADY_CLOSED",
            Self::PeriodOrder { .. } => "PERIOD_ORDER",
            Self::AccountHasBalance { .. } => "ACCOUNT_HAS_BALANCE",
            Self::AccountInUse(_) => "ACCOUNT_IN_USE",
            Self::AccountHasChildren(_) => "ACCOUNT_HAS_CHILDREN",
            Self::DriftDetected { .. } => "DRIFT_DETECTED",
            Self::AccountNotFound(_) | Self::AccountCodeNotFound(_) => "ACCOUNT_NOT_FOUND",
            Self::EntryNotFound(_) => "ENTRY_NOT_FOUND",
            Self::PeriodNotFound(_) => "PERIOD_NOT_FOUND",
            Self::RetainedEarningsNotFound(_) => "RETAINED_EARNINGS_NOT_FOUND",
            Self::TransactionTimeout { .. } => "TRANSACTION_TIMEOUT",
            Self::LockTimeout => "LOCK_TIMEOUT",
            Self::ConcurrentModification => "CONCURRENT_MODIFICATION",
            Self::Database(_) => "DATABASE_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self.kind() {
            // 400 Bad Request - validation errors
            ErrorKind::Validation => 400,
            // 404 Not Found
            ErrorKind::NotFound => 404,
            // 409 Conflict - lifecycle and drift conflicts
            ErrorKind::State | ErrorKind::Drift => 409,
            ErrorKind::Transaction => match self {
                // 503 Service Unavailable - retry later
                Self::TransactionTimeout { .. } | Self::LockTimeout => 503,
                Self::ConcurrentModification => 409,
                // 500 Internal Server Error
                _ => 500,
            },
        }
    }

    /// Returns true if the whole unit of work may be retried as is.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transaction
    }
}
