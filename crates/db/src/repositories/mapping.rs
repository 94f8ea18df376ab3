//! Conversions between ledger domain types and database rows.

use sea_orm::{DbErr, RuntimeErr};
use tally_core::ledger::{
    self, Account, AccountingPeriod, JournalEntry, JournalLine, LedgerError,
};
use tally_shared::types::{AccountId, JournalEntryId, JournalLineId, PeriodId, UserId};

use crate::entities::{
    accounting_periods, accounts, journal_entries, journal_lines,
    sea_orm_active_enums::{AccountType, EntryStatus, SourceType},
};

// ========== Enums ==========

impl From<ledger::AccountType> for AccountType {
    fn from(value: ledger::AccountType) -> Self {
        match value {
            ledger::AccountType::Asset => Self::Asset,
            ledger::AccountType::Liability => Self::Liability,
            ledger::AccountType::Equity => Self::Equity,
            ledger::AccountType::Revenue => Self::Revenue,
            ledger::AccountType::Expense => Self::Expense,
        }
    }
}

impl From<AccountType> for ledger::AccountType {
    fn from(value: AccountType) -> Self {
        match value {
            AccountType::Asset => Self::Asset,
            AccountType::Liability => Self::Liability,
            AccountType::Equity => Self::Equity,
            AccountType::Revenue => Self::Revenue,
            AccountType::Expense => Self::Expense,
        }
    }
}

impl From<ledger::EntryStatus> for EntryStatus {
    fn from(value: ledger::EntryStatus) -> Self {
        match value {
            ledger::EntryStatus::Draft => Self::Draft,
            ledger::EntryStatus::Posted => Self::Posted,
            ledger::EntryStatus::Reversed => Self::Reversed,
        }
    }
}

impl From<EntryStatus> for ledger::EntryStatus {
    fn from(value: EntryStatus) -> Self {
        match value {
            EntryStatus::Draft => Self::Draft,
            EntryStatus::Posted => Self::Posted,
            EntryStatus::Reversed => Self::Reversed,
        }
    }
}

impl From<ledger::SourceType> for SourceType {
    fn from(value: ledger::SourceType) -> Self {
        match value {
            ledger::SourceType::Sale => Self::Sale,
            ledger::SourceType::Purchase => Self::Purchase,
            ledger::SourceType::CashBank => Self::CashBank,
            ledger::SourceType::Payment => Self::Payment,
            ledger::SourceType::Manual => Self::Manual,
            ledger::SourceType::Closing => Self::Closing,
            ledger::SourceType::Reversal => Self::Reversal,
        }
    }
}

impl From<SourceType> for ledger::SourceType {
    fn from(value: SourceType) -> Self {
        match value {
            SourceType::Sale => Self::Sale,
            SourceType::Purchase => Self::Purchase,
            SourceType::CashBank => Self::CashBank,
            SourceType::Payment => Self::Payment,
            SourceType::Manual => Self::Manual,
            SourceType::Closing => Self::Closing,
            SourceType::Reversal => Self::Reversal,
        }
    }
}

// ========== Rows ==========

impl From<accounts::Model> for Account {
    fn from(row: accounts::Model) -> Self {
        Self {
            id: AccountId::from_uuid(row.id),
            code: row.code,
            name: row.name,
            account_type: row.account_type.into(),
            parent_id: row.parent_id.map(AccountId::from_uuid),
            level: row.level,
            is_header: row.is_header,
            balance: row.balance,
            is_active: row.is_active,
            created_at: row.created_at.to_utc(),
            deleted_at: row.deleted_at.map(|at| at.to_utc()),
        }
    }
}

impl From<journal_entries::Model> for JournalEntry {
    fn from(row: journal_entries::Model) -> Self {
        Self {
            id: JournalEntryId::from_uuid(row.id),
            code: row.code,
            entry_date: row.entry_date,
            description: row.description,
            source_type: row.source_type.into(),
            source_id: row.source_id,
            status: row.status.into(),
            total_debit: row.total_debit,
            total_credit: row.total_credit,
            reversal_id: row.reversal_id.map(JournalEntryId::from_uuid),
            created_by: UserId::from_uuid(row.created_by),
            created_at: row.created_at.to_utc(),
            posted_by: row.posted_by.map(UserId::from_uuid),
            posted_at: row.posted_at.map(|at| at.to_utc()),
            deleted_at: row.deleted_at.map(|at| at.to_utc()),
        }
    }
}

impl From<journal_lines::Model> for JournalLine {
    fn from(row: journal_lines::Model) -> Self {
        Self {
            id: JournalLineId::from_uuid(row.id),
            journal_id: JournalEntryId::from_uuid(row.journal_id),
            account_id: AccountId::from_uuid(row.account_id),
            line_number: row.line_number,
            debit_amount: row.debit_amount,
            credit_amount: row.credit_amount,
            description: row.description,
        }
    }
}

impl From<accounting_periods::Model> for AccountingPeriod {
    fn from(row: accounting_periods::Model) -> Self {
        Self {
            id: PeriodId::from_uuid(row.id),
            name: row.name,
            start_date: row.start_date,
            end_date: row.end_date,
            is_closed: row.is_closed,
            total_revenue: row.total_revenue,
            total_expense: row.total_expense,
            net_income: row.net_income,
            closing_journal_id: row.closing_journal_id.map(JournalEntryId::from_uuid),
            closed_by: row.closed_by.map(UserId::from_uuid),
            closed_at: row.closed_at.map(|at| at.to_utc()),
        }
    }
}

// ========== Errors ==========

/// SQLSTATE of a PostgreSQL error, if the error came from the server.
fn sqlstate(err: &DbErr) -> Option<String> {
    let (DbErr::Query(RuntimeErr::SqlxError(inner))
    | DbErr::Exec(RuntimeErr::SqlxError(inner))
    | DbErr::Conn(RuntimeErr::SqlxError(inner))) = err
    else {
        return None;
    };
    inner
        .as_database_error()
        .and_then(|db| db.code())
        .map(std::borrow::Cow::into_owned)
}

/// Maps a database error onto the ledger error taxonomy.
///
/// Lock and serialization failures become retryable transaction errors.
pub(crate) fn map_db_err(err: DbErr) -> LedgerError {
    match sqlstate(&err).as_deref() {
        // lock_not_available
        Some("55P03") => LedgerError::LockTimeout,
        // serialization_failure, deadlock_detected
        Some("40001" | "40P01") => LedgerError::ConcurrentModification,
        _ => LedgerError::Database(err.to_string()),
    }
}
