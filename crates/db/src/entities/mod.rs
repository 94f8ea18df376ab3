//! `SeaORM` entities for the ledger tables.

pub mod accounting_periods;
pub mod accounts;
pub mod journal_entries;
pub mod journal_lines;
pub mod sea_orm_active_enums;
