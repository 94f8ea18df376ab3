//! PostgreSQL implementation of the ledger store.
//!
//! Every unit of work is one database transaction. Row locks are taken with
//! `SELECT ... FOR UPDATE`, accounts always in ascending id order, and the
//! wait for any lock is bounded by `lock_timeout`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    DbBackend, EntityTrait, FromQueryResult, JoinType, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, RelationTrait, Select, Set, SqlErr, Statement, TransactionTrait, Unchanged,
};
use tally_core::ledger::{
    Account, AccountTotals, AccountingPeriod, EntryFilter, EntryTotals, JournalEntry, JournalLine,
    LedgerError,
};
use tally_core::store::{LedgerStore, LedgerTx, LineScope};
use tally_shared::LedgerConfig;
use tally_shared::types::{AccountId, JournalEntryId, PeriodId};
use tracing::debug;
use uuid::Uuid;

use super::mapping::map_db_err;
use crate::entities::{
    accounting_periods, accounts, journal_entries, journal_lines,
    sea_orm_active_enums::{EntryStatus, SourceType},
};

/// Ledger store backed by PostgreSQL.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    db: DatabaseConnection,
    lock_timeout_ms: u64,
}

impl LedgerRepository {
    /// Creates a new ledger repository.
    #[must_use]
    pub fn new(db: DatabaseConnection, config: &LedgerConfig) -> Self {
        Self {
            db,
            lock_timeout_ms: config.lock_timeout_ms,
        }
    }
}

#[async_trait]
impl LedgerStore for LedgerRepository {
    type Tx = LedgerTransaction;

    async fn begin(&self) -> Result<LedgerTransaction, LedgerError> {
        let txn = self.db.begin().await.map_err(map_db_err)?;
        txn.execute_unprepared(&format!("SET LOCAL lock_timeout = '{}ms'", self.lock_timeout_ms))
            .await
            .map_err(map_db_err)?;
        Ok(LedgerTransaction { txn })
    }
}

/// One database transaction over the ledger tables.
///
/// Dropping it without committing rolls the transaction back.
pub struct LedgerTransaction {
    txn: DatabaseTransaction,
}

#[derive(Debug, FromQueryResult)]
struct AccountTotalsRow {
    account_id: Uuid,
    debit_total: Decimal,
    credit_total: Decimal,
}

#[derive(Debug, FromQueryResult)]
struct EntryTotalsRow {
    journal_id: Uuid,
    debit_total: Decimal,
    credit_total: Decimal,
}

/// Lines of live entries that count towards balances.
fn contributing_lines() -> Select<journal_lines::Entity> {
    journal_lines::Entity::find()
        .join(JoinType::InnerJoin, journal_lines::Relation::JournalEntries.def())
        .filter(journal_entries::Column::DeletedAt.is_null())
        .filter(journal_entries::Column::Status.is_in([EntryStatus::Posted, EntryStatus::Reversed]))
}

fn live_accounts() -> Select<accounts::Entity> {
    accounts::Entity::find().filter(accounts::Column::DeletedAt.is_null())
}

fn live_entries() -> Select<journal_entries::Entity> {
    journal_entries::Entity::find().filter(journal_entries::Column::DeletedAt.is_null())
}

#[async_trait]
impl LedgerTx for LedgerTransaction {
    // ========== Accounts ==========

    async fn insert_account(&mut self, account: &Account) -> Result<(), LedgerError> {
        let now = Utc::now().into();
        let row = accounts::ActiveModel {
            id: Set(account.id.into_inner()),
            code: Set(account.code.clone()),
            name: Set(account.name.clone()),
            account_type: Set(account.account_type.into()),
            parent_id: Set(account.parent_id.map(AccountId::into_inner)),
            level: Set(account.level),
            is_header: Set(account.is_header),
            balance: Set(account.balance),
            is_active: Set(account.is_active),
            created_at: Set(account.created_at.into()),
            updated_at: Set(now),
            deleted_at: Set(account.deleted_at.map(Into::into)),
        };
        match row.insert(&self.txn).await {
            Ok(_) => Ok(()),
            Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                Err(LedgerError::DuplicateAccountCode(account.code.clone()))
            }
            Err(err) => Err(map_db_err(err)),
        }
    }

    async fn find_account(&mut self, id: AccountId) -> Result<Option<Account>, LedgerError> {
        let row = live_accounts()
            .filter(accounts::Column::Id.eq(id.into_inner()))
            .one(&self.txn)
            .await
            .map_err(map_db_err)?;
        Ok(row.map(Account::from))
    }

    async fn find_account_by_code(&mut self, code: &str) -> Result<Option<Account>, LedgerError> {
        let row = live_accounts()
            .filter(accounts::Column::Code.eq(code))
            .one(&self.txn)
            .await
            .map_err(map_db_err)?;
        Ok(row.map(Account::from))
    }

    async fn list_accounts(&mut self) -> Result<Vec<Account>, LedgerError> {
        let rows = live_accounts()
            .order_by_asc(accounts::Column::Code)
            .all(&self.txn)
            .await
            .map_err(map_db_err)?;
        Ok(rows.into_iter().map(Account::from).collect())
    }

    async fn lock_accounts(&mut self, ids: &[AccountId]) -> Result<Vec<Account>, LedgerError> {
        let mut wanted = ids.to_vec();
        wanted.sort_unstable();
        wanted.dedup();
        if wanted.is_empty() {
            return Ok(Vec::new());
        }

        let rows = live_accounts()
            .filter(accounts::Column::Id.is_in(wanted.iter().map(|id| id.into_inner())))
            .order_by_asc(accounts::Column::Id)
            .lock_exclusive()
            .all(&self.txn)
            .await
            .map_err(map_db_err)?;
        let locked: Vec<Account> = rows.into_iter().map(Account::from).collect();

        if let Some(missing) = wanted.iter().find(|id| !locked.iter().any(|a| a.id == **id)) {
            return Err(LedgerError::AccountNotFound(*missing));
        }
        debug!(count = locked.len(), "account rows locked");
        Ok(locked)
    }

    async fn update_account(&mut self, account: &Account) -> Result<(), LedgerError> {
        accounts::ActiveModel {
            id: Unchanged(account.id.into_inner()),
            name: Set(account.name.clone()),
            is_active: Set(account.is_active),
            deleted_at: Set(account.deleted_at.map(Into::into)),
            updated_at: Set(Utc::now().into()),
            ..Default::default()
        }
        .update(&self.txn)
        .await
        .map_err(map_db_err)?;
        Ok(())
    }

    async fn write_balance(&mut self, id: AccountId, balance: Decimal) -> Result<(), LedgerError> {
        accounts::ActiveModel {
            id: Unchanged(id.into_inner()),
            balance: Set(balance),
            updated_at: Set(Utc::now().into()),
            ..Default::default()
        }
        .update(&self.txn)
        .await
        .map_err(map_db_err)?;
        Ok(())
    }

    async fn account_has_lines(&mut self, id: AccountId) -> Result<bool, LedgerError> {
        let count = journal_lines::Entity::find()
            .join(JoinType::InnerJoin, journal_lines::Relation::JournalEntries.def())
            .filter(journal_entries::Column::DeletedAt.is_null())
            .filter(journal_lines::Column::AccountId.eq(id.into_inner()))
            .count(&self.txn)
            .await
            .map_err(map_db_err)?;
        Ok(count > 0)
    }

    // ========== Journal entries ==========

    async fn next_entry_sequence(&mut self) -> Result<i64, LedgerError> {
        let row = self
            .txn
            .query_one(Statement::from_string(
                DbBackend::Postgres,
                "SELECT nextval('journal_entry_code_seq') AS seq",
            ))
            .await
            .map_err(map_db_err)?
            .ok_or_else(|| LedgerError::Database("entry code sequence returned no row".to_string()))?;
        row.try_get::<i64>("", "seq").map_err(map_db_err)
    }

    async fn insert_entry(
        &mut self,
        entry: &JournalEntry,
        lines: &[JournalLine],
    ) -> Result<(), LedgerError> {
        journal_entries::ActiveModel {
            id: Set(entry.id.into_inner()),
            code: Set(entry.code.clone()),
            entry_date: Set(entry.entry_date),
            description: Set(entry.description.clone()),
            source_type: Set(entry.source_type.into()),
            source_id: Set(entry.source_id),
            status: Set(entry.status.into()),
            total_debit: Set(entry.total_debit),
            total_credit: Set(entry.total_credit),
            reversal_id: Set(entry.reversal_id.map(JournalEntryId::into_inner)),
            created_by: Set(entry.created_by.into_inner()),
            created_at: Set(entry.created_at.into()),
            posted_by: Set(entry.posted_by.map(|u| u.into_inner())),
            posted_at: Set(entry.posted_at.map(Into::into)),
            deleted_at: Set(entry.deleted_at.map(Into::into)),
        }
        .insert(&self.txn)
        .await
        .map_err(map_db_err)?;

        if lines.is_empty() {
            return Ok(());
        }
        let rows = lines.iter().map(|line| journal_lines::ActiveModel {
            id: Set(line.id.into_inner()),
            journal_id: Set(line.journal_id.into_inner()),
            account_id: Set(line.account_id.into_inner()),
            line_number: Set(line.line_number),
            debit_amount: Set(line.debit_amount),
            credit_amount: Set(line.credit_amount),
            description: Set(line.description.clone()),
        });
        journal_lines::Entity::insert_many(rows)
            .exec(&self.txn)
            .await
            .map_err(map_db_err)?;
        Ok(())
    }

    async fn find_entry(&mut self, id: JournalEntryId) -> Result<Option<JournalEntry>, LedgerError> {
        let row = live_entries()
            .filter(journal_entries::Column::Id.eq(id.into_inner()))
            .one(&self.txn)
            .await
            .map_err(map_db_err)?;
        Ok(row.map(JournalEntry::from))
    }

    async fn lock_entry(&mut self, id: JournalEntryId) -> Result<Option<JournalEntry>, LedgerError> {
        let row = live_entries()
            .filter(journal_entries::Column::Id.eq(id.into_inner()))
            .lock_exclusive()
            .one(&self.txn)
            .await
            .map_err(map_db_err)?;
        Ok(row.map(JournalEntry::from))
    }

    async fn entry_lines(&mut self, id: JournalEntryId) -> Result<Vec<JournalLine>, LedgerError> {
        let rows = journal_lines::Entity::find()
            .filter(journal_lines::Column::JournalId.eq(id.into_inner()))
            .order_by_asc(journal_lines::Column::LineNumber)
            .all(&self.txn)
            .await
            .map_err(map_db_err)?;
        Ok(rows.into_iter().map(JournalLine::from).collect())
    }

    async fn update_entry(&mut self, entry: &JournalEntry) -> Result<(), LedgerError> {
        journal_entries::ActiveModel {
            id: Unchanged(entry.id.into_inner()),
            status: Set(entry.status.into()),
            total_debit: Set(entry.total_debit),
            total_credit: Set(entry.total_credit),
            reversal_id: Set(entry.reversal_id.map(JournalEntryId::into_inner)),
            posted_by: Set(entry.posted_by.map(|u| u.into_inner())),
            posted_at: Set(entry.posted_at.map(Into::into)),
            deleted_at: Set(entry.deleted_at.map(Into::into)),
            ..Default::default()
        }
        .update(&self.txn)
        .await
        .map_err(map_db_err)?;
        Ok(())
    }

    async fn list_entries(&mut self, filter: &EntryFilter) -> Result<Vec<JournalEntry>, LedgerError> {
        let mut query = live_entries();
        if let Some(status) = filter.status {
            query = query.filter(journal_entries::Column::Status.eq(EntryStatus::from(status)));
        }
        if let Some(source_type) = filter.source_type {
            query = query.filter(
                journal_entries::Column::SourceType.eq(SourceType::from(source_type)),
            );
        }
        if let Some(from) = filter.from {
            query = query.filter(journal_entries::Column::EntryDate.gte(from));
        }
        if let Some(to) = filter.to {
            query = query.filter(journal_entries::Column::EntryDate.lte(to));
        }

        let rows = query
            .order_by_asc(journal_entries::Column::EntryDate)
            .order_by_asc(journal_entries::Column::Code)
            .all(&self.txn)
            .await
            .map_err(map_db_err)?;
        Ok(rows.into_iter().map(JournalEntry::from).collect())
    }

    // ========== Derivation ==========

    async fn posted_totals(&mut self, scope: &LineScope) -> Result<Vec<AccountTotals>, LedgerError> {
        let mut query = contributing_lines()
            .select_only()
            .column(journal_lines::Column::AccountId)
            .column_as(journal_lines::Column::DebitAmount.sum(), "debit_total")
            .column_as(journal_lines::Column::CreditAmount.sum(), "credit_total")
            .group_by(journal_lines::Column::AccountId);

        if let Some(ids) = &scope.accounts {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            query = query
                .filter(journal_lines::Column::AccountId.is_in(ids.iter().map(|id| id.into_inner())));
        }
        if let Some(as_of) = scope.as_of {
            query = query.filter(journal_entries::Column::EntryDate.lte(as_of));
        }

        let rows = query
            .into_model::<AccountTotalsRow>()
            .all(&self.txn)
            .await
            .map_err(map_db_err)?;
        Ok(rows
            .into_iter()
            .map(|row| AccountTotals {
                account_id: AccountId::from_uuid(row.account_id),
                debit_total: row.debit_total,
                credit_total: row.credit_total,
            })
            .collect())
    }

    async fn posted_entry_totals(
        &mut self,
    ) -> Result<HashMap<JournalEntryId, EntryTotals>, LedgerError> {
        let rows = contributing_lines()
            .select_only()
            .column(journal_lines::Column::JournalId)
            .column_as(journal_lines::Column::DebitAmount.sum(), "debit_total")
            .column_as(journal_lines::Column::CreditAmount.sum(), "credit_total")
            .group_by(journal_lines::Column::JournalId)
            .into_model::<EntryTotalsRow>()
            .all(&self.txn)
            .await
            .map_err(map_db_err)?;
        Ok(rows
            .into_iter()
            .map(|row| {
                (
                    JournalEntryId::from_uuid(row.journal_id),
                    EntryTotals {
                        debit: row.debit_total,
                        credit: row.credit_total,
                    },
                )
            })
            .collect())
    }

    // ========== Periods ==========

    async fn insert_period(&mut self, period: &AccountingPeriod) -> Result<(), LedgerError> {
        accounting_periods::ActiveModel {
            id: Set(period.id.into_inner()),
            name: Set(period.name.clone()),
            start_date: Set(period.start_date),
            end_date: Set(period.end_date),
            is_closed: Set(period.is_closed),
            total_revenue: Set(period.total_revenue),
            total_expense: Set(period.total_expense),
            net_income: Set(period.net_income),
            closing_journal_id: Set(period.closing_journal_id.map(JournalEntryId::into_inner)),
            closed_by: Set(period.closed_by.map(|u| u.into_inner())),
            closed_at: Set(period.closed_at.map(Into::into)),
            created_at: Set(Utc::now().into()),
        }
        .insert(&self.txn)
        .await
        .map_err(map_db_err)?;
        Ok(())
    }

    async fn find_period(&mut self, id: PeriodId) -> Result<Option<AccountingPeriod>, LedgerError> {
        let row = accounting_periods::Entity::find_by_id(id.into_inner())
            .one(&self.txn)
            .await
            .map_err(map_db_err)?;
        Ok(row.map(AccountingPeriod::from))
    }

    async fn lock_period(&mut self, id: PeriodId) -> Result<Option<AccountingPeriod>, LedgerError> {
        let row = accounting_periods::Entity::find_by_id(id.into_inner())
            .lock_exclusive()
            .one(&self.txn)
            .await
            .map_err(map_db_err)?;
        Ok(row.map(AccountingPeriod::from))
    }

    async fn list_periods(&mut self) -> Result<Vec<AccountingPeriod>, LedgerError> {
        let rows = accounting_periods::Entity::find()
            .order_by_asc(accounting_periods::Column::StartDate)
            .all(&self.txn)
            .await
            .map_err(map_db_err)?;
        Ok(rows.into_iter().map(AccountingPeriod::from).collect())
    }

    async fn update_period(&mut self, period: &AccountingPeriod) -> Result<(), LedgerError> {
        // closed periods are immutable
        let result = accounting_periods::Entity::update_many()
            .col_expr(accounting_periods::Column::IsClosed, Expr::value(period.is_closed))
            .col_expr(accounting_periods::Column::TotalRevenue, Expr::value(period.total_revenue))
            .col_expr(accounting_periods::Column::TotalExpense, Expr::value(period.total_expense))
            .col_expr(accounting_periods::Column::NetIncome, Expr::value(period.net_income))
            .col_expr(
                accounting_periods::Column::ClosingJournalId,
                Expr::value(period.closing_journal_id.map(JournalEntryId::into_inner)),
            )
            .col_expr(
                accounting_periods::Column::ClosedBy,
                Expr::value(period.closed_by.map(|u| u.into_inner())),
            )
            .col_expr(
                accounting_periods::Column::ClosedAt,
                Expr::value(period.closed_at.map(|at| at.fixed_offset())),
            )
            .filter(accounting_periods::Column::Id.eq(period.id.into_inner()))
            .filter(accounting_periods::Column::IsClosed.eq(false))
            .exec(&self.txn)
            .await
            .map_err(map_db_err)?;

        if result.rows_affected == 0 {
            return Err(LedgerError::AlreadyClosed(period.id));
        }
        Ok(())
    }

    // ========== Boundary ==========

    async fn commit(self) -> Result<(), LedgerError> {
        self.txn.commit().await.map_err(map_db_err)
    }

    async fn rollback(self) -> Result<(), LedgerError> {
        self.txn.rollback().await.map_err(map_db_err)
    }
}
