//! Accounting period operations and period closing.

use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_shared::types::{AccountId, PeriodId, UserId, exceeds_tolerance};
use tracing::{info, warn};

use super::{LedgerEngine, insert_draft, lock_with_ancestors, post_in_tx};
use crate::ledger::balance::totals_by_account;
use crate::ledger::period::{self, ensure_closable, validate_new_period};
use crate::ledger::validation::AccountPolicy;
use crate::ledger::{
    Account, AccountType, AccountingPeriod, ClosingBalance, ClosingPlan, JournalEntryDetail,
    JournalLineInput, LedgerError, NewJournalEntry, SourceType,
};
use crate::store::{LedgerStore, LedgerTx, LineScope};

/// Result of closing a period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosingOutcome {
    /// The sealed period.
    pub period: AccountingPeriod,
    /// The posted closing entry; `None` when every balance was already zero.
    pub closing_entry: Option<JournalEntryDetail>,
}

/// What closing a period would do, computed without writing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosingPreview {
    /// The period.
    pub period_id: PeriodId,
    /// Σ revenue balances as of the period end.
    pub total_revenue: Decimal,
    /// Σ expense balances as of the period end.
    pub total_expense: Decimal,
    /// Revenue minus expense.
    pub net_income: Decimal,
    /// The retained earnings account receiving net income.
    pub retained_earnings_code: String,
    /// The would-be closing lines.
    pub lines: Vec<JournalLineInput>,
}

struct PreparedClose {
    period: AccountingPeriod,
    retained_earnings: Account,
    plan: ClosingPlan,
    accounts: HashMap<AccountId, Account>,
}

impl<S: LedgerStore> LedgerEngine<S> {
    /// Creates an open accounting period.
    ///
    /// # Errors
    ///
    /// `InvalidPeriodRange` or `OverlappingPeriod`.
    pub async fn create_period(
        &self,
        name: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<AccountingPeriod, LedgerError> {
        self.bounded("create_period", async move {
            let mut tx = self.store.begin().await?;
            let existing = tx.list_periods().await?;
            validate_new_period(start_date, end_date, &existing)?;

            let period = AccountingPeriod::open(name, start_date, end_date);
            tx.insert_period(&period).await?;
            tx.commit().await?;

            info!(period_id = %period.id, %start_date, %end_date, "accounting period created");
            Ok(period)
        })
        .await
    }

    /// Every period, ordered by start date.
    pub async fn list_periods(&self) -> Result<Vec<AccountingPeriod>, LedgerError> {
        self.bounded("list_periods", async move {
            let mut tx = self.store.begin().await?;
            tx.list_periods().await
        })
        .await
    }

    /// Reads a period.
    pub async fn get_period(&self, period_id: PeriodId) -> Result<AccountingPeriod, LedgerError> {
        self.bounded("get_period", async move {
            let mut tx = self.store.begin().await?;
            tx.find_period(period_id)
                .await?
                .ok_or(LedgerError::PeriodNotFound(period_id))
        })
        .await
    }

    /// The closed period with the latest end date.
    pub async fn last_closed_period(&self) -> Result<Option<AccountingPeriod>, LedgerError> {
        let periods = self.list_periods().await?;
        Ok(period::last_closed(&periods).cloned())
    }

    /// The period containing `date`.
    pub async fn period_for_date(
        &self,
        date: NaiveDate,
    ) -> Result<Option<AccountingPeriod>, LedgerError> {
        let periods = self.list_periods().await?;
        Ok(period::period_for_date(&periods, date).cloned())
    }

    /// Computes the closing entry of a period without writing anything.
    pub async fn preview_close(&self, period_id: PeriodId) -> Result<ClosingPreview, LedgerError> {
        self.bounded("preview_close", async move {
            let mut tx = self.store.begin().await?;
            let prepared = self.prepare_close(&mut tx, period_id, false).await?;
            tx.rollback().await?;

            Ok(ClosingPreview {
                period_id,
                total_revenue: prepared.plan.total_revenue,
                total_expense: prepared.plan.total_expense,
                net_income: prepared.plan.net_income,
                retained_earnings_code: prepared.retained_earnings.code,
                lines: prepared.plan.lines,
            })
        })
        .await
    }

    /// Closes a period: zeroes revenue and expense into retained earnings and
    /// seals the period, all in one unit of work.
    ///
    /// # Errors
    ///
    /// - `AlreadyClosed`, `PeriodOrder`
    /// - `RetainedEarningsNotFound`
    /// - `DriftDetected` if any involved cached balance drifted
    pub async fn close_period(
        &self,
        period_id: PeriodId,
        closed_by: UserId,
    ) -> Result<ClosingOutcome, LedgerError> {
        self.bounded("close_period", async move {
            let mut tx = self.store.begin().await?;
            let PreparedClose {
                mut period,
                retained_earnings,
                plan,
                accounts,
            } = self.prepare_close(&mut tx, period_id, true).await?;

            let closing_entry = if plan.is_empty() {
                None
            } else {
                let input = NewJournalEntry {
                    entry_date: period.end_date,
                    description: format!("Closing entry for {}", period.name),
                    source_type: SourceType::Closing,
                    source_id: Some(period.id.into_inner()),
                    lines: plan.lines.clone(),
                    created_by: closed_by,
                };
                let mut detail = insert_draft(&mut tx, input).await?;
                post_in_tx(
                    &mut tx,
                    &mut detail.entry,
                    &detail.lines,
                    closed_by,
                    &accounts,
                    AccountPolicy::AnyLeaf,
                )
                .await?;
                Some(detail)
            };

            period.is_closed = true;
            period.total_revenue = plan.total_revenue;
            period.total_expense = plan.total_expense;
            period.net_income = plan.net_income;
            period.closing_journal_id = closing_entry.as_ref().map(|d| d.entry.id);
            period.closed_by = Some(closed_by);
            period.closed_at = Some(Utc::now());
            tx.update_period(&period).await?;
            tx.commit().await?;

            info!(
                period_id = %period.id,
                net_income = %period.net_income,
                retained_earnings = %retained_earnings.code,
                closing_entry = ?closing_entry.as_ref().map(|d| d.entry.code.as_str()),
                "accounting period closed"
            );
            Ok(ClosingOutcome {
                period,
                closing_entry,
            })
        })
        .await
    }

    /// Checks preconditions, optionally locks, and plans the closing entry.
    async fn prepare_close(
        &self,
        tx: &mut S::Tx,
        period_id: PeriodId,
        lock: bool,
    ) -> Result<PreparedClose, LedgerError> {
        let found = if lock {
            tx.lock_period(period_id).await?
        } else {
            tx.find_period(period_id).await?
        };
        let period = found.ok_or(LedgerError::PeriodNotFound(period_id))?;
        let periods = tx.list_periods().await?;
        ensure_closable(&period, &periods)?;

        let re_code = &self.config.retained_earnings_code;
        let retained_earnings = tx
            .find_account_by_code(re_code)
            .await?
            .filter(|a| a.account_type == AccountType::Equity && a.is_postable())
            .ok_or_else(|| LedgerError::RetainedEarningsNotFound(re_code.clone()))?;

        let chart = tx.list_accounts().await?;
        let temporary: Vec<AccountId> = chart
            .iter()
            .filter(|a| !a.is_header && a.account_type.is_temporary())
            .map(|a| a.id)
            .collect();
        let mut involved = temporary.clone();
        involved.push(retained_earnings.id);

        let accounts = if lock {
            lock_with_ancestors(tx, &involved).await?
        } else {
            chart.into_iter().map(|a| (a.id, a)).collect()
        };

        // drifted accounts must be healed before the period can close
        let current = tx.posted_totals(&LineScope::accounts(involved.iter().copied())).await?;
        let current = totals_by_account(&current);
        let mut drifted = 0;
        for account in involved.iter().filter_map(|id| accounts.get(id)) {
            let derived = current
                .get(&account.id)
                .map_or(Decimal::ZERO, |t| t.balance(account.account_type));
            if exceeds_tolerance(account.balance - derived) {
                warn!(
                    account_code = %account.code,
                    cached = %account.balance,
                    derived = %derived,
                    "balance drift blocks period close"
                );
                drifted += 1;
            }
        }
        if drifted > 0 {
            return Err(LedgerError::DriftDetected { count: drifted });
        }

        let scope = LineScope::accounts(temporary.iter().copied()).as_of(period.end_date);
        let at_end = tx.posted_totals(&scope).await?;
        let at_end = totals_by_account(&at_end);
        let balances: Vec<ClosingBalance> = temporary
            .iter()
            .filter_map(|id| accounts.get(id))
            .map(|account| ClosingBalance {
                account_id: account.id,
                code: account.code.clone(),
                account_type: account.account_type,
                balance: at_end
                    .get(&account.id)
                    .map_or(Decimal::ZERO, |t| t.balance(account.account_type)),
            })
            .collect();
        let plan = ClosingPlan::build(&balances, retained_earnings.id);

        Ok(PreparedClose {
            period,
            retained_earnings,
            plan,
            accounts,
        })
    }
}
