//! Balance derivation.
//!
//! An account's balance is a pure function of the posted lines touching it:
//! debit-normal accounts carry Σdebit − Σcredit, credit-normal accounts
//! Σcredit − Σdebit. Header accounts carry the sum of their descendant leaves.
//! The cached `Account::balance` is never an input here.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_shared::types::AccountId;

use super::account::{Account, Chart};
use super::types::AccountType;

/// Posted debit/credit sums for one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountTotals {
    /// The account ID.
    pub account_id: AccountId,
    /// Σ debit over posted lines.
    pub debit_total: Decimal,
    /// Σ credit over posted lines.
    pub credit_total: Decimal,
}

impl AccountTotals {
    /// Totals with no lines.
    #[must_use]
    pub fn empty(account_id: AccountId) -> Self {
        Self {
            account_id,
            debit_total: Decimal::ZERO,
            credit_total: Decimal::ZERO,
        }
    }

    /// Signed balance under the type's sign rule.
    #[must_use]
    pub fn balance(&self, account_type: AccountType) -> Decimal {
        account_type
            .normal_balance()
            .signed_balance(self.debit_total, self.credit_total)
    }
}

/// Derives a balance from raw `(debit, credit)` pairs.
#[must_use]
pub fn derive_balance<I>(account_type: AccountType, lines: I) -> Decimal
where
    I: IntoIterator<Item = (Decimal, Decimal)>,
{
    let (debit, credit) = lines
        .into_iter()
        .fold((Decimal::ZERO, Decimal::ZERO), |(d, c), (debit, credit)| {
            (d + debit, c + credit)
        });
    account_type.normal_balance().signed_balance(debit, credit)
}

/// Indexes per-account totals.
#[must_use]
pub fn totals_by_account(totals: &[AccountTotals]) -> HashMap<AccountId, AccountTotals> {
    totals.iter().map(|t| (t.account_id, *t)).collect()
}

/// Derived balance of every live account, headers included.
#[must_use]
pub fn derive_balances(accounts: &[Account], totals: &[AccountTotals]) -> HashMap<AccountId, Decimal> {
    let chart = Chart::new(accounts);
    let totals = totals_by_account(totals);

    let leaves: HashMap<AccountId, Decimal> = chart
        .leaves()
        .map(|account| {
            let balance = totals
                .get(&account.id)
                .map_or(Decimal::ZERO, |t| t.balance(account.account_type));
            (account.id, balance)
        })
        .collect();

    roll_up(&chart, leaves)
}

/// Cached values every header should carry given its children's cached balances.
#[must_use]
pub fn expected_header_balances(accounts: &[Account]) -> HashMap<AccountId, Decimal> {
    let chart = Chart::new(accounts);
    let leaves = chart.leaves().map(|a| (a.id, a.balance)).collect();
    roll_up(&chart, leaves)
        .into_iter()
        .filter(|(id, _)| chart.get(*id).is_some_and(|a| a.is_header))
        .collect()
}

/// Extends leaf values with header sums, deepest headers first.
fn roll_up(chart: &Chart<'_>, mut values: HashMap<AccountId, Decimal>) -> HashMap<AccountId, Decimal> {
    for header in chart.headers_bottom_up() {
        let sum = chart
            .children(header.id)
            .iter()
            .filter_map(|child| values.get(child))
            .copied()
            .sum();
        values.insert(header.id, sum);
    }
    values
}

/// One row of a trial balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialBalanceRow {
    /// The account ID.
    pub account_id: AccountId,
    /// Account code.
    pub code: String,
    /// Account name.
    pub name: String,
    /// Account type.
    pub account_type: AccountType,
    /// Σ debit over posted lines.
    pub debit_total: Decimal,
    /// Σ credit over posted lines.
    pub credit_total: Decimal,
    /// Signed balance under the type's sign rule.
    pub balance: Decimal,
}

/// Derived debit/credit totals per leaf account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialBalance {
    /// One row per live leaf account, ordered by code.
    pub rows: Vec<TrialBalanceRow>,
    /// Σ debit over all rows.
    pub total_debit: Decimal,
    /// Σ credit over all rows.
    pub total_credit: Decimal,
}

impl TrialBalance {
    /// Builds the trial balance from the chart and posted totals.
    #[must_use]
    pub fn build(accounts: &[Account], totals: &[AccountTotals]) -> Self {
        let totals = totals_by_account(totals);
        let mut rows: Vec<_> = accounts
            .iter()
            .filter(|a| !a.is_header && !a.is_deleted())
            .map(|account| {
                let t = totals
                    .get(&account.id)
                    .copied()
                    .unwrap_or_else(|| AccountTotals::empty(account.id));
                TrialBalanceRow {
                    account_id: account.id,
                    code: account.code.clone(),
                    name: account.name.clone(),
                    account_type: account.account_type,
                    debit_total: t.debit_total,
                    credit_total: t.credit_total,
                    balance: t.balance(account.account_type),
                }
            })
            .collect();
        rows.sort_by(|a, b| a.code.cmp(&b.code));

        let total_debit = rows.iter().map(|r| r.debit_total).sum();
        let total_credit = rows.iter().map(|r| r.credit_total).sum();
        Self {
            rows,
            total_debit,
            total_credit,
        }
    }

    /// Returns true if debits equal credits.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.total_debit == self.total_credit
    }

    /// Σ signed balance of all rows of one type.
    #[must_use]
    pub fn total_for(&self, account_type: AccountType) -> Decimal {
        self.rows
            .iter()
            .filter(|r| r.account_type == account_type)
            .map(|r| r.balance)
            .sum()
    }
}
