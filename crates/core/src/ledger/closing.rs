//! Period closing plan.
//!
//! Builds the closing entry that zeroes every revenue and expense account into
//! retained earnings. The plan is balanced by construction:
//! Σ revenue − Σ expense − net income = 0.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_shared::types::AccountId;

use super::entry::JournalLineInput;
use super::types::AccountType;

/// Balance of one temporary account as of the period end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosingBalance {
    /// The account ID.
    pub account_id: AccountId,
    /// Account code.
    pub code: String,
    /// Revenue or Expense.
    pub account_type: AccountType,
    /// Derived balance under the type's sign rule.
    pub balance: Decimal,
}

/// The would-be closing entry of a period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosingPlan {
    /// Σ revenue balances.
    pub total_revenue: Decimal,
    /// Σ expense balances.
    pub total_expense: Decimal,
    /// Revenue minus expense.
    pub net_income: Decimal,
    /// Closing lines; empty when every balance is zero.
    pub lines: Vec<JournalLineInput>,
}

impl ClosingPlan {
    /// Plans the closing entry.
    ///
    /// Revenue accounts are debited and expense accounts credited for their
    /// balance (sides flip for negative balances); retained earnings takes the
    /// net income on the credit side, or the loss on the debit side. Accounts
    /// with a zero balance get no line. Lines are ordered revenue, expense,
    /// retained earnings, each by code.
    #[must_use]
    pub fn build(balances: &[ClosingBalance], retained_earnings: AccountId) -> Self {
        let mut revenue: Vec<&ClosingBalance> = balances
            .iter()
            .filter(|b| b.account_type == AccountType::Revenue)
            .collect();
        let mut expense: Vec<&ClosingBalance> = balances
            .iter()
            .filter(|b| b.account_type == AccountType::Expense)
            .collect();
        revenue.sort_by(|a, b| a.code.cmp(&b.code));
        expense.sort_by(|a, b| a.code.cmp(&b.code));

        let total_revenue: Decimal = revenue.iter().map(|b| b.balance).sum();
        let total_expense: Decimal = expense.iter().map(|b| b.balance).sum();
        let net_income = total_revenue - total_expense;

        let mut lines = Vec::new();
        for b in revenue.iter().filter(|b| !b.balance.is_zero()) {
            let description = format!("Close revenue {}", b.code);
            lines.push(if b.balance > Decimal::ZERO {
                JournalLineInput::debit(b.account_id, b.balance, description)
            } else {
                JournalLineInput::credit(b.account_id, -b.balance, description)
            });
        }
        for b in expense.iter().filter(|b| !b.balance.is_zero()) {
            let description = format!("Close expense {}", b.code);
            lines.push(if b.balance > Decimal::ZERO {
                JournalLineInput::credit(b.account_id, b.balance, description)
            } else {
                JournalLineInput::debit(b.account_id, -b.balance, description)
            });
        }
        if net_income > Decimal::ZERO {
            lines.push(JournalLineInput::credit(
                retained_earnings,
                net_income,
                "Net income to retained earnings",
            ));
        } else if net_income < Decimal::ZERO {
            lines.push(JournalLineInput::debit(
                retained_earnings,
                -net_income,
                "Net loss to retained earnings",
            ));
        }

        Self {
            total_revenue,
            total_expense,
            net_income,
            lines,
        }
    }

    /// Returns true if nothing has to be zeroed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
