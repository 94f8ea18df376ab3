//! Journal entry validation.
//!
//! Rules are checked before an entry is stored as a draft and again, against
//! the stored lines, when it is posted.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_shared::types::{AccountId, exceeds_tolerance, has_money_scale};

use super::account::Account;
use super::entry::LineAmounts;
use super::error::LedgerError;

/// Debit and credit sums of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EntryTotals {
    /// Sum of line debits.
    pub debit: Decimal,
    /// Sum of line credits.
    pub credit: Decimal,
}

impl EntryTotals {
    /// Sums the lines.
    #[must_use]
    pub fn of<L: LineAmounts>(lines: &[L]) -> Self {
        lines.iter().fold(Self::default(), |acc, line| Self {
            debit: acc.debit + line.debit_amount(),
            credit: acc.credit + line.credit_amount(),
        })
    }

    /// Debit minus credit.
    #[must_use]
    pub fn difference(&self) -> Decimal {
        self.debit - self.credit
    }

    /// Returns true if the difference is within tolerance.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        !exceeds_tolerance(self.difference())
    }
}

/// Validates line amounts and the balance of the whole entry.
///
/// # Errors
///
/// - `InsufficientLines` for fewer than 2 lines
/// - `NegativeAmount`, `ZeroAmount`, `DebitAndCredit`, `ExcessPrecision` per line
/// - `UnbalancedEntry` if debits and credits differ
pub fn validate_amounts<L: LineAmounts>(lines: &[L]) -> Result<EntryTotals, LedgerError> {
    if lines.len() < 2 {
        return Err(LedgerError::InsufficientLines);
    }

    for (index, line) in lines.iter().enumerate() {
        validate_line_amount(index + 1, line.debit_amount(), line.credit_amount())?;
    }

    let totals = EntryTotals::of(lines);
    if !totals.is_balanced() {
        return Err(LedgerError::UnbalancedEntry {
            debit: totals.debit,
            credit: totals.credit,
        });
    }

    Ok(totals)
}

fn validate_line_amount(line: usize, debit: Decimal, credit: Decimal) -> Result<(), LedgerError> {
    if debit < Decimal::ZERO || credit < Decimal::ZERO {
        return Err(LedgerError::NegativeAmount { line });
    }
    match (debit.is_zero(), credit.is_zero()) {
        (true, true) => return Err(LedgerError::ZeroAmount { line }),
        (false, false) => return Err(LedgerError::DebitAndCredit { line }),
        _ => {}
    }
    let amount = debit.max(credit);
    if !has_money_scale(amount) {
        return Err(LedgerError::ExcessPrecision { line, amount });
    }
    Ok(())
}

/// Which accounts an entry's lines may target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccountPolicy {
    /// Active leaf accounts only. Applies to every user-authored entry.
    #[default]
    ActiveLeaf,
    /// Any live leaf account, active or not. Used for closing and reversal entries.
    AnyLeaf,
}

/// Validates that every line targets an existing, active leaf account.
///
/// # Errors
///
/// `UnknownAccount`, `HeaderAccountPosting` or `AccountInactive` naming the first bad line.
pub fn validate_accounts<L: LineAmounts>(
    lines: &[L],
    accounts: &HashMap<AccountId, Account>,
) -> Result<(), LedgerError> {
    validate_accounts_with(lines, accounts, AccountPolicy::ActiveLeaf)
}

/// Validates line accounts under the given policy.
///
/// # Errors
///
/// `UnknownAccount`, `HeaderAccountPosting`, or `AccountInactive` when the
/// policy is [`AccountPolicy::ActiveLeaf`].
pub fn validate_accounts_with<L: LineAmounts>(
    lines: &[L],
    accounts: &HashMap<AccountId, Account>,
    policy: AccountPolicy,
) -> Result<(), LedgerError> {
    for (index, line) in lines.iter().enumerate() {
        let line_no = index + 1;
        let account_id = line.account_id();
        let account = accounts
            .get(&account_id)
            .filter(|a| !a.is_deleted())
            .ok_or(LedgerError::UnknownAccount {
                line: line_no,
                account_id,
            })?;
        if account.is_header {
            return Err(LedgerError::HeaderAccountPosting {
                line: line_no,
                code: account.code.clone(),
            });
        }
        if !account.is_active && policy == AccountPolicy::ActiveLeaf {
            return Err(LedgerError::AccountInactive {
                line: line_no,
                code: account.code.clone(),
            });
        }
    }
    Ok(())
}

/// Runs every entry rule: amounts, balance and accounts.
pub fn validate_entry<L: LineAmounts>(
    lines: &[L],
    accounts: &HashMap<AccountId, Account>,
) -> Result<EntryTotals, LedgerError> {
    validate_entry_with(lines, accounts, AccountPolicy::ActiveLeaf)
}

/// Runs every entry rule with the given account policy.
pub fn validate_entry_with<L: LineAmounts>(
    lines: &[L],
    accounts: &HashMap<AccountId, Account>,
    policy: AccountPolicy,
) -> Result<EntryTotals, LedgerError> {
    let totals = validate_amounts(lines)?;
    validate_accounts_with(lines, accounts, policy)?;
    Ok(totals)
}
