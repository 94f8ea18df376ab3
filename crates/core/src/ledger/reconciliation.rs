//! Integrity report: cached state against the ledger of record.
//!
//! Three checks: every account's cached balance against its derived balance,
//! every posted entry's cached totals against its line sums, and the balance
//! sheet identity Assets = Liabilities + Equity + open net income.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_shared::types::{AccountId, JournalEntryId, exceeds_tolerance};
use thiserror::Error;

use super::account::Account;
use super::balance::{AccountTotals, derive_balances};
use super::entry::JournalEntry;
use super::types::AccountType;
use super::validation::EntryTotals;

/// A single divergence found by reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriftError {
    /// Cached account balance differs from the derived one.
    #[error("Account {code}: cached balance {stored} differs from derived {derived} by {difference}")]
    Account {
        /// Account code.
        code: String,
        /// Cached balance.
        stored: Decimal,
        /// Derived balance.
        derived: Decimal,
        /// stored − derived.
        difference: Decimal,
    },

    /// Cached entry totals differ from its line sums.
    #[error("Entry {code}: cached totals {stored_debit}/{stored_credit} differ from line sums {line_debit}/{line_credit}")]
    Entry {
        /// Entry code.
        code: String,
        /// Cached debit total.
        stored_debit: Decimal,
        /// Cached credit total.
        stored_credit: Decimal,
        /// Σ line debits.
        line_debit: Decimal,
        /// Σ line credits.
        line_credit: Decimal,
    },

    /// Assets ≠ Liabilities + Equity + open net income.
    #[error("Balance sheet is off by {difference}")]
    BalanceSheet {
        /// Assets − (Liabilities + Equity + open net income).
        difference: Decimal,
    },
}

/// Cached versus derived balance of one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountCheck {
    /// The account ID.
    pub account_id: AccountId,
    /// Account code.
    pub code: String,
    /// Header accounts compare their roll-up.
    pub is_header: bool,
    /// Cached balance.
    pub stored: Decimal,
    /// Derived balance.
    pub derived: Decimal,
    /// stored − derived.
    pub difference: Decimal,
}

impl AccountCheck {
    /// Returns true if the difference exceeds tolerance.
    #[must_use]
    pub fn has_drift(&self) -> bool {
        exceeds_tolerance(self.difference)
    }
}

/// Cached totals versus line sums of one posted entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryCheck {
    /// The entry ID.
    pub entry_id: JournalEntryId,
    /// Entry code.
    pub code: String,
    /// Cached debit total.
    pub stored_debit: Decimal,
    /// Cached credit total.
    pub stored_credit: Decimal,
    /// Σ line debits.
    pub line_debit: Decimal,
    /// Σ line credits.
    pub line_credit: Decimal,
}

impl EntryCheck {
    /// Largest of the three gaps: debit, credit, and line debit vs line credit.
    #[must_use]
    pub fn difference(&self) -> Decimal {
        (self.stored_debit - self.line_debit)
            .abs()
            .max((self.stored_credit - self.line_credit).abs())
            .max((self.line_debit - self.line_credit).abs())
    }

    /// Returns true if any gap exceeds tolerance.
    #[must_use]
    pub fn has_drift(&self) -> bool {
        exceeds_tolerance(self.difference())
    }
}

/// Balance sheet identity check over derived balances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BalanceSheetCheck {
    /// Σ asset balances.
    pub assets: Decimal,
    /// Σ liability balances.
    pub liabilities: Decimal,
    /// Σ equity balances.
    pub equity: Decimal,
    /// Σ revenue − Σ expense not yet closed into retained earnings.
    pub open_net_income: Decimal,
}

impl BalanceSheetCheck {
    /// Assets − (Liabilities + Equity + open net income).
    #[must_use]
    pub fn difference(&self) -> Decimal {
        self.assets - (self.liabilities + self.equity + self.open_net_income)
    }

    /// Returns true if the identity holds within tolerance.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        !exceeds_tolerance(self.difference())
    }
}

/// Result of an integrity check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityReport {
    /// One row per live account, leaves and headers, ordered by code.
    pub accounts: Vec<AccountCheck>,
    /// One row per posted entry, ordered by code.
    pub entries: Vec<EntryCheck>,
    /// Balance sheet identity.
    pub balance_sheet: BalanceSheetCheck,
}

impl IntegrityReport {
    /// Builds the report.
    ///
    /// `totals` are posted line sums per account; `entry_lines` posted line
    /// sums per entry. Entries that do not contribute to balances are skipped.
    #[must_use]
    pub fn build(
        accounts: &[Account],
        totals: &[AccountTotals],
        entries: &[JournalEntry],
        entry_lines: &HashMap<JournalEntryId, EntryTotals>,
    ) -> Self {
        let derived = derive_balances(accounts, totals);

        let mut account_rows: Vec<_> = accounts
            .iter()
            .filter(|a| !a.is_deleted())
            .map(|account| {
                let derived = derived.get(&account.id).copied().unwrap_or_default();
                AccountCheck {
                    account_id: account.id,
                    code: account.code.clone(),
                    is_header: account.is_header,
                    stored: account.balance,
                    derived,
                    difference: account.balance - derived,
                }
            })
            .collect();
        account_rows.sort_by(|a, b| a.code.cmp(&b.code));

        let mut entry_rows: Vec<_> = entries
            .iter()
            .filter(|e| e.status.contributes_to_balance() && e.deleted_at.is_none())
            .map(|entry| {
                let lines = entry_lines.get(&entry.id).copied().unwrap_or_default();
                EntryCheck {
                    entry_id: entry.id,
                    code: entry.code.clone(),
                    stored_debit: entry.total_debit,
                    stored_credit: entry.total_credit,
                    line_debit: lines.debit,
                    line_credit: lines.credit,
                }
            })
            .collect();
        entry_rows.sort_by(|a, b| a.code.cmp(&b.code));

        let mut sheet = BalanceSheetCheck::default();
        for account in accounts.iter().filter(|a| !a.is_header && !a.is_deleted()) {
            let balance = derived.get(&account.id).copied().unwrap_or_default();
            match account.account_type {
                AccountType::Asset => sheet.assets += balance,
                AccountType::Liability => sheet.liabilities += balance,
                AccountType::Equity => sheet.equity += balance,
                AccountType::Revenue => sheet.open_net_income += balance,
                AccountType::Expense => sheet.open_net_income -= balance,
            }
        }

        Self {
            accounts: account_rows,
            entries: entry_rows,
            balance_sheet: sheet,
        }
    }

    /// Accounts whose cached balance drifted.
    pub fn drifted_accounts(&self) -> impl Iterator<Item = &AccountCheck> {
        self.accounts.iter().filter(|a| a.has_drift())
    }

    /// Entries whose cached totals drifted.
    pub fn drifted_entries(&self) -> impl Iterator<Item = &EntryCheck> {
        self.entries.iter().filter(|e| e.has_drift())
    }

    /// Returns true if nothing drifted and the balance sheet balances.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.drifted_accounts().next().is_none()
            && self.drifted_entries().next().is_none()
            && self.balance_sheet.is_balanced()
    }

    /// Every divergence as a [`DriftError`].
    #[must_use]
    pub fn drift_errors(&self) -> Vec<DriftError> {
        let mut errors: Vec<DriftError> = self
            .drifted_accounts()
            .map(|a| DriftError::Account {
                code: a.code.clone(),
                stored: a.stored,
                derived: a.derived,
                difference: a.difference,
            })
            .collect();
        errors.extend(self.drifted_entries().map(|e| DriftError::Entry {
            code: e.code.clone(),
            stored_debit: e.stored_debit,
            stored_credit: e.stored_credit,
            line_debit: e.line_debit,
            line_credit: e.line_credit,
        }));
        if !self.balance_sheet.is_balanced() {
            errors.push(DriftError::BalanceSheet {
                difference: self.balance_sheet.difference(),
            });
        }
        errors
    }
}
