//! Ledger domain enums.
//!
//! Account types with their normal balance side, journal entry lifecycle
//! states and source classifications.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Which side of an account increases its balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalBalance {
    /// Balance = Σdebit − Σcredit.
    Debit,
    /// Balance = Σcredit − Σdebit.
    Credit,
}

impl NormalBalance {
    /// Applies the sign rule to a debit/credit pair.
    #[must_use]
    pub fn signed_balance(self, debit: Decimal, credit: Decimal) -> Decimal {
        match self {
            Self::Debit => debit - credit,
            Self::Credit => credit - debit,
        }
    }
}

/// The five chart-of-accounts types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccountType {
    /// Resources owned.
    Asset,
    /// Obligations owed.
    Liability,
    /// Owners' residual interest, including retained earnings.
    Equity,
    /// Income, zeroed at period close.
    Revenue,
    /// Costs, zeroed at period close.
    Expense,
}

impl AccountType {
    /// All account types in chart order.
    pub const ALL: [Self; 5] = [
        Self::Asset,
        Self::Liability,
        Self::Equity,
        Self::Revenue,
        Self::Expense,
    ];

    /// Returns the normal balance side for this type.
    ///
    /// - Asset/Expense: debit-normal
    /// - Liability/Equity/Revenue: credit-normal
    #[must_use]
    pub fn normal_balance(self) -> NormalBalance {
        match self {
            Self::Asset | Self::Expense => NormalBalance::Debit,
            Self::Liability | Self::Equity | Self::Revenue => NormalBalance::Credit,
        }
    }

    /// Returns true for temporary accounts that period closing zeroes.
    #[must_use]
    pub fn is_temporary(self) -> bool {
        matches!(self, Self::Revenue | Self::Expense)
    }

    /// Returns the uppercase name used in storage.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asset => "ASSET",
            Self::Liability => "LIABILITY",
            Self::Equity => "EQUITY",
            Self::Revenue => "REVENUE",
            Self::Expense => "EXPENSE",
        }
    }
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Journal entry lifecycle.
///
/// `Draft → Posted → Reversed`. Reversed is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntryStatus {
    /// Editable, not yet reflected in balances.
    Draft,
    /// Reflected in balances, immutable.
    Posted,
    /// Posted and later neutralized by a reversal entry.
    Reversed,
}

impl EntryStatus {
    /// Returns true if the entry can still be modified or deleted.
    #[must_use]
    pub fn is_editable(self) -> bool {
        matches!(self, Self::Draft)
    }

    /// Returns true if the entry's lines count towards derived balances.
    ///
    /// A reversed entry keeps contributing; its reversal entry cancels it.
    #[must_use]
    pub fn contributes_to_balance(self) -> bool {
        matches!(self, Self::Posted | Self::Reversed)
    }

    /// Returns the uppercase name used in storage.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Posted => "POSTED",
            Self::Reversed => "REVERSED",
        }
    }
}

impl std::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Upstream producer of a journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceType {
    /// Sales invoice.
    Sale,
    /// Purchase bill.
    Purchase,
    /// Cash or bank movement.
    CashBank,
    /// Payment against an invoice or bill.
    Payment,
    /// Manual journal entry.
    Manual,
    /// Period closing entry.
    Closing,
    /// Reversal of another entry.
    Reversal,
}

impl SourceType {
    /// Prefix of generated entry codes.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Sale => "SJ",
            Self::Purchase => "PJ",
            Self::CashBank => "CB",
            Self::Payment => "PY",
            Self::Manual => "JE",
            Self::Closing => "CJ",
            Self::Reversal => "RV",
        }
    }

    /// Returns the uppercase name used in storage.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sale => "SALE",
            Self::Purchase => "PURCHASE",
            Self::CashBank => "CASH_BANK",
            Self::Payment => "PAYMENT",
            Self::Manual => "MANUAL",
            Self::Closing => "CLOSING",
            Self::Reversal => "REVERSAL",
        }
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
