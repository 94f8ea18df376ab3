//! Accounting periods and the rules that order their closing.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_shared::types::{JournalEntryId, PeriodId, UserId};

use super::error::LedgerError;

/// An accounting period, sealed once by period closing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountingPeriod {
    /// Unique identifier.
    pub id: PeriodId,
    /// Period name (e.g., "January 2026").
    pub name: String,
    /// First day, inclusive.
    pub start_date: NaiveDate,
    /// Last day, inclusive.
    pub end_date: NaiveDate,
    /// Whether the period has been closed.
    pub is_closed: bool,
    /// Revenue snapshot at close.
    pub total_revenue: Decimal,
    /// Expense snapshot at close.
    pub total_expense: Decimal,
    /// Net income transferred to retained earnings.
    pub net_income: Decimal,
    /// The closing entry, absent when nothing had to be zeroed.
    pub closing_journal_id: Option<JournalEntryId>,
    /// Who closed the period.
    pub closed_by: Option<UserId>,
    /// When the period was closed.
    pub closed_at: Option<DateTime<Utc>>,
}

impl AccountingPeriod {
    /// A new open period.
    #[must_use]
    pub fn open(name: impl Into<String>, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            id: PeriodId::new(),
            name: name.into(),
            start_date,
            end_date,
            is_closed: false,
            total_revenue: Decimal::ZERO,
            total_expense: Decimal::ZERO,
            net_income: Decimal::ZERO,
            closing_journal_id: None,
            closed_by: None,
            closed_at: None,
        }
    }

    /// Returns true if `date` falls within the period.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }

    /// Returns true if the two date ranges share at least one day.
    #[must_use]
    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.start_date <= end && start <= self.end_date
    }
}

/// Validates the range of a new period against existing ones.
pub fn validate_new_period(
    start: NaiveDate,
    end: NaiveDate,
    existing: &[AccountingPeriod],
) -> Result<(), LedgerError> {
    if start > end {
        return Err(LedgerError::InvalidPeriodRange { start, end });
    }
    if existing.iter().any(|p| p.overlaps(start, end)) {
        return Err(LedgerError::OverlappingPeriod { start, end });
    }
    Ok(())
}

/// Checks that `period` may be closed now.
///
/// A closed period cannot be closed again, and every period ending before
/// this one starts must already be closed.
pub fn ensure_closable(
    period: &AccountingPeriod,
    all_periods: &[AccountingPeriod],
) -> Result<(), LedgerError> {
    if period.is_closed {
        return Err(LedgerError::AlreadyClosed(period.id));
    }

    let earliest_open = all_periods
        .iter()
        .filter(|p| p.id != period.id && !p.is_closed && p.end_date < period.start_date)
        .min_by_key(|p| p.start_date);

    match earliest_open {
        Some(open) => Err(LedgerError::PeriodOrder {
            period_id: period.id,
            open_period_id: open.id,
        }),
        None => Ok(()),
    }
}

/// Rejects dates inside a closed period.
pub fn ensure_date_open(date: NaiveDate, periods: &[AccountingPeriod]) -> Result<(), LedgerError> {
    if periods.iter().any(|p| p.is_closed && p.contains(date)) {
        return Err(LedgerError::PeriodClosed(date));
    }
    Ok(())
}

/// The period containing `date`.
#[must_use]
pub fn period_for_date(periods: &[AccountingPeriod], date: NaiveDate) -> Option<&AccountingPeriod> {
    periods.iter().find(|p| p.contains(date))
}

/// The closed period with the latest end date.
#[must_use]
pub fn last_closed(periods: &[AccountingPeriod]) -> Option<&AccountingPeriod> {
    periods
        .iter()
        .filter(|p| p.is_closed)
        .max_by_key(|p| p.end_date)
}
