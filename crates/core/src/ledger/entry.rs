//! Journal entry and journal line domain types.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_shared::types::{AccountId, JournalEntryId, JournalLineId, UserId};
use uuid::Uuid;

use super::types::{EntryStatus, SourceType};

/// Anything that carries a debit/credit pair against one account.
///
/// Validation runs over both submitted inputs and stored lines through this
/// trait, so posting re-checks the persisted lines rather than cached totals.
pub trait LineAmounts {
    /// The referenced account.
    fn account_id(&self) -> AccountId;
    /// Debit amount (zero if this is a credit line).
    fn debit_amount(&self) -> Decimal;
    /// Credit amount (zero if this is a debit line).
    fn credit_amount(&self) -> Decimal;
}

/// A journal entry header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// The entry ID.
    pub id: JournalEntryId,
    /// Human-readable code, e.g. `SJ-2026-000042`.
    pub code: String,
    /// Accounting date.
    pub entry_date: NaiveDate,
    /// Free-text description.
    pub description: String,
    /// Upstream producer.
    pub source_type: SourceType,
    /// Originating record (invoice, period, reversed entry, ...).
    pub source_id: Option<Uuid>,
    /// Lifecycle status.
    pub status: EntryStatus,
    /// Cached debit total. Never trusted when posting.
    pub total_debit: Decimal,
    /// Cached credit total. Never trusted when posting.
    pub total_credit: Decimal,
    /// Counterpart entry: the reversal of this entry, or the entry it reverses.
    pub reversal_id: Option<JournalEntryId>,
    /// Who created the entry.
    pub created_by: UserId,
    /// When the entry was created.
    pub created_at: DateTime<Utc>,
    /// Who posted the entry.
    pub posted_by: Option<UserId>,
    /// When the entry was posted.
    pub posted_at: Option<DateTime<Utc>>,
    /// Soft-delete tombstone (drafts only).
    pub deleted_at: Option<DateTime<Utc>>,
}

impl JournalEntry {
    /// Returns true if this entry reverses another one.
    #[must_use]
    pub fn is_reversal(&self) -> bool {
        self.source_type == SourceType::Reversal
    }
}

/// One debit or credit line of a journal entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalLine {
    /// The line ID.
    pub id: JournalLineId,
    /// Owning entry.
    pub journal_id: JournalEntryId,
    /// Leaf account.
    pub account_id: AccountId,
    /// 1-based position; the deterministic order of lines.
    pub line_number: i32,
    /// Debit amount.
    pub debit_amount: Decimal,
    /// Credit amount.
    pub credit_amount: Decimal,
    /// Free-text description.
    pub description: String,
}

impl LineAmounts for JournalLine {
    fn account_id(&self) -> AccountId {
        self.account_id
    }

    fn debit_amount(&self) -> Decimal {
        self.debit_amount
    }

    fn credit_amount(&self) -> Decimal {
        self.credit_amount
    }
}

/// Input for a single journal line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalLineInput {
    /// Leaf account to post to.
    pub account_id: AccountId,
    /// Debit amount.
    pub debit: Decimal,
    /// Credit amount.
    pub credit: Decimal,
    /// Free-text description.
    pub description: String,
}

impl JournalLineInput {
    /// A debit line.
    #[must_use]
    pub fn debit(account_id: AccountId, amount: Decimal, description: impl Into<String>) -> Self {
        Self {
            account_id,
            debit: amount,
            credit: Decimal::ZERO,
            description: description.into(),
        }
    }

    /// A credit line.
    #[must_use]
    pub fn credit(account_id: AccountId, amount: Decimal, description: impl Into<String>) -> Self {
        Self {
            account_id,
            debit: Decimal::ZERO,
            credit: amount,
            description: description.into(),
        }
    }
}

impl LineAmounts for JournalLineInput {
    fn account_id(&self) -> AccountId {
        self.account_id
    }

    fn debit_amount(&self) -> Decimal {
        self.debit
    }

    fn credit_amount(&self) -> Decimal {
        self.credit
    }
}

/// Input for creating a draft journal entry.
#[derive(Debug, Clone)]
pub struct NewJournalEntry {
    /// Accounting date.
    pub entry_date: NaiveDate,
    /// Free-text description.
    pub description: String,
    /// Upstream producer.
    pub source_type: SourceType,
    /// Originating record.
    pub source_id: Option<Uuid>,
    /// The lines (at least 2).
    pub lines: Vec<JournalLineInput>,
    /// The user creating the entry.
    pub created_by: UserId,
}

/// An entry with its lines, ordered by line number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntryDetail {
    /// The header.
    pub entry: JournalEntry,
    /// The lines.
    pub lines: Vec<JournalLine>,
}

/// Filter for listing journal entries. Empty fields match everything.
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    /// Only entries in this status.
    pub status: Option<EntryStatus>,
    /// Only entries from this source.
    pub source_type: Option<SourceType>,
    /// Entries dated on or after.
    pub from: Option<NaiveDate>,
    /// Entries dated on or before.
    pub to: Option<NaiveDate>,
}

impl EntryFilter {
    /// Returns true if the entry passes the filter.
    #[must_use]
    pub fn matches(&self, entry: &JournalEntry) -> bool {
        self.status.is_none_or(|s| entry.status == s)
            && self.source_type.is_none_or(|s| entry.source_type == s)
            && self.from.is_none_or(|d| entry.entry_date >= d)
            && self.to.is_none_or(|d| entry.entry_date <= d)
    }
}

/// Formats an entry code: `<PREFIX>-<YYYY>-<NNNNNN>`.
#[must_use]
pub fn entry_code(source_type: SourceType, entry_date: NaiveDate, sequence: i64) -> String {
    format!(
        "{}-{}-{:06}",
        source_type.code_prefix(),
        entry_date.year(),
        sequence
    )
}

/// Materializes line inputs into stored lines numbered 1..n.
#[must_use]
pub fn number_lines(journal_id: JournalEntryId, inputs: &[JournalLineInput]) -> Vec<JournalLine> {
    inputs
        .iter()
        .zip(1..)
        .map(|(input, line_number)| JournalLine {
            id: JournalLineId::new(),
            journal_id,
            account_id: input.account_id,
            line_number,
            debit_amount: input.debit,
            credit_amount: input.credit,
            description: input.description.clone(),
        })
        .collect()
}
