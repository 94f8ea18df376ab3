//! Journal entry lifecycle rules.
//!
//! `DRAFT → POSTED → REVERSED`. Posted entries are never edited or deleted;
//! they are neutralized by a reversal entry whose lines mirror the original.

use super::entry::{JournalEntry, JournalLine, JournalLineInput};
use super::error::LedgerError;
use super::types::EntryStatus;

/// Stateless lifecycle rules for journal entries.
pub struct PostingRules;

impl PostingRules {
    /// Only drafts can be posted.
    pub fn ensure_postable(entry: &JournalEntry) -> Result<(), LedgerError> {
        Self::ensure_draft(entry)
    }

    /// Only drafts can be deleted.
    pub fn ensure_deletable(entry: &JournalEntry) -> Result<(), LedgerError> {
        Self::ensure_draft(entry)
    }

    /// Only posted entries without a reversal link can be reversed.
    ///
    /// A reversal entry links back to its original, so it cannot be reversed either.
    pub fn ensure_reversible(entry: &JournalEntry) -> Result<(), LedgerError> {
        if entry.status == EntryStatus::Reversed || entry.reversal_id.is_some() {
            return Err(LedgerError::AlreadyReversed(entry.id));
        }
        if entry.status != EntryStatus::Posted {
            return Err(LedgerError::NotPosted {
                entry_id: entry.id,
                status: entry.status,
            });
        }
        Ok(())
    }

    fn ensure_draft(entry: &JournalEntry) -> Result<(), LedgerError> {
        if entry.status.is_editable() {
            Ok(())
        } else {
            Err(LedgerError::NotDraft {
                entry_id: entry.id,
                status: entry.status,
            })
        }
    }

    /// Mirror lines: debits become credits and vice versa, in line order.
    #[must_use]
    pub fn reversal_lines(original: &[JournalLine]) -> Vec<JournalLineInput> {
        let mut ordered: Vec<&JournalLine> = original.iter().collect();
        ordered.sort_by_key(|l| l.line_number);
        ordered
            .into_iter()
            .map(|line| JournalLineInput {
                account_id: line.account_id,
                debit: line.credit_amount,
                credit: line.debit_amount,
                description: format!("Reversal: {}", line.description),
            })
            .collect()
    }

    /// Description of the reversal entry.
    #[must_use]
    pub fn reversal_description(original: &JournalEntry, reason: &str) -> String {
        format!("Reversal of {}. Reason: {}", original.code, reason.trim())
    }

    /// Links an original entry and its reversal to each other.
    pub fn link_reversal(original: &mut JournalEntry, reversal: &mut JournalEntry) {
        original.status = EntryStatus::Reversed;
        original.reversal_id = Some(reversal.id);
        reversal.reversal_id = Some(original.id);
    }
}
