//! Journal entry operations: draft, post, reverse, delete.

use chrono::{NaiveDate, Utc};
use tally_shared::types::{JournalEntryId, UserId};
use tracing::info;

use super::{LedgerEngine, distinct_accounts, insert_draft, lock_with_ancestors, post_in_tx, read_accounts};
use crate::ledger::validation::{AccountPolicy, validate_entry};
use crate::ledger::{
    EntryFilter, JournalEntry, JournalEntryDetail, LedgerError, NewJournalEntry, PostingRules,
    SourceType,
};
use crate::store::{LedgerStore, LedgerTx};

impl<S: LedgerStore> LedgerEngine<S> {
    /// Validates and stores a draft entry.
    ///
    /// Drafts do not touch balances.
    ///
    /// # Errors
    ///
    /// Any validation error naming the first violated rule.
    pub async fn create_draft(
        &self,
        input: NewJournalEntry,
    ) -> Result<JournalEntryDetail, LedgerError> {
        self.bounded("create_draft", async move {
            let mut tx = self.store.begin().await?;
            let accounts = read_accounts(&mut tx, &distinct_accounts(&input.lines)).await?;
            validate_entry(&input.lines, &accounts)?;

            let detail = insert_draft(&mut tx, input).await?;
            tx.commit().await?;

            info!(
                entry_id = %detail.entry.id,
                entry_code = %detail.entry.code,
                source = %detail.entry.source_type,
                "draft journal entry created"
            );
            Ok(detail)
        })
        .await
    }

    /// Posts a draft and synchronizes every account it touches.
    ///
    /// The stored lines are re-validated; cached totals are recomputed.
    ///
    /// # Errors
    ///
    /// - `NotDraft` unless the entry is a draft
    /// - `PeriodClosed` if the entry date falls in a closed period
    /// - any validation error
    pub async fn post(
        &self,
        entry_id: JournalEntryId,
        posted_by: UserId,
    ) -> Result<JournalEntryDetail, LedgerError> {
        self.bounded("post", async move {
            let mut tx = self.store.begin().await?;
            let mut entry = tx
                .lock_entry(entry_id)
                .await?
                .ok_or(LedgerError::EntryNotFound(entry_id))?;
            PostingRules::ensure_postable(&entry)?;

            let lines = tx.entry_lines(entry_id).await?;
            let locked = lock_with_ancestors(&mut tx, &distinct_accounts(&lines)).await?;
            post_in_tx(&mut tx, &mut entry, &lines, posted_by, &locked, AccountPolicy::ActiveLeaf).await?;
            tx.commit().await?;

            info!(
                entry_id = %entry.id,
                entry_code = %entry.code,
                total = %entry.total_debit,
                "journal entry posted"
            );
            Ok(JournalEntryDetail { entry, lines })
        })
        .await
    }

    /// Reverses a posted entry with a mirrored, posted reversal entry.
    ///
    /// The reversal is dated `reversal_date` or, by default, the original date.
    /// Both entries are linked; the original becomes `REVERSED`.
    ///
    /// # Errors
    ///
    /// - `ReversalReasonRequired` for a blank reason
    /// - `NotPosted`, `AlreadyReversed`
    /// - `PeriodClosed` if the reversal date falls in a closed period
    pub async fn reverse(
        &self,
        entry_id: JournalEntryId,
        reason: &str,
        reversed_by: UserId,
        reversal_date: Option<NaiveDate>,
    ) -> Result<JournalEntryDetail, LedgerError> {
        if reason.trim().is_empty() {
            return Err(LedgerError::ReversalReasonRequired);
        }

        self.bounded("reverse", async move {
            let mut tx = self.store.begin().await?;
            let mut original = tx
                .lock_entry(entry_id)
                .await?
                .ok_or(LedgerError::EntryNotFound(entry_id))?;
            PostingRules::ensure_reversible(&original)?;

            let original_lines = tx.entry_lines(entry_id).await?;
            let input = NewJournalEntry {
                entry_date: reversal_date.unwrap_or(original.entry_date),
                description: PostingRules::reversal_description(&original, reason),
                source_type: SourceType::Reversal,
                source_id: Some(original.id.into_inner()),
                lines: PostingRules::reversal_lines(&original_lines),
                created_by: reversed_by,
            };
            let mut reversal = insert_draft(&mut tx, input).await?;

            let locked = lock_with_ancestors(&mut tx, &distinct_accounts(&reversal.lines)).await?;
            post_in_tx(
                &mut tx,
                &mut reversal.entry,
                &reversal.lines,
                reversed_by,
                &locked,
                AccountPolicy::AnyLeaf,
            )
            .await?;

            PostingRules::link_reversal(&mut original, &mut reversal.entry);
            tx.update_entry(&original).await?;
            tx.update_entry(&reversal.entry).await?;
            tx.commit().await?;

            info!(
                entry_id = %original.id,
                entry_code = %original.code,
                reversal_code = %reversal.entry.code,
                reason = reason.trim(),
                "journal entry reversed"
            );
            Ok(reversal)
        })
        .await
    }

    /// Tombstones a draft.
    ///
    /// # Errors
    ///
    /// `NotDraft` for posted or reversed entries.
    pub async fn delete_draft(&self, entry_id: JournalEntryId) -> Result<(), LedgerError> {
        self.bounded("delete_draft", async move {
            let mut tx = self.store.begin().await?;
            let mut entry = tx
                .lock_entry(entry_id)
                .await?
                .ok_or(LedgerError::EntryNotFound(entry_id))?;
            PostingRules::ensure_deletable(&entry)?;

            entry.deleted_at = Some(Utc::now());
            tx.update_entry(&entry).await?;
            tx.commit().await?;

            info!(entry_id = %entry.id, entry_code = %entry.code, "draft journal entry deleted");
            Ok(())
        })
        .await
    }

    /// Reads an entry with its lines.
    pub async fn get_entry(&self, entry_id: JournalEntryId) -> Result<JournalEntryDetail, LedgerError> {
        self.bounded("get_entry", async move {
            let mut tx = self.store.begin().await?;
            let entry = tx
                .find_entry(entry_id)
                .await?
                .ok_or(LedgerError::EntryNotFound(entry_id))?;
            let lines = tx.entry_lines(entry_id).await?;
            Ok(JournalEntryDetail { entry, lines })
        })
        .await
    }

    /// Lists live entries, ordered by date then code.
    pub async fn list_entries(&self, filter: EntryFilter) -> Result<Vec<JournalEntry>, LedgerError> {
        self.bounded("list_entries", async move {
            let mut tx = self.store.begin().await?;
            tx.list_entries(&filter).await
        })
        .await
    }
}
