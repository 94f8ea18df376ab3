//! Reconciliation: compare cached state with the ledger of record and heal.

use tally_shared::types::AccountId;
use tracing::{info, warn};

use super::{LedgerEngine, lock_with_ancestors, sync_accounts};
use crate::ledger::{EntryFilter, IntegrityReport, LedgerError};
use crate::store::{LedgerStore, LedgerTx, LineScope};

/// Builds the report from one consistent read of the store.
async fn build_report<T: LedgerTx>(tx: &mut T) -> Result<IntegrityReport, LedgerError> {
    let accounts = tx.list_accounts().await?;
    let totals = tx.posted_totals(&LineScope::all()).await?;
    let entries = tx.list_entries(&EntryFilter::default()).await?;
    let entry_lines = tx.posted_entry_totals().await?;
    Ok(IntegrityReport::build(&accounts, &totals, &entries, &entry_lines))
}

fn log_report(report: &IntegrityReport) {
    if report.is_clean() {
        info!(
            accounts = report.accounts.len(),
            entries = report.entries.len(),
            "ledger integrity check passed"
        );
        return;
    }
    for drift in report.drift_errors() {
        warn!(%drift, "ledger drift detected");
    }
}

impl<S: LedgerStore> LedgerEngine<S> {
    /// Compares every cached balance and entry total with the ledger.
    ///
    /// Read-only and lock-free.
    pub async fn check_integrity(&self) -> Result<IntegrityReport, LedgerError> {
        self.bounded("check_integrity", async move {
            let mut tx = self.store.begin().await?;
            let report = build_report(&mut tx).await?;
            log_report(&report);
            Ok(report)
        })
        .await
    }

    /// Resynchronizes every drifted account and returns a fresh report.
    ///
    /// Entry totals are reported but never rewritten.
    pub async fn heal(&self) -> Result<IntegrityReport, LedgerError> {
        self.bounded("heal", async move {
            let mut tx = self.store.begin().await?;
            let before = build_report(&mut tx).await?;

            let (headers, leaves): (Vec<_>, Vec<_>) =
                before.drifted_accounts().partition(|check| check.is_header);
            let headers: Vec<AccountId> = headers.into_iter().map(|c| c.account_id).collect();
            let leaves: Vec<AccountId> = leaves.into_iter().map(|c| c.account_id).collect();

            if headers.is_empty() && leaves.is_empty() {
                log_report(&before);
                return Ok(before);
            }

            let touched: Vec<AccountId> = leaves.iter().chain(&headers).copied().collect();
            lock_with_ancestors(&mut tx, &touched).await?;
            let summary = sync_accounts(&mut tx, &leaves, &headers).await?;
            let after = build_report(&mut tx).await?;
            tx.commit().await?;

            info!(
                drifted = touched.len(),
                updated = summary.updated,
                "cached balances healed"
            );
            log_report(&after);
            Ok(after)
        })
        .await
    }
}
