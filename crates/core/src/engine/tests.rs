use chrono::NaiveDate;
use futures::future::join_all;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tally_shared::LedgerConfig;
use tally_shared::types::{AccountId, JournalEntryId, PeriodId, UserId};

use super::LedgerEngine;
use crate::ledger::{
    AccountType, DriftError, EntryFilter, EntryStatus, JournalLineInput, LedgerError, NewAccount,
    NewJournalEntry, SourceType,
};
use crate::store::{LedgerStore, LedgerTx, MemoryStore};

fn date(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, month, day).unwrap()
}

struct Fixture {
    engine: LedgerEngine<MemoryStore>,
    user: UserId,
    assets: AccountId,
    cash: AccountId,
    bank: AccountId,
    payables: AccountId,
    retained: AccountId,
    sales: AccountId,
    rent: AccountId,
    january: PeriodId,
    february: PeriodId,
}

impl Fixture {
    async fn new() -> Self {
        Self::with_config(LedgerConfig::default()).await
    }

    async fn with_config(config: LedgerConfig) -> Self {
        let engine = LedgerEngine::new(MemoryStore::new(), config);
        let chart = [
            NewAccount::header("1000", "Assets", AccountType::Asset),
            NewAccount::leaf("1101", "Cash", AccountType::Asset).under("1000"),
            NewAccount::leaf("1102", "Bank", AccountType::Asset).under("1000"),
            NewAccount::leaf("2101", "Accounts Payable", AccountType::Liability),
            NewAccount::header("3000", "Equity", AccountType::Equity),
            NewAccount::leaf("3201", "Retained Earnings", AccountType::Equity).under("3000"),
            NewAccount::leaf("4101", "Sales", AccountType::Revenue),
            NewAccount::leaf("5101", "Rent Expense", AccountType::Expense),
        ];
        let mut ids = Vec::new();
        for account in chart {
            ids.push(engine.create_account(account).await.unwrap().id);
        }
        let january = engine
            .create_period("January 2026", date(1, 1), date(1, 31))
            .await
            .unwrap()
            .id;
        let february = engine
            .create_period("February 2026", date(2, 1), date(2, 28))
            .await
            .unwrap()
            .id;

        Self {
            engine,
            user: UserId::new(),
            assets: ids[0],
            cash: ids[1],
            bank: ids[2],
            payables: ids[3],
            retained: ids[5],
            sales: ids[6],
            rent: ids[7],
            january,
            february,
        }
    }

    fn entry(&self, entry_date: NaiveDate, lines: Vec<JournalLineInput>) -> NewJournalEntry {
        NewJournalEntry {
            entry_date,
            description: "Test entry".to_string(),
            source_type: SourceType::Manual,
            source_id: None,
            lines,
            created_by: self.user,
        }
    }

    async fn post(&self, entry_date: NaiveDate, lines: Vec<JournalLineInput>) -> JournalEntryId {
        let draft = self.engine.create_draft(self.entry(entry_date, lines)).await.unwrap();
        self.engine.post(draft.entry.id, self.user).await.unwrap();
        draft.entry.id
    }

    async fn post_sale(&self, entry_date: NaiveDate, amount: Decimal) -> JournalEntryId {
        self.post(
            entry_date,
            vec![
                JournalLineInput::debit(self.cash, amount, "Cash sale"),
                JournalLineInput::credit(self.sales, amount, "Cash sale"),
            ],
        )
        .await
    }

    async fn derived(&self, id: AccountId) -> Decimal {
        self.engine.derive_balance(id).await.unwrap()
    }

    async fn cached(&self, id: AccountId) -> Decimal {
        self.engine.get_account(id).await.unwrap().balance
    }

    async fn entry_count(&self) -> usize {
        self.engine.list_entries(EntryFilter::default()).await.unwrap().len()
    }

    /// Overwrites a cached balance behind the engine's back.
    async fn corrupt(&self, id: AccountId, balance: Decimal) {
        let mut tx = self.engine.store().begin().await.unwrap();
        tx.write_balance(id, balance).await.unwrap();
        tx.commit().await.unwrap();
    }
}

// ========== Posting ==========

#[tokio::test]
async fn test_post_then_close_scenario() {
    let f = Fixture::new().await;
    f.post_sale(date(1, 10), dec!(1000)).await;

    assert_eq!(f.derived(f.cash).await, dec!(1000));
    assert_eq!(f.derived(f.sales).await, dec!(1000));
    assert_eq!(f.cached(f.cash).await, dec!(1000));
    assert_eq!(f.cached(f.sales).await, dec!(1000));

    let outcome = f.engine.close_period(f.january, f.user).await.unwrap();
    assert!(outcome.period.is_closed);
    assert_eq!(outcome.period.net_income, dec!(1000));

    assert_eq!(f.derived(f.sales).await, Decimal::ZERO);
    assert_eq!(f.derived(f.retained).await, dec!(1000));
    assert_eq!(f.derived(f.cash).await, dec!(1000));

    let entries_before = f.entry_count().await;
    let again = f.engine.close_period(f.january, f.user).await;
    assert!(matches!(again, Err(LedgerError::AlreadyClosed(id)) if id == f.january));
    assert_eq!(f.entry_count().await, entries_before);
}

#[tokio::test]
async fn test_unbalanced_entry_rejected_without_side_effects() {
    let f = Fixture::new().await;
    let input = f.entry(
        date(1, 5),
        vec![
            JournalLineInput::debit(f.cash, dec!(500), "A"),
            JournalLineInput::credit(f.bank, dec!(400), "B"),
        ],
    );

    let result = f.engine.create_draft(input).await;
    assert!(matches!(
        result,
        Err(LedgerError::UnbalancedEntry { debit, credit }) if debit == dec!(500) && credit == dec!(400)
    ));
    assert_eq!(f.cached(f.cash).await, Decimal::ZERO);
    assert_eq!(f.cached(f.bank).await, Decimal::ZERO);
    assert_eq!(f.entry_count().await, 0);
}

#[tokio::test]
async fn test_draft_does_not_touch_balances() {
    let f = Fixture::new().await;
    let draft = f
        .engine
        .create_draft(f.entry(
            date(1, 5),
            vec![
                JournalLineInput::debit(f.cash, dec!(75), "Deposit"),
                JournalLineInput::credit(f.payables, dec!(75), "Deposit"),
            ],
        ))
        .await
        .unwrap();

    assert_eq!(draft.entry.status, EntryStatus::Draft);
    assert_eq!(draft.entry.code, "JE-2026-000001");
    assert_eq!(draft.lines.len(), 2);
    assert_eq!(draft.lines[0].line_number, 1);
    assert_eq!(f.derived(f.cash).await, Decimal::ZERO);

    let posted = f.engine.post(draft.entry.id, f.user).await.unwrap();
    assert_eq!(posted.entry.status, EntryStatus::Posted);
    assert_eq!(posted.entry.posted_by, Some(f.user));
    assert_eq!(f.derived(f.payables).await, dec!(75));

    let twice = f.engine.post(draft.entry.id, f.user).await;
    assert!(matches!(twice, Err(LedgerError::NotDraft { status: EntryStatus::Posted, .. })));
}

#[tokio::test]
async fn test_header_and_inactive_accounts_reject_lines() {
    let f = Fixture::new().await;
    let to_header = f
        .engine
        .create_draft(f.entry(
            date(1, 5),
            vec![
                JournalLineInput::debit(f.assets, dec!(10), "Header"),
                JournalLineInput::credit(f.sales, dec!(10), "Header"),
            ],
        ))
        .await;
    assert!(matches!(
        to_header,
        Err(LedgerError::HeaderAccountPosting { code, .. }) if code == "1000"
    ));

    f.engine.deactivate_account(f.bank).await.unwrap();
    let to_inactive = f
        .engine
        .create_draft(f.entry(
            date(1, 5),
            vec![
                JournalLineInput::debit(f.bank, dec!(10), "Inactive"),
                JournalLineInput::credit(f.sales, dec!(10), "Inactive"),
            ],
        ))
        .await;
    assert!(matches!(
        to_inactive,
        Err(LedgerError::AccountInactive { code, .. }) if code == "1102"
    ));
}

#[tokio::test]
async fn test_delete_draft() {
    let f = Fixture::new().await;
    let draft = f
        .engine
        .create_draft(f.entry(
            date(1, 5),
            vec![
                JournalLineInput::debit(f.cash, dec!(10), "Scratch"),
                JournalLineInput::credit(f.sales, dec!(10), "Scratch"),
            ],
        ))
        .await
        .unwrap();

    f.engine.delete_draft(draft.entry.id).await.unwrap();
    assert!(matches!(
        f.engine.get_entry(draft.entry.id).await,
        Err(LedgerError::EntryNotFound(_))
    ));

    let posted = f.post_sale(date(1, 6), dec!(10)).await;
    assert!(matches!(
        f.engine.delete_draft(posted).await,
        Err(LedgerError::NotDraft { .. })
    ));
}

#[tokio::test]
async fn test_header_balance_is_children_rollup() {
    let f = Fixture::new().await;
    f.post_sale(date(1, 10), dec!(600)).await;
    f.post(
        date(1, 11),
        vec![
            JournalLineInput::debit(f.bank, dec!(150), "Transfer"),
            JournalLineInput::credit(f.cash, dec!(150), "Transfer"),
        ],
    )
    .await;

    assert_eq!(f.cached(f.cash).await, dec!(450));
    assert_eq!(f.cached(f.bank).await, dec!(150));
    assert_eq!(f.cached(f.assets).await, dec!(600));
    assert_eq!(f.derived(f.assets).await, dec!(600));
}

// ========== Reversal ==========

#[tokio::test]
async fn test_reversal_restores_balances() {
    let f = Fixture::new().await;
    f.post_sale(date(1, 3), dec!(40)).await;
    let before_cash = f.derived(f.cash).await;
    let before_sales = f.derived(f.sales).await;

    let original = f.post_sale(date(1, 10), dec!(300)).await;
    let reversal = f
        .engine
        .reverse(original, "Duplicate invoice", f.user, None)
        .await
        .unwrap();

    assert_eq!(reversal.entry.source_type, SourceType::Reversal);
    assert_eq!(reversal.entry.status, EntryStatus::Posted);
    assert_eq!(reversal.entry.entry_date, date(1, 10));
    assert_eq!(reversal.entry.reversal_id, Some(original));
    assert!(reversal.entry.code.starts_with("RV-2026-"));
    assert!(reversal.entry.description.ends_with("Reason: Duplicate invoice"));

    let original = f.engine.get_entry(original).await.unwrap().entry;
    assert_eq!(original.status, EntryStatus::Reversed);
    assert_eq!(original.reversal_id, Some(reversal.entry.id));

    assert_eq!(f.derived(f.cash).await, before_cash);
    assert_eq!(f.derived(f.sales).await, before_sales);
    assert_eq!(f.cached(f.cash).await, before_cash);
}

#[tokio::test]
async fn test_reversal_guards() {
    let f = Fixture::new().await;
    let original = f.post_sale(date(1, 10), dec!(300)).await;

    assert!(matches!(
        f.engine.reverse(original, "   ", f.user, None).await,
        Err(LedgerError::ReversalReasonRequired)
    ));

    let reversal = f.engine.reverse(original, "Wrong amount", f.user, None).await.unwrap();
    assert!(matches!(
        f.engine.reverse(original, "Again", f.user, None).await,
        Err(LedgerError::AlreadyReversed(id)) if id == original
    ));
    assert!(matches!(
        f.engine.reverse(reversal.entry.id, "Undo", f.user, None).await,
        Err(LedgerError::AlreadyReversed(_))
    ));

    let draft = f
        .engine
        .create_draft(f.entry(
            date(1, 12),
            vec![
                JournalLineInput::debit(f.cash, dec!(5), "Draft"),
                JournalLineInput::credit(f.sales, dec!(5), "Draft"),
            ],
        ))
        .await
        .unwrap();
    assert!(matches!(
        f.engine.reverse(draft.entry.id, "Not posted", f.user, None).await,
        Err(LedgerError::NotPosted { status: EntryStatus::Draft, .. })
    ));
}

#[tokio::test]
async fn test_reversal_touching_deactivated_account() {
    let f = Fixture::new().await;
    let services = f
        .engine
        .create_account(NewAccount::leaf("4201", "Service Revenue", AccountType::Revenue))
        .await
        .unwrap()
        .id;
    let original = f
        .post(
            date(1, 10),
            vec![
                JournalLineInput::debit(f.cash, dec!(100), "Consulting"),
                JournalLineInput::credit(services, dec!(100), "Consulting"),
            ],
        )
        .await;
    f.post(
        date(2, 10),
        vec![
            JournalLineInput::debit(services, dec!(100), "Refund"),
            JournalLineInput::credit(f.cash, dec!(100), "Refund"),
        ],
    )
    .await;
    let deactivated = f.engine.deactivate_account(services).await.unwrap();
    assert!(!deactivated.is_active);

    let reversal = f
        .engine
        .reverse(original, "Billed in error", f.user, None)
        .await
        .unwrap();
    assert_eq!(reversal.entry.status, EntryStatus::Posted);
    assert_eq!(f.derived(services).await, dec!(-100));
    assert_eq!(f.cached(services).await, dec!(-100));
    assert!(!f.engine.get_account(services).await.unwrap().is_active);

    let to_inactive = f
        .engine
        .create_draft(f.entry(
            date(2, 12),
            vec![
                JournalLineInput::debit(f.cash, dec!(5), "Late fee"),
                JournalLineInput::credit(services, dec!(5), "Late fee"),
            ],
        ))
        .await;
    assert!(matches!(
        to_inactive,
        Err(LedgerError::AccountInactive { code, .. }) if code == "4201"
    ));
}

// ========== Synchronization ==========

#[tokio::test]
async fn test_sync_balance_is_idempotent() {
    let f = Fixture::new().await;
    f.post_sale(date(1, 10), dec!(250)).await;
    f.corrupt(f.cash, dec!(1)).await;

    let first = f.engine.sync_balance(f.cash).await.unwrap();
    assert_eq!(first.updated, 1);
    let stored = f.cached(f.cash).await;
    assert_eq!(stored, f.derived(f.cash).await);

    let second = f.engine.sync_balance(f.cash).await.unwrap();
    assert_eq!(second.updated, 0);
    assert_eq!(f.cached(f.cash).await, stored);
}

#[tokio::test]
async fn test_sync_all_matches_per_account_sync() {
    let f = Fixture::new().await;
    f.post_sale(date(1, 10), dec!(250)).await;
    f.post(
        date(1, 12),
        vec![
            JournalLineInput::debit(f.rent, dec!(90), "Rent"),
            JournalLineInput::credit(f.bank, dec!(90), "Rent"),
        ],
    )
    .await;
    f.corrupt(f.cash, dec!(7)).await;
    f.corrupt(f.assets, dec!(-3)).await;
    f.corrupt(f.rent, Decimal::ZERO).await;

    let summary = f.engine.sync_all().await.unwrap();
    assert_eq!(summary.updated, 3);

    for account in f.engine.list_accounts().await.unwrap() {
        assert_eq!(
            account.balance,
            f.derived(account.id).await,
            "account {}",
            account.code
        );
    }
    assert_eq!(f.cached(f.assets).await, dec!(160));
}

#[tokio::test]
async fn test_derive_balance_as_of_and_trial_balance() {
    let f = Fixture::new().await;
    f.post_sale(date(1, 10), dec!(100)).await;
    f.post_sale(date(2, 10), dec!(50)).await;

    assert_eq!(
        f.engine.derive_balance_as_of(f.cash, date(1, 31)).await.unwrap(),
        dec!(100)
    );
    assert_eq!(f.derived(f.cash).await, dec!(150));

    let january = f.engine.trial_balance(Some(date(1, 31))).await.unwrap();
    assert!(january.is_balanced());
    assert_eq!(january.total_debit, dec!(100));

    let full = f.engine.trial_balance(None).await.unwrap();
    assert!(full.is_balanced());
    assert_eq!(full.total_for(AccountType::Revenue), dec!(150));
}

// ========== Closing ==========

#[tokio::test]
async fn test_closing_law_with_net_income() {
    let f = Fixture::new().await;
    f.post_sale(date(1, 10), dec!(1000)).await;
    f.post(
        date(1, 20),
        vec![
            JournalLineInput::debit(f.rent, dec!(200), "January rent"),
            JournalLineInput::credit(f.cash, dec!(200), "January rent"),
        ],
    )
    .await;
    // February activity stays out of the January close
    f.post_sale(date(2, 3), dec!(70)).await;

    let preview = f.engine.preview_close(f.january).await.unwrap();
    assert_eq!(preview.net_income, dec!(800));
    assert_eq!(preview.retained_earnings_code, "3201");
    assert_eq!(preview.lines.len(), 3);
    assert!(!f.engine.get_period(f.january).await.unwrap().is_closed);

    let retained_before = f.derived(f.retained).await;
    let outcome = f.engine.close_period(f.january, f.user).await.unwrap();
    let closing = outcome.closing_entry.unwrap();

    assert_eq!(closing.entry.source_type, SourceType::Closing);
    assert_eq!(closing.entry.entry_date, date(1, 31));
    assert_eq!(closing.entry.status, EntryStatus::Posted);
    assert_eq!(closing.lines.len(), 3);
    assert_eq!(outcome.period.total_revenue, dec!(1000));
    assert_eq!(outcome.period.total_expense, dec!(200));
    assert_eq!(outcome.period.closing_journal_id, Some(closing.entry.id));

    let as_of_end = |id| f.engine.derive_balance_as_of(id, date(1, 31));
    assert_eq!(as_of_end(f.sales).await.unwrap(), Decimal::ZERO);
    assert_eq!(as_of_end(f.rent).await.unwrap(), Decimal::ZERO);
    assert_eq!(f.derived(f.retained).await - retained_before, dec!(800));
    assert_eq!(f.derived(f.sales).await, dec!(70));

    let report = f.engine.check_integrity().await.unwrap();
    assert!(report.is_clean());
}

#[tokio::test]
async fn test_closing_preview_serializes_to_json() {
    let f = Fixture::new().await;
    f.post_sale(date(1, 10), dec!(250.50)).await;

    let preview = f.engine.preview_close(f.january).await.unwrap();
    let json = serde_json::to_value(&preview).unwrap();
    assert_eq!(json["retained_earnings_code"], "3201");
    assert_eq!(json["lines"].as_array().unwrap().len(), 2);
    assert_eq!(json["lines"][0]["account_id"], serde_json::to_value(f.sales).unwrap());

    let decoded: super::ClosingPreview = serde_json::from_value(json).unwrap();
    assert_eq!(decoded, preview);
}

#[tokio::test]
async fn test_deactivated_revenue_account_still_closes() {
    let f = Fixture::new().await;
    let services = f
        .engine
        .create_account(NewAccount::leaf("4201", "Service Revenue", AccountType::Revenue))
        .await
        .unwrap()
        .id;
    f.post(
        date(1, 10),
        vec![
            JournalLineInput::debit(f.cash, dec!(100), "Consulting"),
            JournalLineInput::credit(services, dec!(100), "Consulting"),
        ],
    )
    .await;
    f.post(
        date(2, 10),
        vec![
            JournalLineInput::debit(services, dec!(100), "Refund"),
            JournalLineInput::credit(f.cash, dec!(100), "Refund"),
        ],
    )
    .await;
    f.engine.deactivate_account(services).await.unwrap();

    let january = f.engine.close_period(f.january, f.user).await.unwrap();
    assert_eq!(january.period.net_income, dec!(100));
    let closing = january.closing_entry.unwrap();
    assert!(closing.lines.iter().any(|l| l.account_id == services && l.debit_amount == dec!(100)));
    assert_eq!(
        f.engine.derive_balance_as_of(services, date(1, 31)).await.unwrap(),
        Decimal::ZERO
    );

    let february = f.engine.close_period(f.february, f.user).await.unwrap();
    assert_eq!(february.period.net_income, dec!(-100));
    assert_eq!(f.derived(services).await, Decimal::ZERO);
    assert!(!f.engine.get_account(services).await.unwrap().is_active);
    assert!(f.engine.check_integrity().await.unwrap().is_clean());
}

#[tokio::test]
async fn test_closing_net_loss() {
    let f = Fixture::new().await;
    f.post_sale(date(1, 10), dec!(100)).await;
    f.post(
        date(1, 20),
        vec![
            JournalLineInput::debit(f.rent, dec!(250), "Rent"),
            JournalLineInput::credit(f.payables, dec!(250), "Rent"),
        ],
    )
    .await;

    let outcome = f.engine.close_period(f.january, f.user).await.unwrap();
    assert_eq!(outcome.period.net_income, dec!(-150));
    assert_eq!(f.derived(f.retained).await, dec!(-150));
}

#[tokio::test]
async fn test_balance_sheet_identity_after_close() {
    let f = Fixture::new().await;
    f.post_sale(date(1, 10), dec!(1000)).await;
    f.post(
        date(1, 15),
        vec![
            JournalLineInput::debit(f.rent, dec!(300), "Rent on credit"),
            JournalLineInput::credit(f.payables, dec!(300), "Rent on credit"),
        ],
    )
    .await;
    f.engine.close_period(f.january, f.user).await.unwrap();

    let tb = f.engine.trial_balance(None).await.unwrap();
    assert_eq!(
        tb.total_for(AccountType::Asset),
        tb.total_for(AccountType::Liability) + tb.total_for(AccountType::Equity)
    );
    assert_eq!(tb.total_for(AccountType::Revenue), Decimal::ZERO);
    assert_eq!(tb.total_for(AccountType::Expense), Decimal::ZERO);
}

#[tokio::test]
async fn test_empty_period_closes_without_entry() {
    let f = Fixture::new().await;
    let outcome = f.engine.close_period(f.january, f.user).await.unwrap();

    assert!(outcome.closing_entry.is_none());
    assert!(outcome.period.is_closed);
    assert_eq!(outcome.period.net_income, Decimal::ZERO);
    assert_eq!(f.entry_count().await, 0);
    assert_eq!(
        f.engine.last_closed_period().await.unwrap().map(|p| p.id),
        Some(f.january)
    );
}

#[tokio::test]
async fn test_periods_close_in_order() {
    let f = Fixture::new().await;
    let result = f.engine.close_period(f.february, f.user).await;
    assert!(matches!(
        result,
        Err(LedgerError::PeriodOrder { period_id, open_period_id })
            if period_id == f.february && open_period_id == f.january
    ));

    f.engine.close_period(f.january, f.user).await.unwrap();
    f.engine.close_period(f.february, f.user).await.unwrap();
    assert_eq!(
        f.engine.last_closed_period().await.unwrap().map(|p| p.id),
        Some(f.february)
    );
}

#[tokio::test]
async fn test_period_validation_and_lookup() {
    let f = Fixture::new().await;
    assert!(matches!(
        f.engine.create_period("Bad", date(3, 31), date(3, 1)).await,
        Err(LedgerError::InvalidPeriodRange { .. })
    ));
    assert!(matches!(
        f.engine.create_period("Overlap", date(1, 15), date(2, 15)).await,
        Err(LedgerError::OverlappingPeriod { .. })
    ));

    let found = f.engine.period_for_date(date(2, 14)).await.unwrap();
    assert_eq!(found.map(|p| p.id), Some(f.february));
    assert!(f.engine.period_for_date(date(6, 1)).await.unwrap().is_none());
    assert_eq!(f.engine.list_periods().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_closed_period_rejects_postings() {
    let f = Fixture::new().await;
    let sale = f.post_sale(date(1, 10), dec!(100)).await;
    f.engine.close_period(f.january, f.user).await.unwrap();

    let late = f
        .engine
        .create_draft(f.entry(
            date(1, 25),
            vec![
                JournalLineInput::debit(f.cash, dec!(5), "Late"),
                JournalLineInput::credit(f.sales, dec!(5), "Late"),
            ],
        ))
        .await
        .unwrap();
    assert!(matches!(
        f.engine.post(late.entry.id, f.user).await,
        Err(LedgerError::PeriodClosed(d)) if d == date(1, 25)
    ));

    assert!(matches!(
        f.engine.reverse(sale, "Returned", f.user, None).await,
        Err(LedgerError::PeriodClosed(_))
    ));
    let reversal = f
        .engine
        .reverse(sale, "Returned", f.user, Some(date(2, 2)))
        .await
        .unwrap();
    assert_eq!(reversal.entry.entry_date, date(2, 2));
}

#[tokio::test]
async fn test_missing_retained_earnings_blocks_close() {
    let config = LedgerConfig {
        retained_earnings_code: "3999".to_string(),
        ..LedgerConfig::default()
    };
    let f = Fixture::with_config(config).await;

    assert!(matches!(
        f.engine.close_period(f.january, f.user).await,
        Err(LedgerError::RetainedEarningsNotFound(code)) if code == "3999"
    ));
    assert!(!f.engine.get_period(f.january).await.unwrap().is_closed);
}

// ========== Reconciliation ==========

#[tokio::test]
async fn test_drift_blocks_closing_until_healed() {
    let f = Fixture::new().await;
    f.post_sale(date(1, 10), dec!(500)).await;
    f.corrupt(f.sales, dec!(499)).await;
    let entries_before = f.entry_count().await;

    let result = f.engine.close_period(f.january, f.user).await;
    assert!(matches!(result, Err(LedgerError::DriftDetected { count: 1 })));
    assert!(!f.engine.get_period(f.january).await.unwrap().is_closed);
    assert_eq!(f.entry_count().await, entries_before);

    f.engine.heal().await.unwrap();
    f.engine.close_period(f.january, f.user).await.unwrap();
}

#[tokio::test]
async fn test_heal_clears_every_drift() {
    let f = Fixture::new().await;
    f.post_sale(date(1, 10), dec!(500)).await;
    f.post(
        date(1, 11),
        vec![
            JournalLineInput::debit(f.bank, dec!(200), "Deposit"),
            JournalLineInput::credit(f.cash, dec!(200), "Deposit"),
        ],
    )
    .await;
    f.corrupt(f.cash, dec!(1)).await;
    f.corrupt(f.assets, dec!(42)).await;

    let report = f.engine.check_integrity().await.unwrap();
    assert!(!report.is_clean());
    let codes: Vec<_> = report.drifted_accounts().map(|a| a.code.as_str()).collect();
    assert_eq!(codes, ["1000", "1101"]);
    assert!(report
        .drift_errors()
        .iter()
        .any(|e| matches!(e, DriftError::Account { code, .. } if code == "1101")));

    let healed = f.engine.heal().await.unwrap();
    assert!(healed.is_clean());
    assert!(f.engine.check_integrity().await.unwrap().is_clean());
    assert_eq!(f.cached(f.cash).await, dec!(300));
    assert_eq!(f.cached(f.assets).await, dec!(500));
}

#[tokio::test]
async fn test_heal_leaves_entries_alone() {
    let f = Fixture::new().await;
    let sale = f.post_sale(date(1, 10), dec!(500)).await;
    let before = f.engine.get_entry(sale).await.unwrap();

    let report = f.engine.heal().await.unwrap();
    assert!(report.is_clean());
    assert_eq!(f.engine.get_entry(sale).await.unwrap(), before);
}

// ========== Accounts ==========

#[tokio::test]
async fn test_account_registry_rules() {
    let f = Fixture::new().await;

    assert!(matches!(
        f.engine
            .create_account(NewAccount::leaf("1101", "Petty cash", AccountType::Asset))
            .await,
        Err(LedgerError::DuplicateAccountCode(code)) if code == "1101"
    ));
    assert!(matches!(
        f.engine
            .create_account(NewAccount::leaf("  ", "Blank", AccountType::Asset))
            .await,
        Err(LedgerError::EmptyAccountCode)
    ));
    assert!(matches!(
        f.engine
            .create_account(NewAccount::leaf("4102", "Misfiled", AccountType::Revenue).under("1000"))
            .await,
        Err(LedgerError::InvalidParent(code)) if code == "1000"
    ));

    let petty = f
        .engine
        .create_account(NewAccount::leaf("1103", "Petty Cash", AccountType::Asset).under("1000"))
        .await
        .unwrap();
    assert_eq!(petty.level, 2);
    assert_eq!(petty.parent_id, Some(f.assets));
    assert_eq!(f.engine.get_account_by_code("1103").await.unwrap().id, petty.id);

    f.post_sale(date(1, 10), dec!(10)).await;
    assert!(matches!(
        f.engine.deactivate_account(f.cash).await,
        Err(LedgerError::AccountHasBalance { code, .. }) if code == "1101"
    ));
    assert!(matches!(
        f.engine.delete_account(f.cash).await,
        Err(LedgerError::AccountInUse(code)) if code == "1101"
    ));
    assert!(matches!(
        f.engine.delete_account(f.assets).await,
        Err(LedgerError::AccountHasChildren(code)) if code == "1000"
    ));

    f.engine.delete_account(petty.id).await.unwrap();
    assert!(matches!(
        f.engine.get_account(petty.id).await,
        Err(LedgerError::AccountNotFound(_))
    ));
    assert!(matches!(
        f.engine.get_account_by_code("1103").await,
        Err(LedgerError::AccountCodeNotFound(_))
    ));
}

// ========== Concurrency ==========

#[tokio::test]
async fn test_concurrent_postings_do_not_lose_updates() {
    let f = Fixture::new().await;
    let drafts = join_all((0..20).map(|_| {
        f.engine.create_draft(f.entry(
            date(1, 10),
            vec![
                JournalLineInput::debit(f.cash, dec!(10), "Concurrent"),
                JournalLineInput::credit(f.sales, dec!(10), "Concurrent"),
            ],
        ))
    }))
    .await;

    let posts = join_all(
        drafts
            .into_iter()
            .map(|d| f.engine.post(d.unwrap().entry.id, f.user)),
    )
    .await;
    assert!(posts.iter().all(Result::is_ok));

    assert_eq!(f.cached(f.cash).await, dec!(200));
    assert_eq!(f.derived(f.cash).await, dec!(200));
    assert_eq!(f.cached(f.assets).await, dec!(200));

    let codes: std::collections::BTreeSet<_> = f
        .engine
        .list_entries(EntryFilter::default())
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.code)
        .collect();
    assert_eq!(codes.len(), 20);
}

#[tokio::test]
async fn test_transaction_timeout_rolls_back() {
    let config = LedgerConfig {
        transaction_timeout_secs: 1,
        ..LedgerConfig::default()
    };
    let f = Fixture::with_config(config).await;

    let blocker = f.engine.store().begin().await.unwrap();
    let result = f.engine.sync_all().await;
    assert!(matches!(result, Err(LedgerError::TransactionTimeout { secs: 1 })));
    assert!(result.unwrap_err().is_retryable());
    drop(blocker);

    assert!(f.engine.sync_all().await.is_ok());
}
