//! Development seeder for Tally.
//!
//! Seeds a small chart of accounts, including the retained earnings account
//! used at period close, and twelve monthly accounting periods for the given
//! year. Existing accounts and periods are left alone, so it can run twice.
//!
//! Usage: cargo run --bin seeder [-- <year>]

use anyhow::Context;
use chrono::{Datelike, NaiveDate, Utc};
use tally_core::LedgerEngine;
use tally_core::ledger::{AccountType, LedgerError, NewAccount};
use tally_db::LedgerRepository;
use tally_shared::AppConfig;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Parent headers come before their children.
fn chart(retained_earnings_code: &str) -> Vec<NewAccount> {
    vec![
        NewAccount::header("1000", "Assets", AccountType::Asset),
        NewAccount::header("1100", "Current Assets", AccountType::Asset).under("1000"),
        NewAccount::leaf("1101", "Cash", AccountType::Asset).under("1100"),
        NewAccount::leaf("1102", "Bank", AccountType::Asset).under("1100"),
        NewAccount::leaf("1201", "Accounts Receivable", AccountType::Asset).under("1100"),
        NewAccount::leaf("1301", "Inventory", AccountType::Asset).under("1100"),
        NewAccount::header("2000", "Liabilities", AccountType::Liability),
        NewAccount::leaf("2101", "Accounts Payable", AccountType::Liability).under("2000"),
        NewAccount::leaf("2201", "Taxes Payable", AccountType::Liability).under("2000"),
        NewAccount::header("3000", "Equity", AccountType::Equity),
        NewAccount::leaf("3101", "Owner's Capital", AccountType::Equity).under("3000"),
        NewAccount::leaf(retained_earnings_code, "Retained Earnings", AccountType::Equity)
            .under("3000"),
        NewAccount::header("4000", "Revenue", AccountType::Revenue),
        NewAccount::leaf("4101", "Sales", AccountType::Revenue).under("4000"),
        NewAccount::leaf("4201", "Other Income", AccountType::Revenue).under("4000"),
        NewAccount::header("5000", "Expenses", AccountType::Expense),
        NewAccount::leaf("5101", "Cost of Goods Sold", AccountType::Expense).under("5000"),
        NewAccount::leaf("5201", "Rent Expense", AccountType::Expense).under("5000"),
        NewAccount::leaf("5301", "Salaries Expense", AccountType::Expense).under("5000"),
    ]
}

/// First and last day of every month of `year`.
fn months(year: i32) -> Vec<(String, NaiveDate, NaiveDate)> {
    (1..=12)
        .filter_map(|month| {
            let start = NaiveDate::from_ymd_opt(year, month, 1)?;
            let next = if month == 12 {
                NaiveDate::from_ymd_opt(year + 1, 1, 1)?
            } else {
                NaiveDate::from_ymd_opt(year, month + 1, 1)?
            };
            let end = next.pred_opt()?;
            Some((start.format("%B %Y").to_string(), start, end))
        })
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("failed to load configuration")?;
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.filter)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let year = match std::env::args().nth(1) {
        Some(arg) => arg.parse().context("year must be a number")?,
        None => Utc::now().year(),
    };

    let db = tally_db::connect(&config.database)
        .await
        .context("failed to connect to database")?;
    let engine = LedgerEngine::new(LedgerRepository::new(db, &config.ledger), config.ledger.clone());

    info!("seeding chart of accounts");
    let mut created = 0;
    for account in chart(&config.ledger.retained_earnings_code) {
        match engine.create_account(account).await {
            Ok(_) => created += 1,
            Err(LedgerError::DuplicateAccountCode(code)) => {
                info!(account_code = %code, "account already exists, skipping");
            }
            Err(err) => return Err(err.into()),
        }
    }
    info!(created, "chart of accounts seeded");

    info!(year, "seeding accounting periods");
    let mut created = 0;
    for (name, start, end) in months(year) {
        if engine.period_for_date(start).await?.is_some() {
            info!(period = %name, "period already exists, skipping");
            continue;
        }
        engine.create_period(&name, start, end).await?;
        created += 1;
    }
    info!(created, "accounting periods seeded");

    Ok(())
}
