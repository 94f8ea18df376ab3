//! Periodic reconciliation sweep for Tally.
//!
//! Compares every cached balance and entry total with the ledger on a timer
//! and, when `reconciliation.auto_heal` is set, resynchronizes drifted
//! balances. The sweep is advisory: it never blocks ledger operations.
//!
//! Usage:
//!   reconciler         - Run forever, one sweep per `reconciliation.interval_secs`
//!   reconciler --once  - Run one sweep and print the report as JSON

use anyhow::Context;
use tally_core::LedgerEngine;
use tally_core::ledger::IntegrityReport;
use tally_db::LedgerRepository;
use tally_shared::{AppConfig, LoggingConfig, ReconciliationConfig};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.filter));
    let registry = tracing_subscriber::registry().with(filter);
    if logging.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn sweep(
    engine: &LedgerEngine<LedgerRepository>,
    settings: &ReconciliationConfig,
) -> anyhow::Result<IntegrityReport> {
    let report = engine.check_integrity().await?;
    if report.is_clean() || !settings.auto_heal {
        return Ok(report);
    }

    warn!(
        drifted_accounts = report.drifted_accounts().count(),
        "auto-heal enabled, resynchronizing drifted balances"
    );
    Ok(engine.heal().await?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("failed to load configuration")?;
    init_tracing(&config.logging);

    let db = tally_db::connect(&config.database)
        .await
        .context("failed to connect to database")?;
    let engine = LedgerEngine::new(LedgerRepository::new(db, &config.ledger), config.ledger.clone());
    info!(
        interval_secs = config.reconciliation.interval_secs,
        auto_heal = config.reconciliation.auto_heal,
        "reconciler started"
    );

    if std::env::args().any(|arg| arg == "--once") {
        let report = sweep(&engine, &config.reconciliation).await?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let mut ticker = tokio::time::interval(config.reconciliation.interval());
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match sweep(&engine, &config.reconciliation).await {
                    Ok(report) => info!(
                        clean = report.is_clean(),
                        accounts = report.accounts.len(),
                        entries = report.entries.len(),
                        "reconciliation sweep finished"
                    ),
                    // a failed sweep is retried on the next tick
                    Err(err) => error!(error = %err, "reconciliation sweep failed"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                break;
            }
        }
    }

    Ok(())
}
