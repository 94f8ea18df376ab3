//! Application configuration management.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Ledger engine configuration.
    #[serde(default)]
    pub ledger: LedgerConfig,
    /// Reconciliation sweep configuration.
    #[serde(default)]
    pub reconciliation: ReconciliationConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Ledger engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Code of the equity account that absorbs net income at period close.
    #[serde(default = "default_retained_earnings_code")]
    pub retained_earnings_code: String,
    /// Upper bound for one ledger unit of work, in seconds.
    #[serde(default = "default_transaction_timeout")]
    pub transaction_timeout_secs: u64,
    /// How long a unit of work waits for a row lock, in milliseconds.
    #[serde(default = "default_lock_timeout")]
    pub lock_timeout_ms: u64,
}

fn default_retained_earnings_code() -> String {
    "3201".to_string()
}

fn default_transaction_timeout() -> u64 {
    30
}

fn default_lock_timeout() -> u64 {
    5_000
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            retained_earnings_code: default_retained_earnings_code(),
            transaction_timeout_secs: default_transaction_timeout(),
            lock_timeout_ms: default_lock_timeout(),
        }
    }
}

impl LedgerConfig {
    /// Returns the transaction timeout as a `Duration`.
    #[must_use]
    pub const fn transaction_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.transaction_timeout_secs)
    }
}

/// Reconciliation sweep configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconciliationConfig {
    /// Seconds between two integrity checks.
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    /// Whether detected drift is healed automatically.
    #[serde(default)]
    pub auto_heal: bool,
}

fn default_interval() -> u64 {
    3_600 // 1 hour
}

impl ReconciliationConfig {
    /// Returns the sweep interval as a `Duration`.
    #[must_use]
    pub const fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.interval_secs)
    }
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            auto_heal: false,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive when `RUST_LOG` is unset.
    #[serde(default = "default_filter")]
    pub filter: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_filter() -> String {
    "info,sea_orm=warn,sqlx=warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded or a duration is zero.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("TALLY").separator("__"))
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), config::ConfigError> {
        if self.reconciliation.interval_secs == 0 {
            return Err(config::ConfigError::Message(
                "reconciliation.interval_secs must be at least 1".to_string(),
            ));
        }
        if self.ledger.transaction_timeout_secs == 0 {
            return Err(config::ConfigError::Message(
                "ledger.transaction_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
