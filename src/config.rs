//! Run configuration for the agent roster.
//!
//! Defaults reproduce the reference run; `SHARED_ACCOUNT_*` environment
//! variables (optionally from a `.env` file) override them.

use crate::errors::ConfigError;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const ENV_PREFIX: &str = "SHARED_ACCOUNT_";

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Number of depositor agents, named `DT0..`.
    pub depositors: usize,
    /// Number of withdrawer agents, named `WT0..`.
    pub withdrawers: usize,
    /// Transactions each agent attempts before it stops.
    pub rounds: usize,
    /// Whole-dollar range deposits are drawn from.
    pub deposit_range: RangeInclusive<u32>,
    /// Whole-dollar range withdrawals are drawn from.
    pub withdrawal_range: RangeInclusive<u32>,
    /// Pause between a depositor's transactions, in milliseconds.
    pub deposit_pause_ms: RangeInclusive<u64>,
    /// Pause between a withdrawer's transactions, in milliseconds.
    pub withdrawal_pause_ms: RangeInclusive<u64>,
    /// Seed for reproducible amounts; fresh entropy when absent.
    pub seed: Option<u64>,
    /// Withdrawers retry a blocked amount until it applies instead of moving on.
    pub retry_blocked: bool,
    /// Give up on a single blocked withdrawal after this long.
    pub withdrawal_timeout: Option<Duration>,
    /// CSV file receiving flagged transactions.
    pub audit_log: PathBuf,
    /// File receiving the transaction trace; stdout when absent.
    pub trace_log: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            depositors: 5,
            withdrawers: 10,
            rounds: 20,
            deposit_range: 1..=500,
            withdrawal_range: 1..=99,
            deposit_pause_ms: 50..=250,
            withdrawal_pause_ms: 5..=60,
            seed: None,
            retry_blocked: false,
            withdrawal_timeout: None,
            audit_log: PathBuf::from("transactions.csv"),
            trace_log: None,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(v) = parse_var(&lookup, "DEPOSITORS")? {
            config.depositors = v;
        }
        if let Some(v) = parse_var(&lookup, "WITHDRAWERS")? {
            config.withdrawers = v;
        }
        if let Some(v) = parse_var(&lookup, "ROUNDS")? {
            config.rounds = v;
        }
        if let Some(v) = parse_var(&lookup, "SEED")? {
            config.seed = Some(v);
        }
        if let Some(v) = parse_var(&lookup, "RETRY_BLOCKED")? {
            config.retry_blocked = v;
        }
        if let Some(ms) = parse_var(&lookup, "WITHDRAWAL_TIMEOUT_MS")? {
            config.withdrawal_timeout = Some(Duration::from_millis(ms));
        }
        if let Some(path) = lookup(&format!("{ENV_PREFIX}AUDIT_LOG")) {
            config.audit_log = PathBuf::from(path);
        }
        if let Some(path) = lookup(&format!("{ENV_PREFIX}TRACE_LOG")) {
            config.trace_log = Some(PathBuf::from(path));
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.depositors == 0 || self.withdrawers == 0 {
            return Err(ConfigError::EmptyRoster);
        }
        if self.deposit_range.is_empty() || *self.deposit_range.start() == 0 {
            return Err(ConfigError::EmptyRange("deposit"));
        }
        if self.withdrawal_range.is_empty() || *self.withdrawal_range.start() == 0 {
            return Err(ConfigError::EmptyRange("withdrawal"));
        }
        if self.deposit_pause_ms.is_empty() {
            return Err(ConfigError::EmptyRange("deposit pause"));
        }
        if self.withdrawal_pause_ms.is_empty() {
            return Err(ConfigError::EmptyRange("withdrawal pause"));
        }
        if self.retry_blocked && self.withdrawal_timeout.is_some() {
            return Err(ConfigError::RetryWithTimeout);
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(&format!("{ENV_PREFIX}{name}")) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { name, value: raw }),
    }
}
