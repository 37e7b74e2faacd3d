use crate::engine::Amount;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum AccountError {
    #[error("amount must be positive, got {0}")]
    NonPositiveAmount(Amount),
    #[error("amount must be a whole number, got {0}")]
    NonIntegralAmount(Amount),
    #[error("opening balance must not be negative, got {0}")]
    NegativeOpeningBalance(Amount),
    #[error("agent id must not be empty")]
    EmptyAgentId,
    #[error("deposit of {amount} would overflow balance {balance}")]
    Overflow { amount: Amount, balance: Amount },
    #[error("withdrawal of {amount} by {agent} timed out while blocked")]
    TimedOut { agent: String, amount: Amount },
}

#[derive(Debug, Error, PartialEq)]
pub enum SinkError {
    #[error("event stream is closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("trace write failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("audit log write failed: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{name} has invalid value {value:?}")]
    InvalidValue { name: &'static str, value: String },
    #[error("at least one depositor and one withdrawer are required")]
    EmptyRoster,
    #[error("{0} range is empty")]
    EmptyRange(&'static str),
    #[error("retrying blocked withdrawals cannot be combined with a withdrawal timeout")]
    RetryWithTimeout,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("agent {agent} failed: {source}")]
    Agent {
        agent: String,
        #[source]
        source: AccountError,
    },
    #[error("agent task could not be joined: {0}")]
    Join(#[from] tokio::task::JoinError),
}
