use crate::engine::Amount;
use crate::errors::AccountError;
use crate::sink::TransactionSink;
use crate::transactions::TransactionEvent;
use chrono::Local;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tracing::{debug, warn};

/// Deposits strictly above this amount are flagged for audit.
pub const DEPOSIT_FLAG_THRESHOLD: Amount = dec!(350);
/// Withdrawals strictly above this amount are flagged for audit.
pub const WITHDRAWAL_FLAG_THRESHOLD: Amount = dec!(75);

/// How a call to [`Account::withdraw`] ended.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Withdrawal {
    /// Funds were taken; `balance` is what remains.
    Applied { balance: Amount },
    /// Funds were short, the caller waited for a deposit and was woken.
    /// Nothing was taken; `balance` is what the caller saw on waking.
    Woken { balance: Amount },
}

/// The single shared account.
///
/// Every read and write of the balance goes through one lock. A withdrawer
/// that finds the balance short parks on `sufficient_balance` and every
/// deposit wakes all parked withdrawers at once.
pub struct Account {
    balance: Mutex<Amount>,
    sufficient_balance: Notify,
    sink: Arc<dyn TransactionSink>,
}
impl Account {
    pub fn new(sink: Arc<dyn TransactionSink>) -> Self {
        Account {
            balance: Mutex::new(dec!(0)),
            sufficient_balance: Notify::new(),
            sink,
        }
    }
    /// Opens the account with funds already in it. The opening balance must
    /// be a whole, non-negative amount.
    pub fn with_balance(
        opening: Amount,
        sink: Arc<dyn TransactionSink>,
    ) -> Result<Self, AccountError> {
        if opening < dec!(0) {
            return Err(AccountError::NegativeOpeningBalance(opening));
        }
        if !opening.fract().is_zero() {
            return Err(AccountError::NonIntegralAmount(opening));
        }
        Ok(Account {
            balance: Mutex::new(opening),
            sufficient_balance: Notify::new(),
            sink,
        })
    }

    pub async fn balance(&self) -> Amount {
        *self.balance.lock().await
    }

    /// Adds `amount` and wakes every blocked withdrawer. Returns the new balance.
    pub async fn deposit(&self, amount: Amount, agent: &str) -> Result<Amount, AccountError> {
        validate(amount, agent)?;
        let mut balance = self.balance.lock().await;
        *balance = balance.checked_add(amount).ok_or(AccountError::Overflow {
            amount,
            balance: *balance,
        })?;
        self.emit(TransactionEvent::DepositApplied {
            agent: agent.to_string(),
            amount,
            balance: *balance,
        });
        if amount > DEPOSIT_FLAG_THRESHOLD {
            self.emit(TransactionEvent::DepositFlagged {
                agent: agent.to_string(),
                amount,
                at: Local::now(),
            });
        }
        // Waiters registered before releasing their guard, so none can slip
        // between this broadcast and their suspension.
        self.sufficient_balance.notify_waiters();
        Ok(*balance)
    }

    /// Takes `amount` if the balance covers it. Otherwise emits a blocked
    /// event, waits for the next deposit and returns [`Withdrawal::Woken`]
    /// without retrying; retrying is the caller's decision.
    pub async fn withdraw(&self, amount: Amount, agent: &str) -> Result<Withdrawal, AccountError> {
        self.withdraw_inner(amount, agent, None).await
    }

    /// `limit` only bounds the wait for a deposit, never the wait for the lock.
    async fn withdraw_inner(
        &self,
        amount: Amount,
        agent: &str,
        limit: Option<Duration>,
    ) -> Result<Withdrawal, AccountError> {
        validate(amount, agent)?;
        let mut balance = self.balance.lock().await;
        if amount <= *balance {
            *balance -= amount;
            self.emit(TransactionEvent::WithdrawalApplied {
                agent: agent.to_string(),
                amount,
                balance: *balance,
            });
            if amount > WITHDRAWAL_FLAG_THRESHOLD {
                self.emit(TransactionEvent::WithdrawalFlagged {
                    agent: agent.to_string(),
                    amount,
                    at: Local::now(),
                });
            }
            return Ok(Withdrawal::Applied { balance: *balance });
        }

        self.emit(TransactionEvent::WithdrawalBlocked {
            agent: agent.to_string(),
            amount,
        });
        debug!(agent, %amount, balance = %*balance, "withdrawal blocked, waiting for a deposit");
        let woken = self.sufficient_balance.notified();
        tokio::pin!(woken);
        woken.as_mut().enable();
        drop(balance);
        match limit {
            Some(limit) => {
                if tokio::time::timeout(limit, woken).await.is_err() {
                    debug!(agent, %amount, "blocked withdrawal gave up waiting");
                    return Err(AccountError::TimedOut {
                        agent: agent.to_string(),
                        amount,
                    });
                }
            }
            None => woken.await,
        }

        let balance = self.balance.lock().await;
        debug!(agent, %amount, balance = %*balance, "blocked withdrawal woken");
        Ok(Withdrawal::Woken { balance: *balance })
    }

    /// Keeps calling [`Account::withdraw`] until the withdrawal applies.
    /// Every unsatisfied attempt emits its own blocked event.
    pub async fn withdraw_until_applied(
        &self,
        amount: Amount,
        agent: &str,
    ) -> Result<Amount, AccountError> {
        loop {
            match self.withdraw(amount, agent).await? {
                Withdrawal::Applied { balance } => return Ok(balance),
                Withdrawal::Woken { .. } => continue,
            }
        }
    }

    /// [`Account::withdraw`] with an upper bound on the time spent blocked.
    /// Waiting for the lock does not count against `limit`.
    pub async fn withdraw_within(
        &self,
        amount: Amount,
        agent: &str,
        limit: Duration,
    ) -> Result<Withdrawal, AccountError> {
        self.withdraw_inner(amount, agent, Some(limit)).await
    }

    fn emit(&self, event: TransactionEvent) {
        if let Err(e) = self.sink.record(&event) {
            warn!(error = %e, kind = ?event.kind(), agent = event.agent(), "transaction event dropped");
        }
    }
}

fn validate(amount: Amount, agent: &str) -> Result<(), AccountError> {
    if amount <= dec!(0) {
        return Err(AccountError::NonPositiveAmount(amount));
    }
    if !amount.fract().is_zero() {
        return Err(AccountError::NonIntegralAmount(amount));
    }
    if agent.trim().is_empty() {
        return Err(AccountError::EmptyAgentId);
    }
    Ok(())
}
