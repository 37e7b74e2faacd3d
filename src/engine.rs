use crate::account::Account;
use crate::agents::{run_depositor, run_withdrawer, Agent, AgentPlan, AgentTally, Role};
use crate::config::EngineConfig;
use crate::errors::{AccountError, EngineError};
use crate::sink::TransactionSink;
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

pub type Amount = Decimal;

type AgentHandle = (String, JoinHandle<Result<AgentTally, AccountError>>);

/// Runs the agent roster against one shared account.
pub struct Engine {
    account: Arc<Account>,
    config: EngineConfig,
}
impl Engine {
    pub fn new(config: EngineConfig, sink: Arc<dyn TransactionSink>) -> Result<Self, EngineError> {
        Self::with_account(config, Arc::new(Account::new(sink)))
    }
    pub fn with_account(config: EngineConfig, account: Arc<Account>) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Engine { account, config })
    }

    /// Spawns every agent, waits for the depositors, then tells withdrawers
    /// still waiting on funds that no more deposits are coming.
    pub async fn run(self) -> Result<RunSummary, EngineError> {
        let opening = self.account.balance().await;
        let (shutdown, shutdown_rx) = watch::channel(false);
        let mut depositors: Vec<AgentHandle> = vec![];
        let mut withdrawers: Vec<AgentHandle> = vec![];
        let roster = Agent::roster(self.config.depositors, self.config.withdrawers);
        info!(
            depositors = self.config.depositors,
            withdrawers = self.config.withdrawers,
            rounds = self.config.rounds,
            "starting agents"
        );
        for (index, agent) in roster.into_iter().enumerate() {
            let seed = self.config.seed.map(|s| s.wrapping_add(index as u64));
            let account = self.account.clone();
            match agent.role {
                Role::Depositor => {
                    let plan = AgentPlan::new(
                        self.config.rounds,
                        self.config.deposit_range.clone(),
                        self.config.deposit_pause_ms.clone(),
                        false,
                        seed,
                    );
                    let handle = tokio::spawn(run_depositor(agent.id.clone(), account, plan));
                    depositors.push((agent.id, handle));
                }
                Role::Withdrawer => {
                    let plan = AgentPlan::new(
                        self.config.rounds,
                        self.config.withdrawal_range.clone(),
                        self.config.withdrawal_pause_ms.clone(),
                        self.config.retry_blocked,
                        seed,
                    )
                    .with_timeout(self.config.withdrawal_timeout);
                    let handle = tokio::spawn(run_withdrawer(
                        agent.id.clone(),
                        account,
                        plan,
                        shutdown_rx.clone(),
                    ));
                    withdrawers.push((agent.id, handle));
                }
            }
        }
        drop(shutdown_rx);

        let mut summary = RunSummary::new(opening);
        let deposited = join_all(depositors).await;
        info!("depositors finished, releasing blocked withdrawers");
        let _ = shutdown.send(true);
        let withdrawn = join_all(withdrawers).await;
        for tally in deposited?.into_iter().chain(withdrawn?) {
            summary.absorb(&tally);
        }
        summary.final_balance = self.account.balance().await;
        info!(final_balance = %summary.final_balance, "run complete");
        Ok(summary)
    }
}

async fn join_all(handles: Vec<AgentHandle>) -> Result<Vec<AgentTally>, EngineError> {
    let mut tallies = vec![];
    let mut failure = None;
    for (agent, handle) in handles {
        match handle.await {
            Ok(Ok(tally)) => tallies.push(tally),
            Ok(Err(source)) => {
                failure.get_or_insert(EngineError::Agent { agent, source });
            }
            Err(e) => {
                failure.get_or_insert(EngineError::Join(e));
            }
        }
    }
    match failure {
        Some(e) => Err(e),
        None => Ok(tallies),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub opening_balance: Amount,
    pub final_balance: Amount,
    pub deposits: usize,
    pub deposited: Amount,
    pub withdrawals: usize,
    pub withdrawn: Amount,
    pub blocked: usize,
    pub timed_out: usize,
    pub cancelled: usize,
}
impl RunSummary {
    fn new(opening_balance: Amount) -> Self {
        RunSummary {
            opening_balance,
            final_balance: opening_balance,
            deposits: 0,
            deposited: dec!(0),
            withdrawals: 0,
            withdrawn: dec!(0),
            blocked: 0,
            timed_out: 0,
            cancelled: 0,
        }
    }
    fn absorb(&mut self, tally: &AgentTally) {
        self.deposits += tally.deposits;
        self.deposited += tally.deposited;
        self.withdrawals += tally.withdrawals;
        self.withdrawn += tally.withdrawn;
        self.blocked += tally.blocked;
        self.timed_out += tally.timed_out;
        self.cancelled += tally.cancelled;
    }
    /// Every applied transaction is accounted for in the final balance.
    pub fn is_balanced(&self) -> bool {
        self.final_balance == self.opening_balance + self.deposited - self.withdrawn
    }
}
impl Display for RunSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} deposits (${}), {} withdrawals (${}), {} woken unpaid, {} timed out, {} abandoned; balance ${} -> ${}",
            self.deposits,
            self.deposited.normalize(),
            self.withdrawals,
            self.withdrawn.normalize(),
            self.blocked,
            self.timed_out,
            self.cancelled,
            self.opening_balance.normalize(),
            self.final_balance.normalize()
        )
    }
}
