use crate::account::{Account, Withdrawal};
use crate::engine::Amount;
use crate::errors::AccountError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Depositor,
    Withdrawer,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Agent {
    pub id: String,
    pub role: Role,
}
impl Agent {
    /// `DT0..` depositors followed by `WT0..` withdrawers.
    pub fn roster(depositors: usize, withdrawers: usize) -> Vec<Agent> {
        let depositors = (0..depositors).map(|i| Agent {
            id: format!("DT{}", i),
            role: Role::Depositor,
        });
        let withdrawers = (0..withdrawers).map(|i| Agent {
            id: format!("WT{}", i),
            role: Role::Withdrawer,
        });
        depositors.chain(withdrawers).collect()
    }
}

/// What one agent did over its run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AgentTally {
    pub deposits: usize,
    pub deposited: Amount,
    pub withdrawals: usize,
    pub withdrawn: Amount,
    /// Withdrawals that waited, were woken and gave up on their amount.
    pub blocked: usize,
    /// Withdrawals that gave up after the configured timeout.
    pub timed_out: usize,
    /// Withdrawals still waiting when the run shut down.
    pub cancelled: usize,
}

/// Amount and pacing policy for a single agent.
pub struct AgentPlan {
    pub rounds: usize,
    pub amounts: RangeInclusive<u32>,
    pub pause_ms: RangeInclusive<u64>,
    pub retry_blocked: bool,
    pub timeout: Option<Duration>,
    rng: StdRng,
}
impl AgentPlan {
    pub fn new(
        rounds: usize,
        amounts: RangeInclusive<u32>,
        pause_ms: RangeInclusive<u64>,
        retry_blocked: bool,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        AgentPlan {
            rounds,
            amounts,
            pause_ms,
            retry_blocked,
            timeout: None,
            rng,
        }
    }
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
    fn next_amount(&mut self) -> Amount {
        Decimal::from(self.rng.gen_range(self.amounts.clone()))
    }
    fn next_pause(&mut self) -> Duration {
        Duration::from_millis(self.rng.gen_range(self.pause_ms.clone()))
    }
}

pub async fn run_depositor(
    id: String,
    account: Arc<Account>,
    mut plan: AgentPlan,
) -> Result<AgentTally, AccountError> {
    let mut tally = AgentTally::default();
    for _ in 0..plan.rounds {
        let amount = plan.next_amount();
        let balance = account.deposit(amount, &id).await?;
        debug!(agent = %id, %amount, %balance, "deposit applied");
        tally.deposits += 1;
        tally.deposited += amount;
        tokio::time::sleep(plan.next_pause()).await;
    }
    info!(agent = %id, deposits = tally.deposits, deposited = %tally.deposited, "depositor finished");
    Ok(tally)
}

/// Withdraws until its rounds are spent. Once `shutdown` turns true, a
/// withdrawal that would block is abandoned and the agent stops.
pub async fn run_withdrawer(
    id: String,
    account: Arc<Account>,
    mut plan: AgentPlan,
    mut shutdown: watch::Receiver<bool>,
) -> Result<AgentTally, AccountError> {
    let mut tally = AgentTally::default();
    for _ in 0..plan.rounds {
        let amount = plan.next_amount();
        let attempt = async {
            match (plan.retry_blocked, plan.timeout) {
                (true, _) => account
                    .withdraw_until_applied(amount, &id)
                    .await
                    .map(|balance| Withdrawal::Applied { balance }),
                (false, Some(limit)) => account.withdraw_within(amount, &id, limit).await,
                (false, None) => account.withdraw(amount, &id).await,
            }
        };
        let outcome = tokio::select! {
            biased;
            outcome = attempt => outcome,
            _ = shutdown_requested(&mut shutdown) => {
                debug!(agent = %id, %amount, "blocked withdrawal abandoned at shutdown");
                tally.cancelled += 1;
                break;
            }
        };
        match outcome {
            Ok(Withdrawal::Applied { balance }) => {
                debug!(agent = %id, %amount, %balance, "withdrawal applied");
                tally.withdrawals += 1;
                tally.withdrawn += amount;
            }
            Ok(Withdrawal::Woken { balance }) => {
                debug!(agent = %id, %amount, %balance, "woken without funds taken");
                tally.blocked += 1;
            }
            Err(AccountError::TimedOut { .. }) => {
                debug!(agent = %id, %amount, "blocked withdrawal timed out");
                tally.timed_out += 1;
            }
            Err(e) => return Err(e),
        }
        tokio::time::sleep(plan.next_pause()).await;
    }
    info!(
        agent = %id,
        withdrawals = tally.withdrawals,
        withdrawn = %tally.withdrawn,
        blocked = tally.blocked,
        timed_out = tally.timed_out,
        cancelled = tally.cancelled,
        "withdrawer finished"
    );
    Ok(tally)
}

async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    // a dropped sender also ends the run
    let _ = shutdown.wait_for(|done| *done).await;
}

#[cfg(test)]
mod test {
    use crate::account::Account;
    use crate::agents::{run_depositor, run_withdrawer, Agent, AgentPlan, Role};
    use crate::sink::MemorySink;
    use crate::transactions::EventKind;
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::watch;
    use tokio::time::timeout;

    #[test]
    fn roster_names_depositors_then_withdrawers() {
        let roster = Agent::roster(2, 3);
        let ids: Vec<&str> = roster.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["DT0", "DT1", "WT0", "WT1", "WT2"]);
        assert_eq!(roster[1].role, Role::Depositor);
        assert_eq!(roster[2].role, Role::Withdrawer);
    }
    #[test]
    fn seeded_plans_repeat_amounts() {
        let mut a = AgentPlan::new(3, 1..=500, 0..=0, false, Some(7));
        let mut b = AgentPlan::new(3, 1..=500, 0..=0, false, Some(7));
        for _ in 0..10 {
            let amount = a.next_amount();
            assert_eq!(amount, b.next_amount());
            assert!(amount >= dec!(1) && amount <= dec!(500));
        }
    }
    #[tokio::test]
    async fn depositor_spends_its_rounds() {
        let sink = Arc::new(MemorySink::default());
        let account = Arc::new(Account::new(sink.clone()));
        let plan = AgentPlan::new(4, 10..=10, 0..=0, false, Some(1));
        let tally = run_depositor("DT0".to_string(), account.clone(), plan)
            .await
            .unwrap();
        assert_eq!(tally.deposits, 4);
        assert_eq!(tally.deposited, dec!(40));
        assert_eq!(account.balance().await, dec!(40));
        assert_eq!(sink.count(EventKind::DepositApplied), 4);
    }
    #[tokio::test]
    async fn withdrawer_takes_what_is_available() {
        let sink = Arc::new(MemorySink::default());
        let account = Arc::new(Account::with_balance(dec!(100), sink.clone()).unwrap());
        let (_shutdown, receiver) = watch::channel(false);
        let plan = AgentPlan::new(5, 20..=20, 0..=0, false, Some(1));
        let tally = run_withdrawer("WT0".to_string(), account.clone(), plan, receiver)
            .await
            .unwrap();
        assert_eq!(tally.withdrawals, 5);
        assert_eq!(tally.withdrawn, dec!(100));
        assert_eq!(account.balance().await, dec!(0));
    }
    #[tokio::test]
    async fn shutdown_abandons_blocked_withdrawal() {
        let sink = Arc::new(MemorySink::default());
        let account = Arc::new(Account::with_balance(dec!(30), sink.clone()).unwrap());
        let (shutdown, receiver) = watch::channel(false);
        let plan = AgentPlan::new(3, 20..=20, 0..=0, false, Some(1));
        let withdrawer = tokio::spawn(run_withdrawer(
            "WT0".to_string(),
            account.clone(),
            plan,
            receiver,
        ));
        timeout(Duration::from_secs(5), async {
            while sink.count(EventKind::WithdrawalBlocked) == 0 {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .unwrap();
        shutdown.send(true).unwrap();

        let tally = timeout(Duration::from_secs(5), withdrawer)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(tally.withdrawals, 1);
        assert_eq!(tally.cancelled, 1);
        assert_eq!(account.balance().await, dec!(10));
    }
    #[tokio::test]
    async fn timed_out_withdrawal_moves_on() {
        let sink = Arc::new(MemorySink::default());
        let account = Arc::new(Account::with_balance(dec!(25), sink.clone()).unwrap());
        let (_shutdown, receiver) = watch::channel(false);
        let plan = AgentPlan::new(3, 20..=20, 0..=0, false, Some(1))
            .with_timeout(Some(Duration::from_millis(10)));
        let tally = run_withdrawer("WT0".to_string(), account.clone(), plan, receiver)
            .await
            .unwrap();
        assert_eq!(tally.withdrawals, 1);
        assert_eq!(tally.timed_out, 2);
        assert_eq!(tally.cancelled, 0);
        assert_eq!(sink.count(EventKind::WithdrawalBlocked), 2);
        assert_eq!(account.balance().await, dec!(5));
    }
    #[tokio::test]
    async fn retrying_withdrawer_waits_for_enough_funds() {
        let sink = Arc::new(MemorySink::default());
        let account = Arc::new(Account::new(sink.clone()));
        let (_shutdown, receiver) = watch::channel(false);
        let plan = AgentPlan::new(1, 90..=90, 0..=0, true, Some(1));
        let withdrawer = tokio::spawn(run_withdrawer(
            "WT0".to_string(),
            account.clone(),
            plan,
            receiver,
        ));
        let deposits = AgentPlan::new(3, 40..=40, 1..=1, false, Some(2));
        run_depositor("DT0".to_string(), account.clone(), deposits)
            .await
            .unwrap();

        let tally = timeout(Duration::from_secs(5), withdrawer)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(tally.withdrawals, 1);
        assert_eq!(tally.blocked, 0);
        assert_eq!(account.balance().await, dec!(30));
        assert_eq!(sink.count(EventKind::WithdrawalFlagged), 1);
    }
}
