use crate::account::{DEPOSIT_FLAG_THRESHOLD, WITHDRAWAL_FLAG_THRESHOLD};
use crate::engine::Amount;
use crate::errors::JournalError;
use crate::transactions::TransactionEvent;
use std::io::Write;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, warn};

const TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// Turns the event stream into the console trace and the flagged-transaction
/// audit log.
pub struct Journal<T: Write, A: Write> {
    trace: T,
    audit: csv::Writer<A>,
}

#[derive(Debug, serde::Serialize)]
struct AuditRecord<'a> {
    agent: &'a str,
    kind: &'static str,
    amount: Amount,
    timestamp: String,
}

impl<T: Write, A: Write> Journal<T, A> {
    pub fn new(trace: T, audit: A) -> Self {
        Journal {
            trace,
            audit: csv::Writer::from_writer(audit),
        }
    }

    pub fn write_banner(&mut self) -> Result<(), JournalError> {
        self.trace.write_all(
            b"Deposit Agents\t\t\t   Withdrawal Agents   \t\t        Balance\n\
              --------------\t\t\t   -----------------   \t\t------------------------\n",
        )?;
        Ok(())
    }

    pub fn record(&mut self, event: &TransactionEvent) -> Result<(), JournalError> {
        self.trace.write_all(trace_line(event).as_bytes())?;
        let kind = match event {
            TransactionEvent::DepositFlagged { .. } => "deposit",
            TransactionEvent::WithdrawalFlagged { .. } => "withdrawal",
            _ => return Ok(()),
        };
        self.audit.serialize(AuditRecord {
            agent: event.agent(),
            kind,
            amount: event.amount(),
            timestamp: event
                .timestamp()
                .map(|at| at.format(TIMESTAMP_FORMAT).to_string())
                .unwrap_or_default(),
        })?;
        Ok(())
    }

    /// Writes events until every sender is gone. A failed write is logged
    /// and skipped; only the final flush can fail the journal.
    pub fn drain(
        mut self,
        mut receiver: UnboundedReceiver<TransactionEvent>,
    ) -> Result<usize, JournalError> {
        if let Err(e) = self.write_banner() {
            warn!(error = %e, "could not write trace banner");
        }
        let mut written = 0;
        while let Some(event) = receiver.blocking_recv() {
            match self.record(&event) {
                Ok(()) => written += 1,
                Err(e) => warn!(
                    error = %e,
                    kind = ?event.kind(),
                    agent = event.agent(),
                    balance = ?event.balance(),
                    "journal entry lost"
                ),
            }
        }
        self.finish()?;
        info!(written, "journal closed");
        Ok(written)
    }

    pub fn finish(&mut self) -> Result<(), JournalError> {
        self.trace.flush()?;
        self.audit.flush()?;
        Ok(())
    }
}

pub fn trace_line(event: &TransactionEvent) -> String {
    match event {
        TransactionEvent::DepositApplied {
            agent,
            amount,
            balance,
        } => format!(
            "Agent {} deposits ${}\t\t\t\t\t\t(+) Balance is ${}\n",
            agent, amount, balance
        ),
        TransactionEvent::WithdrawalApplied {
            agent,
            amount,
            balance,
        } => format!(
            "\t\t\t\tAgent {} withdraws ${}\t\t(-) Balance is ${}\n",
            agent, amount, balance
        ),
        TransactionEvent::WithdrawalBlocked { agent, amount } => format!(
            "\t\t\t\tAgent {} withdraws ${}\t\t(******) WITHDRAWAL BLOCKED - INSUFFICIENT FUNDS!!!\n",
            agent, amount
        ),
        TransactionEvent::DepositFlagged { agent, .. } => format!(
            "\n* * * Flagged Transaction - Depositor Agent {} Made A Deposit In Excess Of ${:.2} USD - See Flagged Transaction Log.\n\n",
            agent, DEPOSIT_FLAG_THRESHOLD
        ),
        TransactionEvent::WithdrawalFlagged { agent, .. } => format!(
            "\n* * * Flagged Transaction - Withdrawal Agent {} Made A Withdrawal In Excess Of ${:.2} USD - See Flagged Transaction Log.\n\n",
            agent, WITHDRAWAL_FLAG_THRESHOLD
        ),
    }
}
