use crate::engine::Amount;
use chrono::{DateTime, Local};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    DepositApplied,
    WithdrawalApplied,
    WithdrawalBlocked,
    DepositFlagged,
    WithdrawalFlagged,
}

/// One state transition of the account, handed to the sink as it happens.
///
/// Applied variants carry the balance after the mutation; a blocked
/// withdrawal never changed it, and flagged variants only carry the moment
/// the threshold was crossed.
#[derive(Clone, Debug, PartialEq)]
pub enum TransactionEvent {
    DepositApplied {
        agent: String,
        amount: Amount,
        balance: Amount,
    },
    WithdrawalApplied {
        agent: String,
        amount: Amount,
        balance: Amount,
    },
    WithdrawalBlocked {
        agent: String,
        amount: Amount,
    },
    DepositFlagged {
        agent: String,
        amount: Amount,
        at: DateTime<Local>,
    },
    WithdrawalFlagged {
        agent: String,
        amount: Amount,
        at: DateTime<Local>,
    },
}

impl TransactionEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            TransactionEvent::DepositApplied { .. } => EventKind::DepositApplied,
            TransactionEvent::WithdrawalApplied { .. } => EventKind::WithdrawalApplied,
            TransactionEvent::WithdrawalBlocked { .. } => EventKind::WithdrawalBlocked,
            TransactionEvent::DepositFlagged { .. } => EventKind::DepositFlagged,
            TransactionEvent::WithdrawalFlagged { .. } => EventKind::WithdrawalFlagged,
        }
    }
    pub fn agent(&self) -> &str {
        match self {
            TransactionEvent::DepositApplied { agent, .. }
            | TransactionEvent::WithdrawalApplied { agent, .. }
            | TransactionEvent::WithdrawalBlocked { agent, .. }
            | TransactionEvent::DepositFlagged { agent, .. }
            | TransactionEvent::WithdrawalFlagged { agent, .. } => agent,
        }
    }
    pub fn amount(&self) -> Amount {
        match self {
            TransactionEvent::DepositApplied { amount, .. }
            | TransactionEvent::WithdrawalApplied { amount, .. }
            | TransactionEvent::WithdrawalBlocked { amount, .. }
            | TransactionEvent::DepositFlagged { amount, .. }
            | TransactionEvent::WithdrawalFlagged { amount, .. } => *amount,
        }
    }
    /// Balance after the transition, absent for blocked and flagged events.
    pub fn balance(&self) -> Option<Amount> {
        match self {
            TransactionEvent::DepositApplied { balance, .. }
            | TransactionEvent::WithdrawalApplied { balance, .. } => Some(*balance),
            _ => None,
        }
    }
    pub fn timestamp(&self) -> Option<DateTime<Local>> {
        match self {
            TransactionEvent::DepositFlagged { at, .. }
            | TransactionEvent::WithdrawalFlagged { at, .. } => Some(*at),
            _ => None,
        }
    }
}

#[cfg(test)]
mod test {
    use crate::transactions::{EventKind, TransactionEvent};
    use chrono::Local;
    use rust_decimal_macros::dec;

    #[test]
    fn blocked_withdrawal_has_no_balance_or_timestamp() {
        let event = TransactionEvent::WithdrawalBlocked {
            agent: "WT1".to_string(),
            amount: dec!(40),
        };
        assert_eq!(event.kind(), EventKind::WithdrawalBlocked);
        assert_eq!(event.agent(), "WT1");
        assert_eq!(event.amount(), dec!(40));
        assert_eq!(event.balance(), None);
        assert_eq!(event.timestamp(), None);
    }
    #[test]
    fn flagged_deposit_carries_timestamp_only() {
        let now = Local::now();
        let event = TransactionEvent::DepositFlagged {
            agent: "DT0".to_string(),
            amount: dec!(420),
            at: now,
        };
        assert_eq!(event.kind(), EventKind::DepositFlagged);
        assert_eq!(event.balance(), None);
        assert_eq!(event.timestamp(), Some(now));
    }
    #[test]
    fn applied_withdrawal_reports_resulting_balance() {
        let event = TransactionEvent::WithdrawalApplied {
            agent: "WT2".to_string(),
            amount: dec!(10),
            balance: dec!(90),
        };
        assert_eq!(event.kind(), EventKind::WithdrawalApplied);
        assert_eq!(event.balance(), Some(dec!(90)));
        assert_eq!(event.timestamp(), None);
    }
}
