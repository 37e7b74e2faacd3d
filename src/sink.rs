use crate::errors::SinkError;
use crate::transactions::TransactionEvent;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// Receives every event the account emits. Called while the account lock is
/// held, so implementations must return quickly and must not call back into
/// the account.
pub trait TransactionSink: Send + Sync {
    fn record(&self, event: &TransactionEvent) -> Result<(), SinkError>;
}

/// Forwards events to whoever holds the receiving half, usually the journal.
#[derive(Clone, Debug)]
pub struct ChannelSink {
    sender: UnboundedSender<TransactionEvent>,
}
impl ChannelSink {
    pub fn new() -> (Self, UnboundedReceiver<TransactionEvent>) {
        let (sender, receiver) = unbounded_channel();
        (ChannelSink { sender }, receiver)
    }
}
impl TransactionSink for ChannelSink {
    fn record(&self, event: &TransactionEvent) -> Result<(), SinkError> {
        self.sender
            .send(event.clone())
            .map_err(|_| SinkError::Closed)
    }
}

#[cfg(test)]
pub use recorder::MemorySink;
