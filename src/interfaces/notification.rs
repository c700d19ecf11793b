// ============================================================================
// Notification Interface
// Delivers trade legs to the users involved in a match
// ============================================================================

use crate::domain::{Trade, UserHandle};
use crossbeam::channel::{self, Receiver, Sender};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotifyError {
    #[error("notification receiver disconnected")]
    Disconnected,

    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

/// Notification sink for trades produced by a match.
///
/// Called after the book lock is released, once per book operation that
/// produced trades. Failures are logged by the caller and never propagated.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, trades: &[Trade]) -> Result<(), NotifyError>;
}

/// Group trade legs by the user they should be delivered to.
///
/// Legs of anonymous orders are dropped.
pub fn by_recipient(trades: &[Trade]) -> HashMap<UserHandle, Vec<Trade>> {
    let mut grouped: HashMap<UserHandle, Vec<Trade>> = HashMap::new();
    for trade in trades {
        if let Some(user) = &trade.user {
            grouped.entry(user.clone()).or_default().push(trade.clone());
        }
    }
    grouped
}

/// No-op notification sink for testing
pub struct NoOpNotificationSink;

impl NotificationSink for NoOpNotificationSink {
    fn notify(&self, _trades: &[Trade]) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Logging notification sink
pub struct LoggingNotificationSink;

impl NotificationSink for LoggingNotificationSink {
    fn notify(&self, trades: &[Trade]) -> Result<(), NotifyError> {
        for trade in trades {
            tracing::debug!(
                trade_id = %trade.id,
                order_id = %trade.order_id,
                kind = %trade.order_kind,
                side = %trade.side,
                price = trade.price,
                quantity = %trade.quantity,
                "trade"
            );
        }
        Ok(())
    }
}

/// Forwards every trade batch over a crossbeam channel.
pub struct ChannelNotificationSink {
    sender: Sender<Vec<Trade>>,
}

impl ChannelNotificationSink {
    pub fn new(sender: Sender<Vec<Trade>>) -> Self {
        Self { sender }
    }

    /// Sink paired with the receiving end of an unbounded channel.
    pub fn unbounded() -> (Self, Receiver<Vec<Trade>>) {
        let (sender, receiver) = channel::unbounded();
        (Self::new(sender), receiver)
    }
}

impl NotificationSink for ChannelNotificationSink {
    fn notify(&self, trades: &[Trade]) -> Result<(), NotifyError> {
        self.sender
            .send(trades.to_vec())
            .map_err(|_| NotifyError::Disconnected)
    }
}
