// ============================================================================
// Interfaces Module
// Contains the contracts for the services the order book calls out to
// ============================================================================

mod notification;
mod persistence;

pub use notification::{
    by_recipient, ChannelNotificationSink, LoggingNotificationSink, NoOpNotificationSink,
    NotificationSink, NotifyError,
};
pub use persistence::{
    DailyPriceStats, InMemoryOrderStore, NoOpPersistence, PersistError, PersistenceSink,
};
