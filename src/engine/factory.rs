// ============================================================================
// Order Book Factory
// Creates order books with proper configuration
// ============================================================================

use super::{OrderBook, OrderBookRegistry};
use crate::domain::{CurrencyPair, OrderBookConfig};
use crate::error::OrderBookError;
use crate::interfaces::{NoOpNotificationSink, NoOpPersistence, NotificationSink, PersistenceSink};
use std::sync::Arc;

// ============================================================================
// Factory Functions
// ============================================================================

/// Creates an order book from configuration
///
/// # Example
/// ```
/// use exchange_core::prelude::*;
/// use std::sync::Arc;
///
/// let book = create_from_config(
///     OrderBookConfig::btc_usd(),
///     Arc::new(NoOpPersistence),
///     Arc::new(NoOpNotificationSink),
/// )
/// .unwrap();
/// assert_eq!(book.pair(), CurrencyPair::BTC_USD);
/// ```
pub fn create_from_config(
    config: OrderBookConfig,
    persistence: Arc<dyn PersistenceSink>,
    notifications: Arc<dyn NotificationSink>,
) -> Result<OrderBook, OrderBookError> {
    let book = OrderBook::new(&config, persistence, notifications)?;
    tracing::debug!(pair = %config.pair, increment = config.increment, "order book created");
    Ok(book)
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for order books with a fluent API
///
/// # Example
/// ```
/// use exchange_core::prelude::*;
/// use std::sync::Arc;
///
/// let store = Arc::new(InMemoryOrderStore::new());
/// let book = OrderBookBuilder::new(CurrencyPair::ETH_EUR)
///     .with_increment(5)
///     .with_persistence(store)
///     .build()
///     .unwrap();
/// assert_eq!(book.increment(), 5);
/// ```
pub struct OrderBookBuilder {
    config: OrderBookConfig,
    persistence: Arc<dyn PersistenceSink>,
    notifications: Arc<dyn NotificationSink>,
}

impl OrderBookBuilder {
    pub fn new(pair: CurrencyPair) -> Self {
        Self::from_config(OrderBookConfig::new(pair))
    }

    pub fn from_config(config: OrderBookConfig) -> Self {
        Self {
            config,
            persistence: Arc::new(NoOpPersistence),
            notifications: Arc::new(NoOpNotificationSink),
        }
    }

    /// Minimum price step of every limit and stop price
    pub fn with_increment(mut self, increment: u64) -> Self {
        self.config = self.config.with_increment(increment);
        self
    }

    pub fn with_persistence(mut self, persistence: Arc<dyn PersistenceSink>) -> Self {
        self.persistence = persistence;
        self
    }

    pub fn with_notifications(mut self, notifications: Arc<dyn NotificationSink>) -> Self {
        self.notifications = notifications;
        self
    }

    pub fn build(self) -> Result<OrderBook, OrderBookError> {
        create_from_config(self.config, self.persistence, self.notifications)
    }

    /// Build the book and register it, failing if the pair already has one.
    pub fn register(self, registry: &OrderBookRegistry) -> Result<Arc<OrderBook>, OrderBookError> {
        registry.register(self.build()?)
    }
}
