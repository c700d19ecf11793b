// ============================================================================
// Domain Models Module
// Contains all core domain entities and value objects
// ============================================================================

pub mod config;
pub mod order;
pub mod price;
pub mod record;
pub mod trade;

pub use config::OrderBookConfig;
pub use order::{
    LimitOrder, MarketOrder, Order, OrderId, OrderIdGenerator, OrderKind, StopOrder, StopOrigin,
    UserHandle,
};
pub use price::{Currency, CurrencyPair, Side, SpecificPrice};
pub use record::{OrderRecord, RecordKind};
pub use trade::{Trade, TradeRole};
