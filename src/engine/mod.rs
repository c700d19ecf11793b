// ============================================================================
// Engine Module
// Thread-safe order books, stop execution and book lookup
// ============================================================================

mod order_book;
mod registry;
mod stop_executor;
mod trigger_queue;

pub mod factory;

pub use factory::{create_from_config, OrderBookBuilder};
pub use order_book::{ExecutionReport, OrderBook, OrderStatus};
pub use registry::OrderBookRegistry;
pub use stop_executor::StopExecutorHandle;
