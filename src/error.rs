// ============================================================================
// Order Book Errors
// Precondition and lookup failures reported by the matching engine
// ============================================================================

use crate::book::LineKind;
use crate::domain::{CurrencyPair, OrderId, Side};
use crate::numeric::NumericError;
use thiserror::Error;

/// Errors returned by order book operations.
///
/// Every variant is detected before the book is mutated. An order that is
/// well formed but cannot be executed (for example an unsatisfiable market
/// order) is not an error: it comes back as a rejected `ExecutionReport`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderBookError {
    #[error("invalid price {price}: {reason}")]
    InvalidPrice { price: u64, reason: &'static str },

    #[error("invalid quantity: {0}")]
    InvalidQuantity(&'static str),

    #[error("price {price} already holds a line on the {existing} side")]
    DuplicateLine { price: u64, existing: Side },

    #[error("no {kind} line at price {price}")]
    LineNotFound { kind: LineKind, price: u64 },

    #[error("order {0} not found")]
    OrderNotFound(OrderId),

    #[error("order {0} is already in the book")]
    DuplicateOrderId(OrderId),

    #[error("order {0} belongs to another user")]
    NotOrderOwner(OrderId),

    #[error("an order book for {0} already exists")]
    BookAlreadyExists(CurrencyPair),

    #[error("currency pair mismatch: book trades {expected}, order is for {actual}")]
    CrossBookCurrencyMismatch {
        expected: CurrencyPair,
        actual: CurrencyPair,
    },

    #[error("unknown currency: {0}")]
    UnknownCurrency(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("stop-order executor already running for {0}")]
    ExecutorAlreadyRunning(CurrencyPair),

    #[error("failed to spawn stop-order executor: {0}")]
    ExecutorSpawn(String),

    #[error(transparent)]
    Numeric(#[from] NumericError),
}

/// Result type alias for order book operations
pub type OrderBookResult<T> = Result<T, OrderBookError>;
