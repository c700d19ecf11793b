// ============================================================================
// Order Book Registry
// At most one order book per currency pair
// ============================================================================

use super::OrderBook;
use crate::domain::CurrencyPair;
use crate::error::OrderBookError;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Resolves currency pairs to their order book.
#[derive(Default)]
pub struct OrderBookRegistry {
    books: RwLock<HashMap<CurrencyPair, Arc<OrderBook>>>,
}

impl OrderBookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a book, refusing a second book for the same pair.
    pub fn register(&self, book: OrderBook) -> Result<Arc<OrderBook>, OrderBookError> {
        let pair = book.pair();
        let mut books = self.books.write();
        if books.contains_key(&pair) {
            return Err(OrderBookError::BookAlreadyExists(pair));
        }
        let book = Arc::new(book);
        books.insert(pair, Arc::clone(&book));
        tracing::info!(%pair, "order book registered");
        Ok(book)
    }

    pub fn get(&self, pair: CurrencyPair) -> Option<Arc<OrderBook>> {
        self.books.read().get(&pair).cloned()
    }

    pub fn remove(&self, pair: CurrencyPair) -> Option<Arc<OrderBook>> {
        self.books.write().remove(&pair)
    }

    pub fn pairs(&self) -> Vec<CurrencyPair> {
        self.books.read().keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.books.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_book_per_pair() {
        let registry = OrderBookRegistry::new();
        registry
            .register(OrderBook::standalone(CurrencyPair::BTC_USD))
            .unwrap();
        registry
            .register(OrderBook::standalone(CurrencyPair::ETH_USD))
            .unwrap();

        assert!(matches!(
            registry.register(OrderBook::standalone(CurrencyPair::BTC_USD)),
            Err(OrderBookError::BookAlreadyExists(CurrencyPair::BTC_USD))
        ));
        assert_eq!(registry.len(), 2);
        assert!(registry.get(CurrencyPair::ETH_USD).is_some());
        assert!(registry.get(CurrencyPair::ETH_EUR).is_none());

        registry.remove(CurrencyPair::BTC_USD);
        assert!(registry
            .register(OrderBook::standalone(CurrencyPair::BTC_USD))
            .is_ok());
    }
}
