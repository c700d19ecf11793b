// ============================================================================
// Exchange Core Library
// Single-pair order book with limit, market and stop orders
// ============================================================================

//! # Exchange Core
//!
//! An order book matching engine for one currency pair per book.
//!
//! ## Features
//!
//! - **Limit orders** rest in FIFO price lines
//! - **Market orders** execute in full against the best lines or are rejected
//!   without touching the book
//! - **Stop orders** stay hidden until the market reaches them, then execute
//!   as market orders on a dedicated executor thread
//! - **Fairness**: a client call that triggers stops returns only after those
//!   stops have executed
//! - **Side effects after unlock**: persistence and trade notification never
//!   run under the book lock
//!
//! ## Example
//!
//! ```rust
//! use exchange_core::prelude::*;
//!
//! let book = OrderBook::standalone(CurrencyPair::BTC_USD);
//!
//! let ask = SpecificPrice::new(210, Side::Ask, CurrencyPair::BTC_USD).unwrap();
//! book.submit_limit(LimitOrder::new(ask, Quantity::new(5)).unwrap()).unwrap();
//!
//! let buy = MarketOrder::new(Side::Bid, CurrencyPair::BTC_USD, Quantity::new(3)).unwrap();
//! let report = book.submit_market(buy).unwrap();
//!
//! assert!(report.is_executed());
//! assert_eq!(report.filled_quantity, Quantity::new(3));
//!
//! let snapshot = book.snapshot(10);
//! println!("{snapshot}");
//! assert_eq!(snapshot.asks, vec![(210, Quantity::new(2))]);
//! ```

pub mod book;
pub mod domain;
pub mod engine;
pub mod error;
pub mod interfaces;
pub mod numeric;
pub mod utils;

// Re-exports for convenience
pub mod prelude {
    pub use crate::book::{LineKind, OrderBookSnapshot, RejectReason};
    pub use crate::domain::{
        Currency, CurrencyPair, LimitOrder, MarketOrder, Order, OrderBookConfig, OrderId,
        OrderKind, OrderRecord, RecordKind, Side, SpecificPrice, StopOrder, Trade, TradeRole,
        UserHandle,
    };
    pub use crate::engine::{
        create_from_config, ExecutionReport, OrderBook, OrderBookBuilder, OrderBookRegistry,
        OrderStatus, StopExecutorHandle,
    };
    pub use crate::error::{OrderBookError, OrderBookResult};
    pub use crate::interfaces::{
        ChannelNotificationSink, InMemoryOrderStore, LoggingNotificationSink,
        NoOpNotificationSink, NoOpPersistence, NotificationSink, PersistenceSink,
    };
    pub use crate::numeric::Quantity;
}

#[cfg(test)]
mod integration_tests {
    use super::prelude::*;
    use crossbeam::channel::Receiver;
    use std::sync::{Arc, Barrier};
    use std::thread;

    const PAIR: CurrencyPair = CurrencyPair::BTC_USD;

    fn price(value: u64, side: Side) -> SpecificPrice {
        SpecificPrice::new(value, side, PAIR).unwrap()
    }

    fn limit(value: u64, side: Side, quantity: u64) -> LimitOrder {
        LimitOrder::new(price(value, side), Quantity::new(quantity)).unwrap()
    }

    fn stop(value: u64, side: Side, quantity: u64) -> StopOrder {
        StopOrder::new(price(value, side), Quantity::new(quantity)).unwrap()
    }

    fn market(side: Side, quantity: u64) -> MarketOrder {
        MarketOrder::new(side, PAIR, Quantity::new(quantity)).unwrap()
    }

    fn observed_book() -> (OrderBook, Receiver<Vec<Trade>>) {
        let (sink, receiver) = ChannelNotificationSink::unbounded();
        let book = OrderBookBuilder::new(PAIR)
            .with_notifications(Arc::new(sink))
            .build()
            .unwrap();
        (book, receiver)
    }

    /// Asks at 210 and bids at 90, five units each.
    fn two_sided_book() -> OrderBook {
        let book = OrderBook::standalone(PAIR);
        book.submit_limit(limit(210, Side::Ask, 5)).unwrap();
        book.submit_limit(limit(90, Side::Bid, 5)).unwrap();
        book
    }

    #[test]
    fn test_limit_orders_set_best_prices() {
        let book = two_sided_book();

        assert_eq!(book.best_ask().map(|p| p.value()), Some(210));
        assert_eq!(book.best_bid().map(|p| p.value()), Some(90));
        assert!(book.validate().is_ok());
    }

    #[test]
    fn test_market_buy_takes_part_of_best_line() {
        let book = two_sided_book();

        let report = book.submit_market(market(Side::Bid, 3)).unwrap();

        assert_eq!(report.status, OrderStatus::Filled);
        assert_eq!(report.filled_quantity, Quantity::new(3));
        assert_eq!(report.trades.len(), 2);
        assert!(report.trades.iter().all(|t| t.quantity == Quantity::new(3) && t.price == 210));
        assert_eq!(book.snapshot(5).asks, vec![(210, Quantity::new(2))]);
        assert_eq!(book.best_ask().map(|p| p.value()), Some(210));
    }

    #[test]
    fn test_oversized_market_order_is_rejected_untouched() {
        let book = two_sided_book();
        let before = book.snapshot(5);

        let report = book.submit_market(market(Side::Bid, 10)).unwrap();

        assert_eq!(report.order_id, OrderId::REJECTED);
        assert_eq!(
            report.status,
            OrderStatus::Rejected(RejectReason::Unsatisfiable {
                requested: Quantity::new(10),
                available: Quantity::new(5),
            })
        );
        assert!(report.trades.is_empty());
        assert_eq!(book.snapshot(5), before);
    }

    #[test]
    fn test_stop_fires_when_its_line_is_reached() {
        let (book, trades) = observed_book();
        book.submit_limit(limit(210, Side::Ask, 5)).unwrap();
        book.submit_limit(limit(220, Side::Ask, 3)).unwrap();
        let stop_id = book
            .submit_stop(stop(215, Side::Bid, 1).with_user(UserHandle::new("stopper")))
            .unwrap()
            .order_id;

        // Hidden from the limit view until triggered
        let snapshot = book.snapshot(5);
        assert_eq!(snapshot.asks.len(), 2);
        assert_eq!(snapshot.stop_bids, vec![(215, Quantity::new(1))]);
        assert!(matches!(book.order(stop_id), Some(Order::Stop(_))));

        let report = book.submit_market(market(Side::Bid, 5)).unwrap();
        assert!(report.is_executed());

        // The triggered stop ran before the call returned
        let snapshot = book.snapshot(5);
        assert_eq!(snapshot.asks, vec![(220, Quantity::new(2))]);
        assert!(snapshot.stop_bids.is_empty());
        assert!(book.order(stop_id).is_none());
        assert_eq!(book.pending_triggers(), 0);

        let delivered: Vec<Trade> = trades.try_iter().flatten().collect();
        let stop_leg = delivered
            .iter()
            .find(|t| t.order_id == stop_id)
            .expect("stop trade delivered");
        assert_eq!(stop_leg.order_kind, OrderKind::Stop);
        assert_eq!(stop_leg.role, TradeRole::Taker);
        assert_eq!(stop_leg.price, 220);
        assert_eq!(stop_leg.user, Some(UserHandle::new("stopper")));
    }

    #[test]
    fn test_cancel_last_order_of_best_line() {
        let book = OrderBook::standalone(PAIR);
        let best = book.submit_limit(limit(210, Side::Ask, 5)).unwrap().order_id;
        book.submit_limit(limit(220, Side::Ask, 1)).unwrap();

        let cancelled = book.cancel(best, None).unwrap();

        assert_eq!(cancelled.id(), best);
        assert_eq!(book.snapshot(5).asks, vec![(220, Quantity::new(1))]);
        assert_eq!(book.best_ask().map(|p| p.value()), Some(220));
        assert!(matches!(
            book.cancel(best, None),
            Err(OrderBookError::OrderNotFound(id)) if id == best
        ));
    }

    #[test]
    fn test_orders_in_a_line_fill_first_in_first_out() {
        let book = OrderBook::standalone(PAIR);
        let first = book
            .submit_limit(limit(210, Side::Ask, 2).with_user(UserHandle::new("alice")))
            .unwrap()
            .order_id;
        let second = book
            .submit_limit(limit(210, Side::Ask, 2).with_user(UserHandle::new("bob")))
            .unwrap()
            .order_id;

        let report = book.submit_market(market(Side::Bid, 3)).unwrap();

        let makers: Vec<(OrderId, Quantity)> = report
            .trades
            .iter()
            .filter(|t| t.role == TradeRole::Maker)
            .map(|t| (t.order_id, t.quantity))
            .collect();
        assert_eq!(makers, vec![(first, Quantity::new(2)), (second, Quantity::new(1))]);
        assert!(book.order(first).is_none());
        assert_eq!(
            book.order(second).map(|o| o.remaining_quantity()),
            Some(Quantity::new(1))
        );
    }

    #[test]
    fn test_later_client_sees_stop_executed_by_executor() {
        let book = Arc::new(OrderBook::standalone(PAIR));
        book.seed_limit(limit(210, Side::Ask, 5)).unwrap();
        book.seed_limit(limit(220, Side::Ask, 3)).unwrap();
        book.submit_stop(stop(215, Side::Bid, 1)).unwrap();
        let executor = book.start_stop_executor().unwrap();

        let x = {
            let book = Arc::clone(&book);
            thread::spawn(move || {
                let report = book.submit_market(market(Side::Bid, 5)).unwrap();
                // Nothing may observe the book between X and its stop
                let asks = book.snapshot(5).asks;
                (report, asks)
            })
        };
        let (x_report, asks_after_x) = x.join().unwrap();
        assert!(x_report.is_executed());
        assert_eq!(asks_after_x, vec![(220, Quantity::new(2))]);

        // Y arrives after X returned and must match against what the stop left
        let y = {
            let book = Arc::clone(&book);
            thread::spawn(move || book.submit_market(market(Side::Bid, 3)).unwrap())
        };
        let y_report = y.join().unwrap();
        assert_eq!(
            y_report.status,
            OrderStatus::Rejected(RejectReason::Unsatisfiable {
                requested: Quantity::new(3),
                available: Quantity::new(2),
            })
        );

        executor.shutdown();
        assert!(book.validate().is_ok());
    }

    #[test]
    fn test_concurrent_clients_keep_book_consistent() {
        const CLIENTS: u64 = 4;
        const BUYS_PER_CLIENT: u64 = 5;

        let store = Arc::new(InMemoryOrderStore::new());
        let book = Arc::new(
            OrderBookBuilder::new(PAIR)
                .with_persistence(store.clone())
                .build()
                .unwrap(),
        );
        for value in 300..310 {
            book.seed_limit(limit(value, Side::Ask, 5)).unwrap();
        }
        book.submit_stop(stop(303, Side::Bid, 1)).unwrap();
        book.submit_stop(stop(303, Side::Bid, 1)).unwrap();
        let executor = book.start_stop_executor().unwrap();

        let start = Arc::new(Barrier::new(CLIENTS as usize));
        let clients: Vec<_> = (0..CLIENTS)
            .map(|client| {
                let book = Arc::clone(&book);
                let start = Arc::clone(&start);
                thread::spawn(move || {
                    start.wait();
                    book.submit_limit(limit(100 + client, Side::Bid, 1)).unwrap();
                    for _ in 0..BUYS_PER_CLIENT {
                        let report = book.submit_market(market(Side::Bid, 1)).unwrap();
                        assert!(report.is_executed());
                    }
                })
            })
            .collect();
        for client in clients {
            client.join().unwrap();
        }
        executor.shutdown();

        let snapshot = book.snapshot(20);
        // 50 units offered, 20 bought by clients and 2 by the stops
        assert_eq!(snapshot.total_ask_quantity(), Quantity::new(28));
        assert_eq!(snapshot.bids.len(), CLIENTS as usize);
        assert!(snapshot.stop_bids.is_empty());
        assert_eq!(book.pending_triggers(), 0);
        assert!(book.validate().is_ok());

        let stop_fills = store
            .records()
            .iter()
            .filter(|r| r.kind == OrderKind::Stop && r.transition == RecordKind::Filled)
            .count();
        assert_eq!(stop_fills, 2);
    }
}
