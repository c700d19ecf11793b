// ============================================================================
// Basic Usage Example
// ============================================================================

use exchange_core::prelude::*;
use std::sync::Arc;

fn price(value: u64, side: Side) -> SpecificPrice {
    SpecificPrice::new(value, side, CurrencyPair::BTC_USD).unwrap()
}

fn main() {
    #[cfg(feature = "logging")]
    exchange_core::utils::init_logging(tracing::Level::DEBUG);

    println!("=== Order Book Example ===\n");

    let store = Arc::new(InMemoryOrderStore::new());
    let book = Arc::new(
        OrderBookBuilder::new(CurrencyPair::BTC_USD)
            .with_persistence(store.clone())
            .with_notifications(Arc::new(LoggingNotificationSink))
            .build()
            .unwrap(),
    );
    let executor = book.start_stop_executor().unwrap();

    println!("Adding sell orders...");
    for i in 0..5u64 {
        let order = LimitOrder::new(price(210 + i * 10, Side::Ask), Quantity::new(2))
            .unwrap()
            .with_user(UserHandle::new(format!("seller_{i}")));
        book.submit_limit(order).unwrap();
    }

    println!("Adding buy orders...");
    for i in 0..5u64 {
        let order = LimitOrder::new(price(190 - i * 10, Side::Bid), Quantity::new(2))
            .unwrap()
            .with_user(UserHandle::new(format!("buyer_{i}")));
        book.submit_limit(order).unwrap();
    }

    println!("Adding a buy stop at 225...\n");
    let stop = StopOrder::new(price(225, Side::Bid), Quantity::new(1))
        .unwrap()
        .with_user(UserHandle::new("stopper"));
    let stop_id = book.submit_stop(stop).unwrap().order_id;

    println!("{}", book.snapshot(10));

    println!("Submitting market buy for 4...");
    let buy = MarketOrder::new(Side::Bid, CurrencyPair::BTC_USD, Quantity::new(4))
        .unwrap()
        .with_user(UserHandle::new("taker"));
    let report = book.submit_market(buy).unwrap();
    println!(
        "  order {} {:?}, filled {}, {} trade legs",
        report.order_id,
        report.status,
        report.filled_quantity,
        report.trades.len()
    );
    for trade in &report.trades {
        println!(
            "    {:?} {} {} @ {}",
            trade.role, trade.order_id, trade.quantity, trade.price
        );
    }

    println!(
        "\nStop {stop_id} after the market order: {:?}",
        store.latest(stop_id).map(|record| record.transition)
    );

    println!("\nSubmitting market buy for 100...");
    let report = book
        .submit_market(MarketOrder::new(Side::Bid, CurrencyPair::BTC_USD, Quantity::new(100)).unwrap())
        .unwrap();
    println!("  order {} {:?}", report.order_id, report.status);

    println!("\n{}", book.snapshot(10));
    println!("{} records persisted", store.len());

    executor.shutdown();
}
