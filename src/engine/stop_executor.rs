// ============================================================================
// Stop-Order Executor
// Dedicated thread that executes triggered stop orders
// ============================================================================

use super::trigger_queue::UnwindRelease;
use super::OrderBook;
use crate::error::OrderBookError;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Handle to a running stop-order executor.
///
/// Dropping the handle stops the executor after it has drained the queue.
pub struct StopExecutorHandle {
    book: Arc<OrderBook>,
    thread: Option<JoinHandle<()>>,
}

impl StopExecutorHandle {
    pub fn is_running(&self) -> bool {
        self.thread
            .as_ref()
            .is_some_and(|thread| !thread.is_finished())
    }

    /// Execute whatever is still queued, then stop and join the thread.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        self.book.triggers().request_shutdown();
        if thread.join().is_err() {
            tracing::error!(pair = %self.book.pair(), "stop-order executor panicked");
        }
    }
}

impl Drop for StopExecutorHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

pub(crate) fn spawn(book: Arc<OrderBook>) -> Result<StopExecutorHandle, OrderBookError> {
    if !book.triggers().attach_executor() {
        return Err(OrderBookError::ExecutorAlreadyRunning(book.pair()));
    }

    let worker = Arc::clone(&book);
    let spawned = thread::Builder::new()
        .name(format!("stop-executor-{}", book.pair()))
        .spawn(move || run(worker));

    match spawned {
        Ok(thread) => Ok(StopExecutorHandle {
            book,
            thread: Some(thread),
        }),
        Err(err) => {
            book.triggers().detach_executor();
            Err(OrderBookError::ExecutorSpawn(err.to_string()))
        }
    }
}

fn run(book: Arc<OrderBook>) {
    tracing::info!(pair = %book.pair(), "stop-order executor started");

    while let Some(batch) = book.triggers().next_batch() {
        tracing::debug!(pair = %book.pair(), orders = batch.len(), "executing triggered stop orders");
        let _unwind = UnwindRelease::executor(book.triggers());
        book.run_triggered_batch(batch);
        book.triggers().complete_batch();
    }

    book.triggers().detach_executor();
    tracing::info!(pair = %book.pair(), "stop-order executor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        CurrencyPair, LimitOrder, MarketOrder, OrderBookConfig, OrderKind, Side, SpecificPrice,
        StopOrder, Trade,
    };
    use crate::interfaces::{NoOpPersistence, NotificationSink, NotifyError};
    use crate::numeric::Quantity;
    use crossbeam::channel;
    use std::time::Duration;

    /// Sink that blows up on any trade made by a triggered stop.
    struct PanicOnStopTrade;

    impl NotificationSink for PanicOnStopTrade {
        fn notify(&self, trades: &[Trade]) -> Result<(), NotifyError> {
            if trades.iter().any(|t| t.order_kind == OrderKind::Stop) {
                panic!("notification sink failed");
            }
            Ok(())
        }
    }

    fn price(value: u64, side: Side) -> SpecificPrice {
        SpecificPrice::new(value, side, CurrencyPair::BTC_USD).unwrap()
    }

    #[test]
    fn test_single_executor_per_book() {
        let book = Arc::new(OrderBook::standalone(CurrencyPair::BTC_USD));
        let handle = book.start_stop_executor().unwrap();
        assert!(handle.is_running());

        assert!(matches!(
            book.start_stop_executor(),
            Err(OrderBookError::ExecutorAlreadyRunning(CurrencyPair::BTC_USD))
        ));

        handle.shutdown();
        let restarted = book.start_stop_executor().unwrap();
        drop(restarted);
    }

    #[test]
    fn test_executor_panic_does_not_block_clients() {
        let book = Arc::new(
            OrderBook::new(
                &OrderBookConfig::btc_usd(),
                Arc::new(NoOpPersistence),
                Arc::new(PanicOnStopTrade),
            )
            .unwrap(),
        );
        book.submit_limit(LimitOrder::new(price(210, Side::Ask), Quantity::new(5)).unwrap())
            .unwrap();
        book.submit_limit(LimitOrder::new(price(220, Side::Ask), Quantity::new(5)).unwrap())
            .unwrap();
        book.submit_stop(StopOrder::new(price(215, Side::Bid), Quantity::new(1)).unwrap())
            .unwrap();
        let handle = book.start_stop_executor().unwrap();

        let (done, returned) = channel::bounded(1);
        let client = {
            let book = Arc::clone(&book);
            std::thread::spawn(move || {
                let buy = MarketOrder::new(Side::Bid, CurrencyPair::BTC_USD, Quantity::new(5)).unwrap();
                let report = book.submit_market(buy).unwrap();
                let _ = done.send(report.is_executed());
            })
        };

        assert_eq!(returned.recv_timeout(Duration::from_secs(10)), Ok(true));
        client.join().unwrap();
        assert_eq!(book.pending_triggers(), 0);
        // The stop's fill was applied before the sink panicked
        assert_eq!(book.snapshot(5).asks, vec![(220, Quantity::new(4))]);

        handle.shutdown();
        assert!(book.start_stop_executor().is_ok());
    }
}
