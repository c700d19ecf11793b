// ============================================================================
// Order Book
// Thread-safe order book with stop-order hand-off and fairness rendezvous
// ============================================================================

use super::stop_executor::{self, StopExecutorHandle};
use super::trigger_queue::TriggerQueue;
use crate::book::{Admission, BookState, MarketExecution, MatchJournal, OrderBookSnapshot, RejectReason};
use crate::domain::{
    CurrencyPair, LimitOrder, MarketOrder, Order, OrderBookConfig, OrderId, OrderIdGenerator,
    OrderKind, OrderRecord, RecordKind, SpecificPrice, StopOrder, StopOrigin, Trade, UserHandle,
};
use crate::error::OrderBookError;
use crate::interfaces::{
    NoOpNotificationSink, NoOpPersistence, NotificationSink, PersistError, PersistenceSink,
};
use crate::numeric::Quantity;
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;

/// Who is submitting an order.
///
/// Client submissions wait for the stop orders they triggered before
/// returning. The stop executor must not wait on itself, and seeding leaves
/// triggered stops queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Submitter {
    Client,
    StopExecutor,
    Seed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    /// Limit or stop order waiting in its line
    Resting,
    /// Market order executed in full
    Filled,
    /// Market order refused; the book is unchanged
    Rejected(RejectReason),
}

/// Result of a submission.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    /// Assigned id, or `OrderId::REJECTED`
    pub order_id: OrderId,
    pub kind: OrderKind,
    pub status: OrderStatus,
    pub filled_quantity: Quantity,
    /// Trade legs produced by this submission
    pub trades: Vec<Trade>,
    /// First persistence failure; the match itself stands
    pub persistence_error: Option<PersistError>,
}

impl ExecutionReport {
    pub fn is_executed(&self) -> bool {
        !matches!(self.status, OrderStatus::Rejected(_))
    }

    pub fn is_rejected(&self) -> bool {
        !self.is_executed()
    }
}

/// Order book for one currency pair, shared between client threads and the
/// stop-order executor.
///
/// All book mutations happen under one lock. Persistence and notification run
/// after the lock is released, on data copied out of the book. Stops
/// triggered by a client's order are executed before that client's call
/// returns, so no later order can overtake them.
pub struct OrderBook {
    pair: CurrencyPair,
    state: Mutex<BookState>,
    triggers: TriggerQueue,
    ids: OrderIdGenerator,
    persistence: Arc<dyn PersistenceSink>,
    notifications: Arc<dyn NotificationSink>,
}

impl OrderBook {
    /// Create an order book from a validated configuration
    pub fn new(
        config: &OrderBookConfig,
        persistence: Arc<dyn PersistenceSink>,
        notifications: Arc<dyn NotificationSink>,
    ) -> Result<Self, OrderBookError> {
        config.validate()?;
        Ok(Self {
            pair: config.pair,
            state: Mutex::new(BookState::new(config.pair, config.increment)),
            triggers: TriggerQueue::new(),
            ids: OrderIdGenerator::new(),
            persistence,
            notifications,
        })
    }

    /// Book with an increment of one and no persistence or notification
    pub fn standalone(pair: CurrencyPair) -> Self {
        Self {
            pair,
            state: Mutex::new(BookState::new(pair, 1)),
            triggers: TriggerQueue::new(),
            ids: OrderIdGenerator::new(),
            persistence: Arc::new(NoOpPersistence),
            notifications: Arc::new(NoOpNotificationSink),
        }
    }

    pub fn pair(&self) -> CurrencyPair {
        self.pair
    }

    pub fn increment(&self) -> u64 {
        self.state.lock().increment()
    }

    // ========================================================================
    // Submission
    // ========================================================================

    /// Rest a limit order.
    pub fn submit_limit(&self, order: LimitOrder) -> Result<ExecutionReport, OrderBookError> {
        self.admit(OrderKind::Limit, Submitter::Client, |state, ids, journal| {
            state.admit_limit(order, Admission::Checked, ids, journal)
        })
    }

    /// Rest a stop order.
    pub fn submit_stop(&self, order: StopOrder) -> Result<ExecutionReport, OrderBookError> {
        self.admit(OrderKind::Stop, Submitter::Client, |state, ids, journal| {
            state.admit_stop(order, Admission::Checked, ids, journal)
        })
    }

    /// Load a stored limit order, skipping the price coherence check.
    ///
    /// Stops triggered while seeding stay queued until the executor runs or the
    /// next client call drains them.
    pub fn seed_limit(&self, order: LimitOrder) -> Result<ExecutionReport, OrderBookError> {
        self.admit(OrderKind::Limit, Submitter::Seed, |state, ids, journal| {
            state.admit_limit(order, Admission::Seeded, ids, journal)
        })
    }

    /// Load a stored stop order, skipping the price coherence check.
    pub fn seed_stop(&self, order: StopOrder) -> Result<ExecutionReport, OrderBookError> {
        self.admit(OrderKind::Stop, Submitter::Seed, |state, ids, journal| {
            state.admit_stop(order, Admission::Seeded, ids, journal)
        })
    }

    /// Execute a client market order.
    pub fn submit_market(&self, order: MarketOrder) -> Result<ExecutionReport, OrderBookError> {
        self.execute_market(order, Submitter::Client)
    }

    /// Execute a market order on behalf of `submitter`.
    pub(crate) fn execute_market(
        &self,
        mut order: MarketOrder,
        submitter: Submitter,
    ) -> Result<ExecutionReport, OrderBookError> {
        let mut journal = MatchJournal::new();
        let execution = {
            let mut state = self.state.lock();
            let execution = state.execute_market(&mut order, &self.ids, &mut journal)?;
            self.triggers.enqueue(journal.take_triggered());
            execution
        };

        let status = match execution {
            MarketExecution::Filled { .. } => OrderStatus::Filled,
            MarketExecution::Rejected(reason) => OrderStatus::Rejected(reason),
        };
        let (trades, persistence_error) = self.publish(journal);
        let report = ExecutionReport {
            order_id: order.id(),
            kind: OrderKind::Market,
            status,
            filled_quantity: order.filled_quantity(),
            trades,
            persistence_error,
        };

        self.rendezvous(submitter);
        Ok(report)
    }

    /// Cancel a resting limit or stop order owned by `requester`.
    pub fn cancel(
        &self,
        order_id: OrderId,
        requester: Option<&UserHandle>,
    ) -> Result<Order, OrderBookError> {
        let mut journal = MatchJournal::new();
        let cancelled = {
            let mut state = self.state.lock();
            let cancelled = state.cancel(order_id, requester, &mut journal)?;
            self.triggers.enqueue(journal.take_triggered());
            cancelled
        };
        self.publish(journal);
        self.rendezvous(Submitter::Client);
        Ok(cancelled)
    }

    fn admit<F>(
        &self,
        kind: OrderKind,
        submitter: Submitter,
        insert: F,
    ) -> Result<ExecutionReport, OrderBookError>
    where
        F: FnOnce(&mut BookState, &OrderIdGenerator, &mut MatchJournal) -> Result<OrderId, OrderBookError>,
    {
        let mut journal = MatchJournal::new();
        let order_id = {
            let mut state = self.state.lock();
            let order_id = insert(&mut *state, &self.ids, &mut journal)?;
            self.triggers.enqueue(journal.take_triggered());
            order_id
        };

        let (trades, persistence_error) = self.publish(journal);
        self.rendezvous(submitter);
        Ok(ExecutionReport {
            order_id,
            kind,
            status: OrderStatus::Resting,
            filled_quantity: Quantity::ZERO,
            trades,
            persistence_error,
        })
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn best_ask(&self) -> Option<SpecificPrice> {
        self.state.lock().best_ask()
    }

    pub fn best_bid(&self) -> Option<SpecificPrice> {
        self.state.lock().best_bid()
    }

    /// Copy of a resting order.
    pub fn order(&self, order_id: OrderId) -> Option<Order> {
        self.state.lock().order(order_id)
    }

    pub fn snapshot(&self, depth: usize) -> OrderBookSnapshot {
        self.state.lock().snapshot(depth)
    }

    /// Triggered stops not yet picked up for execution.
    pub fn pending_triggers(&self) -> usize {
        self.triggers.pending()
    }

    /// Check the book's structural invariants.
    pub fn validate(&self) -> Result<(), String> {
        self.state.lock().validate()
    }

    // ========================================================================
    // Stop Execution
    // ========================================================================

    /// Trigger stops already reached by the market, then start the executor
    /// thread that runs every triggered stop from now on.
    pub fn start_stop_executor(self: &Arc<Self>) -> Result<StopExecutorHandle, OrderBookError> {
        let mut journal = MatchJournal::new();
        {
            let mut state = self.state.lock();
            state.trigger_stops(&mut journal);
            self.triggers.enqueue(journal.take_triggered());
        }
        self.publish(journal);
        stop_executor::spawn(Arc::clone(self))
    }

    pub(crate) fn triggers(&self) -> &TriggerQueue {
        &self.triggers
    }

    /// Execute market orders created by triggered stops and reconcile the
    /// stops they came from.
    pub(crate) fn run_triggered_batch(&self, batch: Vec<MarketOrder>) {
        for order in batch {
            let origin = order.origin().cloned();
            match self.execute_market(order, Submitter::StopExecutor) {
                Ok(report) => {
                    if let Some(origin) = origin {
                        self.reconcile_stop(&origin, &report);
                    }
                }
                Err(err) => {
                    tracing::error!(error = %err, "failed to execute triggered stop order");
                }
            }
        }
    }

    fn reconcile_stop(&self, origin: &StopOrigin, report: &ExecutionReport) {
        let now = Utc::now();
        if report.is_executed() {
            self.persist_logged(&origin.record(RecordKind::Filled, Quantity::ZERO, now));
            return;
        }

        tracing::warn!(
            stop_id = %origin.stop_id,
            price = %origin.trigger_price,
            status = ?report.status,
            "triggered stop order could not be executed"
        );
        self.persist_logged(&origin.record(RecordKind::Rejected, origin.quantity, now));
        if let Err(err) = self
            .notifications
            .notify(&[Trade::stop_not_executed(origin, now)])
        {
            tracing::warn!(error = %err, stop_id = %origin.stop_id, "failed to notify stop owner");
        }
    }

    fn rendezvous(&self, submitter: Submitter) {
        if submitter == Submitter::Client {
            self.triggers
                .wait_until_drained(|batch| self.run_triggered_batch(batch));
        }
    }

    // ========================================================================
    // Side Effects
    // ========================================================================

    /// Persist records and notify trades collected under the lock.
    fn publish(&self, journal: MatchJournal) -> (Vec<Trade>, Option<PersistError>) {
        let (trades, records) = journal.into_parts();

        let mut first_error = None;
        for record in &records {
            if let Err(err) = self.persistence.persist(record) {
                tracing::warn!(order_id = %record.order_id, transition = %record.transition, error = %err, "failed to persist order record");
                first_error.get_or_insert(err);
            }
        }

        if !trades.is_empty() {
            if let Err(err) = self.notifications.notify(&trades) {
                tracing::warn!(error = %err, trades = trades.len(), "failed to deliver trade notification");
            }
        }
        (trades, first_error)
    }

    fn persist_logged(&self, record: &OrderRecord) {
        if let Err(err) = self.persistence.persist(record) {
            tracing::warn!(order_id = %record.order_id, error = %err, "failed to persist order record");
        }
    }
}

impl std::fmt::Debug for OrderBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderBook")
            .field("pair", &self.pair)
            .field("pending_triggers", &self.pending_triggers())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Side;
    use crate::interfaces::{ChannelNotificationSink, InMemoryOrderStore};

    const PAIR: CurrencyPair = CurrencyPair::BTC_USD;

    fn price(value: u64, side: Side) -> SpecificPrice {
        SpecificPrice::new(value, side, PAIR).unwrap()
    }

    fn limit(value: u64, side: Side, quantity: u64) -> LimitOrder {
        LimitOrder::new(price(value, side), Quantity::new(quantity)).unwrap()
    }

    fn market(side: Side, quantity: u64) -> MarketOrder {
        MarketOrder::new(side, PAIR, Quantity::new(quantity)).unwrap()
    }

    struct FailingStore;

    impl PersistenceSink for FailingStore {
        fn persist(&self, record: &OrderRecord) -> Result<(), PersistError> {
            Err(PersistError::Refused {
                order_id: record.order_id,
                reason: "disk full".to_string(),
            })
        }
    }

    #[test]
    fn test_limit_and_market_flow() {
        let book = OrderBook::standalone(PAIR);
        book.submit_limit(limit(210, Side::Ask, 5)).unwrap();
        book.submit_limit(limit(90, Side::Bid, 5)).unwrap();

        let report = book.submit_market(market(Side::Bid, 3)).unwrap();

        assert!(report.is_executed());
        assert_eq!(report.status, OrderStatus::Filled);
        assert_eq!(report.filled_quantity, Quantity::new(3));
        assert_eq!(report.trades.len(), 2);
        assert_eq!(book.snapshot(1).asks, vec![(210, Quantity::new(2))]);
    }

    #[test]
    fn test_rejected_market_order_report() {
        let book = OrderBook::standalone(PAIR);
        book.submit_limit(limit(210, Side::Ask, 5)).unwrap();

        let report = book.submit_market(market(Side::Bid, 10)).unwrap();

        assert!(report.is_rejected());
        assert_eq!(report.order_id, OrderId::REJECTED);
        assert!(report.trades.is_empty());
        assert_eq!(report.filled_quantity, Quantity::ZERO);
    }

    #[test]
    fn test_persistence_failure_is_surfaced_not_rolled_back() {
        let book = OrderBook::new(
            &OrderBookConfig::btc_usd(),
            Arc::new(FailingStore),
            Arc::new(NoOpNotificationSink),
        )
        .unwrap();
        let rested = book.submit_limit(limit(210, Side::Ask, 5)).unwrap();
        assert!(rested.persistence_error.is_some());

        let report = book.submit_market(market(Side::Bid, 5)).unwrap();

        assert!(report.is_executed());
        assert!(matches!(report.persistence_error, Some(PersistError::Refused { .. })));
        assert!(book.best_ask().is_none());
    }

    #[test]
    fn test_triggered_stop_runs_inline_without_executor() {
        let store = Arc::new(InMemoryOrderStore::new());
        let (sink, trades) = ChannelNotificationSink::unbounded();
        let book = OrderBook::new(&OrderBookConfig::btc_usd(), store.clone(), Arc::new(sink)).unwrap();
        book.submit_limit(limit(210, Side::Ask, 5)).unwrap();
        book.submit_limit(limit(220, Side::Ask, 5)).unwrap();
        let stop = book
            .submit_stop(
                StopOrder::new(price(215, Side::Bid), Quantity::new(3))
                    .unwrap()
                    .with_user(UserHandle::new("carol")),
            )
            .unwrap();

        book.submit_market(market(Side::Bid, 5)).unwrap();

        assert_eq!(book.pending_triggers(), 0);
        assert_eq!(book.snapshot(5).asks, vec![(220, Quantity::new(2))]);
        assert_eq!(
            store.latest(stop.order_id).map(|r| r.transition),
            Some(RecordKind::Filled)
        );

        let _client_fill = trades.try_recv().unwrap();
        let stop_fill = trades.try_recv().unwrap();
        let taker = stop_fill.iter().find(|t| t.user.is_some()).unwrap();
        assert_eq!(taker.order_id, stop.order_id);
        assert_eq!(taker.order_kind, OrderKind::Stop);
        assert_eq!(taker.price, 220);
    }

    #[test]
    fn test_unexecutable_stop_is_rejected_and_owner_notified() {
        let store = Arc::new(InMemoryOrderStore::new());
        let (sink, trades) = ChannelNotificationSink::unbounded();
        let book = OrderBook::new(&OrderBookConfig::btc_usd(), store.clone(), Arc::new(sink)).unwrap();
        book.submit_limit(limit(210, Side::Ask, 5)).unwrap();
        book.submit_limit(limit(90, Side::Bid, 1)).unwrap();
        let stop = book
            .submit_stop(
                StopOrder::new(price(85, Side::Ask), Quantity::new(4))
                    .unwrap()
                    .with_user(UserHandle::new("dave")),
            )
            .unwrap();

        // Once the bid at 90 is gone the best bid of 80 reaches the stop, whose
        // market order then finds too little liquidity.
        book.submit_limit(limit(80, Side::Bid, 1)).unwrap();
        book.submit_market(market(Side::Ask, 1)).unwrap();

        assert_eq!(
            store.latest(stop.order_id).map(|r| r.transition),
            Some(RecordKind::Rejected)
        );
        let notices: Vec<Trade> = trades.try_iter().flatten().filter(|t| t.is_rejection()).collect();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].user, Some(UserHandle::new("dave")));
        // The bid at 80 is untouched by the rejected stop
        assert_eq!(book.snapshot(5).bids, vec![(80, Quantity::new(1))]);
    }

    #[test]
    fn test_cancel_moves_best_price_and_checks_owner() {
        let book = OrderBook::standalone(PAIR);
        book.submit_limit(limit(210, Side::Ask, 5)).unwrap();
        let owner = UserHandle::new("erin");
        let inner = book
            .submit_limit(limit(200, Side::Ask, 1).with_user(owner.clone()))
            .unwrap();

        assert_eq!(
            book.cancel(inner.order_id, None).unwrap_err(),
            OrderBookError::NotOrderOwner(inner.order_id)
        );
        let cancelled = book.cancel(inner.order_id, Some(&owner)).unwrap();

        assert_eq!(cancelled.id(), inner.order_id);
        assert_eq!(book.best_ask().map(|p| p.value()), Some(210));
        assert!(book.order(inner.order_id).is_none());
    }

    #[test]
    fn test_cancel_of_best_bid_triggers_sell_stop() {
        let store = Arc::new(InMemoryOrderStore::new());
        let book = OrderBook::new(
            &OrderBookConfig::btc_usd(),
            store.clone(),
            Arc::new(NoOpNotificationSink),
        )
        .unwrap();
        let best = book.submit_limit(limit(90, Side::Bid, 1)).unwrap();
        book.submit_limit(limit(80, Side::Bid, 5)).unwrap();
        let stop = book
            .submit_stop(StopOrder::new(price(85, Side::Ask), Quantity::new(2)).unwrap())
            .unwrap();

        book.cancel(best.order_id, None).unwrap();

        assert_eq!(book.pending_triggers(), 0);
        assert!(book.order(stop.order_id).is_none());
        assert_eq!(book.snapshot(5).bids, vec![(80, Quantity::new(3))]);
        assert!(book.snapshot(5).stop_asks.is_empty());
        assert_eq!(
            store.latest(stop.order_id).map(|r| r.transition),
            Some(RecordKind::Filled)
        );
    }

    #[test]
    fn test_stops_triggered_by_seeding_wait_for_next_client_call() {
        let book = OrderBook::standalone(PAIR);
        book.seed_limit(limit(210, Side::Ask, 5)).unwrap();
        book.seed_stop(StopOrder::new(price(200, Side::Bid), Quantity::new(1)).unwrap())
            .unwrap();

        // A better ask runs the trigger scan but seeding does not execute stops
        book.seed_limit(limit(205, Side::Ask, 5)).unwrap();
        assert_eq!(book.pending_triggers(), 1);
        assert_eq!(book.snapshot(5).asks[0], (205, Quantity::new(5)));

        book.submit_limit(limit(90, Side::Bid, 1)).unwrap();

        assert_eq!(book.pending_triggers(), 0);
        assert_eq!(book.snapshot(5).asks[0], (205, Quantity::new(4)));
    }

    #[test]
    fn test_seeded_stop_fires_when_executor_starts() {
        let book = Arc::new(OrderBook::standalone(PAIR));
        book.submit_limit(limit(210, Side::Ask, 5)).unwrap();
        let seeded = book
            .seed_stop(
                StopOrder::new(price(200, Side::Bid), Quantity::new(2))
                    .unwrap()
                    .with_id(OrderId::new(77)),
            )
            .unwrap();
        assert_eq!(seeded.order_id, OrderId::new(77));
        assert!(book.order(OrderId::new(77)).is_some());

        let executor = book.start_stop_executor().unwrap();
        book.triggers().wait_until_drained(|_| {});
        executor.shutdown();

        assert!(book.order(OrderId::new(77)).is_none());
        assert_eq!(book.snapshot(1).asks, vec![(210, Quantity::new(3))]);
    }
}
