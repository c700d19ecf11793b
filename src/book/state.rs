// ============================================================================
// Book State
// Limit and stop books, best prices, matching and stop triggering
// ============================================================================

use super::{LineKind, MatchJournal, MatchOutcome, OrderBookLine, OrderBookSnapshot, RestingOrder};
use crate::domain::{
    CurrencyPair, LimitOrder, MarketOrder, Order, OrderId, OrderIdGenerator, RecordKind, Side,
    SpecificPrice, StopOrder, UserHandle,
};
use crate::error::OrderBookError;
use crate::numeric::Quantity;
use chrono::Utc;
use smallvec::SmallVec;
use std::collections::BTreeMap;

/// How strictly an incoming limit or stop order is checked against the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Regular client order: price coherence is enforced, a fresh id is assigned
    Checked,
    /// Book seeding or replay: coherence is skipped and assigned ids are kept
    Seeded,
}

/// Why a market order was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// No limit line on either side
    EmptyBook,
    /// Nothing rests on the side the order would trade against
    NoOppositeLiquidity,
    /// Opposite liquidity is smaller than the order
    Unsatisfiable {
        requested: Quantity,
        available: Quantity,
    },
}

/// Outcome of a market order against the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketExecution {
    /// Fully filled across `levels` price lines
    Filled { levels: usize },
    Rejected(RejectReason),
}

/// Single-threaded order book for one currency pair.
///
/// Both books are keyed by price value. A limit line sits on one side only;
/// asks always price strictly above bids. Stop lines never move the best
/// prices. Callers serialize access; [`crate::engine::OrderBook`] wraps this
/// type in a mutex.
#[derive(Debug)]
pub struct BookState {
    pair: CurrencyPair,
    increment: u64,
    limit_lines: BTreeMap<u64, OrderBookLine<LimitOrder>>,
    stop_lines: BTreeMap<u64, OrderBookLine<StopOrder>>,
    best_ask: Option<SpecificPrice>,
    best_bid: Option<SpecificPrice>,
}

impl BookState {
    pub fn new(pair: CurrencyPair, increment: u64) -> Self {
        Self {
            pair,
            increment: increment.max(1),
            limit_lines: BTreeMap::new(),
            stop_lines: BTreeMap::new(),
            best_ask: None,
            best_bid: None,
        }
    }

    pub fn pair(&self) -> CurrencyPair {
        self.pair
    }

    pub fn increment(&self) -> u64 {
        self.increment
    }

    pub fn best_ask(&self) -> Option<SpecificPrice> {
        self.best_ask
    }

    pub fn best_bid(&self) -> Option<SpecificPrice> {
        self.best_bid
    }

    pub fn limit_line(&self, price: u64) -> Option<&OrderBookLine<LimitOrder>> {
        self.limit_lines.get(&price)
    }

    pub fn stop_line(&self, price: u64) -> Option<&OrderBookLine<StopOrder>> {
        self.stop_lines.get(&price)
    }

    pub fn limit_line_count(&self) -> usize {
        self.limit_lines.len()
    }

    pub fn stop_line_count(&self) -> usize {
        self.stop_lines.len()
    }

    // ========================================================================
    // Admission
    // ========================================================================

    /// Rest a limit order, creating its line if needed.
    pub fn admit_limit(
        &mut self,
        mut order: LimitOrder,
        admission: Admission,
        ids: &OrderIdGenerator,
        journal: &mut MatchJournal,
    ) -> Result<OrderId, OrderBookError> {
        let price = order.price();
        self.check_price(price)?;
        if admission == Admission::Checked {
            self.check_limit_coherence(price)?;
        }
        // Even a seeded order must leave the book uncrossed.
        self.check_uncrossed(price)?;
        self.check_line_side(&self.limit_lines, price)?;
        let id = self.resolve_id(order.id(), admission, ids)?;
        order.assign_id(id);

        let now = Utc::now();
        journal.record(order.record(RecordKind::Created, None, now));
        match self.limit_lines.get_mut(&price.value()) {
            Some(line) => line.add(order)?,
            None => {
                self.limit_lines
                    .insert(price.value(), OrderBookLine::new(order));
                self.on_line_added(price, journal);
            }
        }

        tracing::debug!(order_id = %id, price = %price, "limit order rested");
        Ok(id)
    }

    /// Rest a stop order. Never changes the best prices and never triggers
    /// immediately.
    pub fn admit_stop(
        &mut self,
        mut order: StopOrder,
        admission: Admission,
        ids: &OrderIdGenerator,
        journal: &mut MatchJournal,
    ) -> Result<OrderId, OrderBookError> {
        let price = order.price();
        self.check_price(price)?;
        if admission == Admission::Checked {
            self.check_stop_coherence(price)?;
        }
        self.check_line_side(&self.stop_lines, price)?;
        let id = self.resolve_id(order.id(), admission, ids)?;
        order.assign_id(id);

        journal.record(order.record(RecordKind::Created, Utc::now()));
        match self.stop_lines.get_mut(&price.value()) {
            Some(line) => line.add(order)?,
            None => {
                self.stop_lines
                    .insert(price.value(), OrderBookLine::new(order));
            }
        }

        tracing::debug!(order_id = %id, price = %price, "stop order rested");
        Ok(id)
    }

    fn check_pair(&self, pair: CurrencyPair) -> Result<(), OrderBookError> {
        if pair != self.pair {
            return Err(OrderBookError::CrossBookCurrencyMismatch {
                expected: self.pair,
                actual: pair,
            });
        }
        Ok(())
    }

    fn check_price(&self, price: SpecificPrice) -> Result<(), OrderBookError> {
        self.check_pair(price.pair())?;
        if price.value() % self.increment != 0 {
            return Err(OrderBookError::InvalidPrice {
                price: price.value(),
                reason: "price is not a multiple of the book increment",
            });
        }
        Ok(())
    }

    /// A limit ask must price above the best bid and a limit bid below the
    /// best ask.
    fn check_limit_coherence(&self, price: SpecificPrice) -> Result<(), OrderBookError> {
        let crosses = match price.side() {
            Side::Ask => self.best_bid.is_some_and(|bid| price.value() <= bid.value()),
            Side::Bid => self.best_ask.is_some_and(|ask| price.value() >= ask.value()),
        };
        if crosses {
            return Err(OrderBookError::InvalidPrice {
                price: price.value(),
                reason: "limit price crosses the best opposite price",
            });
        }
        Ok(())
    }

    fn check_uncrossed(&self, price: SpecificPrice) -> Result<(), OrderBookError> {
        let crosses = match price.side() {
            Side::Ask => self.best_bid.is_some_and(|bid| price.value() < bid.value()),
            Side::Bid => self.best_ask.is_some_and(|ask| price.value() > ask.value()),
        };
        if crosses {
            return Err(OrderBookError::InvalidPrice {
                price: price.value(),
                reason: "order would leave the book crossed",
            });
        }
        Ok(())
    }

    /// A buy stop must sit above the best ask and a sell stop below the best
    /// bid; otherwise it should have been sent as a market order.
    fn check_stop_coherence(&self, price: SpecificPrice) -> Result<(), OrderBookError> {
        let triggers_now = match price.side() {
            Side::Bid => self.best_ask.is_some_and(|ask| price.value() <= ask.value()),
            Side::Ask => self.best_bid.is_some_and(|bid| price.value() >= bid.value()),
        };
        if triggers_now {
            return Err(OrderBookError::InvalidPrice {
                price: price.value(),
                reason: "stop price is already reached by the market",
            });
        }
        Ok(())
    }

    fn check_line_side<O: RestingOrder>(
        &self,
        lines: &BTreeMap<u64, OrderBookLine<O>>,
        price: SpecificPrice,
    ) -> Result<(), OrderBookError> {
        match lines.get(&price.value()) {
            Some(line) if line.side() != price.side() => Err(OrderBookError::DuplicateLine {
                price: price.value(),
                existing: line.side(),
            }),
            _ => Ok(()),
        }
    }

    fn resolve_id(
        &self,
        requested: OrderId,
        admission: Admission,
        ids: &OrderIdGenerator,
    ) -> Result<OrderId, OrderBookError> {
        if admission == Admission::Seeded && requested.is_assigned() {
            if self.contains(requested) {
                return Err(OrderBookError::DuplicateOrderId(requested));
            }
            ids.observe(requested);
            return Ok(requested);
        }
        Ok(ids.next_id())
    }

    // ========================================================================
    // Market Execution
    // ========================================================================

    /// Execute a market order completely or not at all.
    ///
    /// The order is checked for satisfiability before any line is touched, so a
    /// rejected order leaves the book unchanged and carries `OrderId::REJECTED`.
    pub fn execute_market(
        &mut self,
        order: &mut MarketOrder,
        ids: &OrderIdGenerator,
        journal: &mut MatchJournal,
    ) -> Result<MarketExecution, OrderBookError> {
        self.check_pair(order.pair())?;

        if let Some(reason) = self.rejection(order) {
            order.reject();
            tracing::debug!(side = %order.side(), quantity = %order.initial_quantity(), ?reason, "market order rejected");
            return Ok(MarketExecution::Rejected(reason));
        }

        order.assign_id(ids.next_id());
        let mut levels = 0;
        loop {
            let best = self
                .best_opposite(order.side())
                .unwrap_or_else(|| panic!("liquidity vanished while filling market order {}", order.id()));
            order.set_execution_price(best);

            let line = self.limit_lines.get_mut(&best.value()).unwrap_or_else(|| {
                panic!("best price {best} has no limit line")
            });
            let outcome = line.match_market(order, journal);
            let emptied = line.is_empty();
            levels += 1;

            if emptied {
                self.limit_lines.remove(&best.value());
                self.on_line_removed(best, journal);
            }
            match outcome {
                MatchOutcome::AggressorExhausted | MatchOutcome::Both => break,
                MatchOutcome::RestingExhausted => continue,
            }
        }

        tracing::debug!(order_id = %order.id(), levels, "market order filled");
        Ok(MarketExecution::Filled { levels })
    }

    fn rejection(&self, order: &MarketOrder) -> Option<RejectReason> {
        if self.limit_lines.is_empty() {
            return Some(RejectReason::EmptyBook);
        }
        if self.best_opposite(order.side()).is_none() {
            return Some(RejectReason::NoOppositeLiquidity);
        }
        let requested = order.remaining_quantity();
        let available = self.opposite_liquidity(order.side(), requested);
        if available < requested {
            return Some(RejectReason::Unsatisfiable {
                requested,
                available,
            });
        }
        None
    }

    fn best_opposite(&self, aggressor: Side) -> Option<SpecificPrice> {
        match aggressor {
            Side::Bid => self.best_ask,
            Side::Ask => self.best_bid,
        }
    }

    /// Resting quantity on the side `aggressor` trades against, walked from the
    /// best price outwards and stopping once `wanted` is covered.
    fn opposite_liquidity(&self, aggressor: Side, wanted: Quantity) -> Quantity {
        let lines: Box<dyn Iterator<Item = &OrderBookLine<LimitOrder>>> = match aggressor {
            Side::Bid => {
                let from = self.best_ask.map_or(0, |ask| ask.value());
                Box::new(self.limit_lines.range(from..).map(|(_, line)| line))
            }
            Side::Ask => {
                let to = self.best_bid.map_or(0, |bid| bid.value());
                Box::new(self.limit_lines.range(..=to).rev().map(|(_, line)| line))
            }
        };

        let mut available = Quantity::ZERO;
        for line in lines.filter(|line| line.side() == aggressor.opposite()) {
            available = available.saturating_add(line.total_quantity());
            if available >= wanted {
                break;
            }
        }
        available
    }

    // ========================================================================
    // Cancellation & Lookup
    // ========================================================================

    /// Cancel a resting order by id, searching the limit book first.
    ///
    /// An order placed by a user can only be cancelled by that same user.
    pub fn cancel(
        &mut self,
        order_id: OrderId,
        requester: Option<&UserHandle>,
        journal: &mut MatchJournal,
    ) -> Result<Order, OrderBookError> {
        if let Some(price) = find_line(&self.limit_lines, order_id) {
            return self.cancel_at(LineKind::Limit, price, order_id, requester, journal);
        }
        if let Some(price) = find_line(&self.stop_lines, order_id) {
            return self.cancel_at(LineKind::Stop, price, order_id, requester, journal);
        }
        Err(OrderBookError::OrderNotFound(order_id))
    }

    /// Cancel an order known to rest in the `kind` line at `price`.
    pub fn cancel_at(
        &mut self,
        kind: LineKind,
        price: u64,
        order_id: OrderId,
        requester: Option<&UserHandle>,
        journal: &mut MatchJournal,
    ) -> Result<Order, OrderBookError> {
        let now = Utc::now();
        match kind {
            LineKind::Limit => {
                let line = self
                    .limit_lines
                    .get_mut(&price)
                    .ok_or(OrderBookError::LineNotFound { kind, price })?;
                check_owner(line, order_id, requester)?;
                let order = line.cancel(order_id)?;
                if line.is_empty() {
                    let line_price = line.price();
                    self.limit_lines.remove(&price);
                    self.on_line_removed(line_price, journal);
                }
                journal.record(order.record(RecordKind::Cancelled, None, now));
                tracing::debug!(order_id = %order_id, price, "limit order cancelled");
                Ok(Order::Limit(order))
            }
            LineKind::Stop => {
                let line = self
                    .stop_lines
                    .get_mut(&price)
                    .ok_or(OrderBookError::LineNotFound { kind, price })?;
                check_owner(line, order_id, requester)?;
                let order = line.cancel(order_id)?;
                if line.is_empty() {
                    self.stop_lines.remove(&price);
                }
                journal.record(order.record(RecordKind::Cancelled, now));
                tracing::debug!(order_id = %order_id, price, "stop order cancelled");
                Ok(Order::Stop(order))
            }
        }
    }

    /// Copy of a resting order.
    pub fn order(&self, order_id: OrderId) -> Option<Order> {
        self.limit_lines
            .values()
            .find_map(|line| line.get(order_id))
            .map(|order| Order::Limit(order.clone()))
            .or_else(|| {
                self.stop_lines
                    .values()
                    .find_map(|line| line.get(order_id))
                    .map(|order| Order::Stop(order.clone()))
            })
    }

    pub fn contains(&self, order_id: OrderId) -> bool {
        find_line(&self.limit_lines, order_id).is_some()
            || find_line(&self.stop_lines, order_id).is_some()
    }

    // ========================================================================
    // Best Price Maintenance & Stop Triggering
    // ========================================================================

    fn on_line_added(&mut self, price: SpecificPrice, journal: &mut MatchJournal) {
        let improves = match price.side() {
            Side::Ask => self.best_ask.map_or(true, |ask| price.value() < ask.value()),
            Side::Bid => self.best_bid.map_or(true, |bid| price.value() > bid.value()),
        };
        if !improves {
            return;
        }
        match price.side() {
            Side::Ask => self.best_ask = Some(price),
            Side::Bid => self.best_bid = Some(price),
        }
        self.trigger_stops(journal);
    }

    fn on_line_removed(&mut self, price: SpecificPrice, journal: &mut MatchJournal) {
        match price.side() {
            Side::Ask if self.best_ask == Some(price) => self.best_ask = self.scan_best_ask(),
            Side::Bid if self.best_bid == Some(price) => self.best_bid = self.scan_best_bid(),
            _ => return,
        }
        self.trigger_stops(journal);
    }

    /// Lowest ask line. Asks price above every bid, so the scan starts past the
    /// best bid.
    fn scan_best_ask(&self) -> Option<SpecificPrice> {
        let floor = self.best_bid.map_or(0, |bid| bid.value());
        self.limit_lines
            .range(floor..)
            .map(|(_, line)| line)
            .find(|line| line.side() == Side::Ask)
            .map(|line| line.price())
    }

    /// Highest bid line, scanning down from the best ask.
    fn scan_best_bid(&self) -> Option<SpecificPrice> {
        let ceiling = self.best_ask.map_or(u64::MAX, |ask| ask.value());
        self.limit_lines
            .range(..=ceiling)
            .rev()
            .map(|(_, line)| line)
            .find(|line| line.side() == Side::Bid)
            .map(|line| line.price())
    }

    /// Convert every stop reached by the current best prices into a market
    /// order on the journal.
    ///
    /// Buy stops trigger at or below the best ask, sell stops at or above the
    /// best bid. Each pass pops one stop per eligible line, buy lines first,
    /// and repeats until no line is eligible.
    pub fn trigger_stops(&mut self, journal: &mut MatchJournal) {
        loop {
            let eligible = self.eligible_stop_lines();
            if eligible.is_empty() {
                return;
            }
            for price in eligible {
                let Some(line) = self.stop_lines.get_mut(&price) else {
                    continue;
                };
                if let Some(market) = line.pop_stop_for_trigger(journal) {
                    tracing::info!(
                        stop_id = %market.origin().map_or(OrderId::UNASSIGNED, |o| o.stop_id),
                        price,
                        "stop order triggered"
                    );
                    journal.push_triggered(market);
                }
                if line.is_empty() {
                    self.stop_lines.remove(&price);
                }
            }
        }
    }

    /// Buy stop lines from the highest price down, then sell stop lines from
    /// the lowest price up.
    fn eligible_stop_lines(&self) -> SmallVec<[u64; 8]> {
        let mut eligible = SmallVec::new();
        if let Some(ask) = self.best_ask {
            eligible.extend(
                self.stop_lines
                    .range(..=ask.value())
                    .rev()
                    .filter(|(_, line)| line.side() == Side::Bid)
                    .map(|(price, _)| *price),
            );
        }
        if let Some(bid) = self.best_bid {
            eligible.extend(
                self.stop_lines
                    .range(bid.value()..)
                    .filter(|(_, line)| line.side() == Side::Ask)
                    .map(|(price, _)| *price),
            );
        }
        eligible
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Aggregated view of the `depth` best limit lines per side.
    pub fn snapshot(&self, depth: usize) -> OrderBookSnapshot {
        OrderBookSnapshot::with_depth(
            self.pair,
            self.limit_levels(Side::Bid, depth),
            self.limit_levels(Side::Ask, depth),
        )
        .with_stops(self.stop_levels(Side::Bid), self.stop_levels(Side::Ask))
    }

    /// `(price, total quantity)` of the best `depth` limit lines on `side`.
    pub fn limit_levels(&self, side: Side, depth: usize) -> Vec<(u64, Quantity)> {
        let lines: Box<dyn Iterator<Item = &OrderBookLine<LimitOrder>>> = match side {
            Side::Bid => Box::new(self.limit_lines.values().rev()),
            Side::Ask => Box::new(self.limit_lines.values()),
        };
        lines
            .filter(|line| line.side() == side)
            .take(depth)
            .map(|line| (line.price().value(), line.total_quantity()))
            .collect()
    }

    /// `(price, total quantity)` of every stop line on `side`, ascending.
    pub fn stop_levels(&self, side: Side) -> Vec<(u64, Quantity)> {
        self.stop_lines
            .values()
            .filter(|line| line.side() == side)
            .map(|line| (line.price().value(), line.total_quantity()))
            .collect()
    }

    /// Check every structural invariant of the book.
    pub fn validate(&self) -> Result<(), String> {
        for (price, line) in &self.limit_lines {
            line.validate()?;
            if line.price().value() != *price {
                return Err(format!("limit line {} stored under key {price}", line.price()));
            }
        }
        for (price, line) in &self.stop_lines {
            line.validate()?;
            if line.price().value() != *price {
                return Err(format!("stop line {} stored under key {price}", line.price()));
            }
        }

        let true_ask = self
            .limit_lines
            .values()
            .find(|line| line.side() == Side::Ask)
            .map(|line| line.price());
        let true_bid = self
            .limit_lines
            .values()
            .rev()
            .find(|line| line.side() == Side::Bid)
            .map(|line| line.price());
        if true_ask != self.best_ask {
            return Err(format!("best ask {:?} but lowest ask line {:?}", self.best_ask, true_ask));
        }
        if true_bid != self.best_bid {
            return Err(format!("best bid {:?} but highest bid line {:?}", self.best_bid, true_bid));
        }
        if let (Some(bid), Some(ask)) = (self.best_bid, self.best_ask) {
            if bid.value() >= ask.value() {
                return Err(format!("book crossed: bid {bid} >= ask {ask}"));
            }
        }
        Ok(())
    }
}

fn find_line<O: RestingOrder>(
    lines: &BTreeMap<u64, OrderBookLine<O>>,
    order_id: OrderId,
) -> Option<u64> {
    lines
        .iter()
        .find(|(_, line)| line.get(order_id).is_some())
        .map(|(price, _)| *price)
}

fn check_owner<O: RestingOrder>(
    line: &OrderBookLine<O>,
    order_id: OrderId,
    requester: Option<&UserHandle>,
) -> Result<(), OrderBookError> {
    let order = line
        .get(order_id)
        .ok_or(OrderBookError::OrderNotFound(order_id))?;
    match order.user() {
        Some(owner) if requester != Some(owner) => Err(OrderBookError::NotOrderOwner(order_id)),
        _ => Ok(()),
    }
}
