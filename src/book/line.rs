// ============================================================================
// Order Book Line
// FIFO queue of same-price, same-side, same-kind orders
// ============================================================================

use super::MatchJournal;
use crate::domain::{
    LimitOrder, MarketOrder, OrderId, RecordKind, Side, SpecificPrice, StopOrder, UserHandle,
};
use crate::error::OrderBookError;
use crate::numeric::Quantity;
use chrono::Utc;
use std::collections::VecDeque;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

// ============================================================================
// Line Kind
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LineKind {
    Limit,
    Stop,
}

impl fmt::Display for LineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineKind::Limit => f.write_str("limit"),
            LineKind::Stop => f.write_str("stop"),
        }
    }
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for crate::domain::LimitOrder {}
    impl Sealed for crate::domain::StopOrder {}
}

/// Orders that can wait in a line: limit and stop orders.
pub trait RestingOrder: sealed::Sealed + Clone + fmt::Debug + Send {
    const KIND: LineKind;

    fn id(&self) -> OrderId;
    fn price(&self) -> SpecificPrice;
    fn remaining_quantity(&self) -> Quantity;
    fn user(&self) -> Option<&UserHandle>;
}

impl RestingOrder for LimitOrder {
    const KIND: LineKind = LineKind::Limit;

    fn id(&self) -> OrderId {
        LimitOrder::id(self)
    }

    fn price(&self) -> SpecificPrice {
        LimitOrder::price(self)
    }

    fn remaining_quantity(&self) -> Quantity {
        LimitOrder::remaining_quantity(self)
    }

    fn user(&self) -> Option<&UserHandle> {
        LimitOrder::user(self)
    }
}

impl RestingOrder for StopOrder {
    const KIND: LineKind = LineKind::Stop;

    fn id(&self) -> OrderId {
        StopOrder::id(self)
    }

    fn price(&self) -> SpecificPrice {
        StopOrder::price(self)
    }

    fn remaining_quantity(&self) -> Quantity {
        self.quantity()
    }

    fn user(&self) -> Option<&UserHandle> {
        StopOrder::user(self)
    }
}

/// Result of one `match_market` step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    /// The oldest resting order was used up; the market order still needs more
    RestingExhausted,
    /// The market order is filled; the resting order keeps a remainder
    AggressorExhausted,
    /// Both sides reached zero
    Both,
}

// ============================================================================
// Order Book Line
// ============================================================================

/// Orders waiting at one price, oldest at the front.
///
/// `total_quantity` always equals the sum of the members' remaining
/// quantities. A line is never left empty inside a book.
#[derive(Debug, Clone)]
pub struct OrderBookLine<O: RestingOrder> {
    price: SpecificPrice,
    orders: VecDeque<O>,
    total_quantity: Quantity,
}

impl<O: RestingOrder> OrderBookLine<O> {
    /// Create a line seeded with its first order.
    pub fn new(first: O) -> Self {
        let price = first.price();
        let total_quantity = first.remaining_quantity();
        let mut orders = VecDeque::with_capacity(4);
        orders.push_back(first);
        Self {
            price,
            orders,
            total_quantity,
        }
    }

    pub fn price(&self) -> SpecificPrice {
        self.price
    }

    pub fn side(&self) -> Side {
        self.price.side()
    }

    pub fn kind(&self) -> LineKind {
        O::KIND
    }

    pub fn total_quantity(&self) -> Quantity {
        self.total_quantity
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Orders from oldest to newest.
    pub fn orders(&self) -> impl Iterator<Item = &O> {
        self.orders.iter()
    }

    pub fn get(&self, order_id: OrderId) -> Option<&O> {
        self.orders.iter().find(|order| order.id() == order_id)
    }

    /// Append an order at the newest end.
    pub fn add(&mut self, order: O) -> Result<(), OrderBookError> {
        if order.price() != self.price {
            return Err(OrderBookError::InvalidPrice {
                price: order.price().value(),
                reason: "order price or side differs from the line",
            });
        }
        self.total_quantity = self
            .total_quantity
            .checked_add(order.remaining_quantity())?;
        self.orders.push_back(order);
        Ok(())
    }

    /// Remove an order anywhere in the queue.
    pub fn cancel(&mut self, order_id: OrderId) -> Result<O, OrderBookError> {
        let index = self
            .orders
            .iter()
            .position(|order| order.id() == order_id)
            .ok_or(OrderBookError::OrderNotFound(order_id))?;
        let order = self
            .orders
            .remove(index)
            .ok_or(OrderBookError::OrderNotFound(order_id))?;
        self.release(order.remaining_quantity());
        Ok(order)
    }

    fn release(&mut self, quantity: Quantity) {
        self.total_quantity = self.total_quantity.checked_sub(quantity).unwrap_or_else(|err| {
            panic!(
                "{} line at {} lost track of its total quantity: {err}",
                O::KIND,
                self.price
            )
        });
    }

    /// Check the aggregate and membership invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.orders.is_empty() {
            return Err(format!("{} line at {} is empty", O::KIND, self.price));
        }
        if let Some(stray) = self.orders.iter().find(|order| order.price() != self.price) {
            return Err(format!(
                "order {} priced {} sits in line {}",
                stray.id(),
                stray.price(),
                self.price
            ));
        }
        let sum: Quantity = self.orders.iter().map(|order| order.remaining_quantity()).sum();
        if sum != self.total_quantity {
            return Err(format!(
                "line {} total {} differs from member sum {}",
                self.price, self.total_quantity, sum
            ));
        }
        Ok(())
    }
}

impl OrderBookLine<LimitOrder> {
    /// Fill the oldest resting order against `market` for the smaller of the
    /// two remaining quantities.
    ///
    /// Panics if the line is empty or the market order is already filled.
    pub fn match_market(
        &mut self,
        market: &mut MarketOrder,
        journal: &mut MatchJournal,
    ) -> MatchOutcome {
        assert!(
            !market.is_filled(),
            "market order {} matched with nothing left to fill",
            market.id()
        );
        let now = Utc::now();
        let resting = self
            .orders
            .front_mut()
            .unwrap_or_else(|| panic!("matching against empty line at {}", self.price));

        let quantity = resting.remaining_quantity().min(market.remaining_quantity());
        resting.fill(quantity, now);
        market.fill(quantity, now);
        journal.record_fill(resting, market, quantity, now);

        let outcome = match (resting.is_filled(), market.is_filled()) {
            (true, true) => MatchOutcome::Both,
            (true, false) => MatchOutcome::RestingExhausted,
            (false, true) => MatchOutcome::AggressorExhausted,
            (false, false) => unreachable!("a fill always exhausts one side"),
        };

        if resting.is_filled() {
            self.orders.pop_front();
        }
        self.release(quantity);
        outcome
    }
}

impl OrderBookLine<StopOrder> {
    /// Pop the oldest stop and turn it into the market order that executes it.
    pub fn pop_stop_for_trigger(&mut self, journal: &mut MatchJournal) -> Option<MarketOrder> {
        let stop = self.orders.pop_front()?;
        self.release(stop.quantity());

        let now = Utc::now();
        journal.record(stop.record(RecordKind::Triggered, now));
        Some(stop.into_market(now))
    }
}
