// ============================================================================
// Order Domain Model
// Limit, market and stop orders plus their identities
// ============================================================================

use super::{CurrencyPair, OrderRecord, RecordKind, Side, SpecificPrice};
use crate::error::OrderBookError;
use crate::numeric::Quantity;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

// ============================================================================
// Value Objects
// ============================================================================

/// Order identifier. Assigned on acceptance; `-1` marks a rejected order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OrderId(i64);

impl OrderId {
    /// Sentinel carried by orders the book refused to execute.
    pub const REJECTED: Self = Self(-1);

    /// Placeholder for orders that have not reached the book yet.
    pub const UNASSIGNED: Self = Self(0);

    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    pub const fn value(self) -> i64 {
        self.0
    }

    pub const fn is_rejected(self) -> bool {
        self.0 == Self::REJECTED.0
    }

    pub const fn is_assigned(self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic id source owned by one order book.
#[derive(Debug)]
pub struct OrderIdGenerator {
    next: AtomicI64,
}

impl OrderIdGenerator {
    pub fn new() -> Self {
        Self {
            next: AtomicI64::new(1),
        }
    }

    pub fn next_id(&self) -> OrderId {
        OrderId(self.next.fetch_add(1, Ordering::AcqRel))
    }

    /// Make sure ids handed out later are greater than `id`.
    pub fn observe(&self, id: OrderId) {
        self.next.fetch_max(id.0.saturating_add(1), Ordering::AcqRel);
    }
}

impl Default for OrderIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Opaque handle of the user who placed an order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct UserHandle(String);

impl UserHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum OrderKind {
    Limit,
    Market,
    Stop,
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderKind::Limit => f.write_str("limit"),
            OrderKind::Market => f.write_str("market"),
            OrderKind::Stop => f.write_str("stop"),
        }
    }
}

fn require_quantity(quantity: Quantity) -> Result<Quantity, OrderBookError> {
    if quantity.is_zero() {
        return Err(OrderBookError::InvalidQuantity(
            "order quantity must be greater than zero",
        ));
    }
    Ok(quantity)
}

fn consume(remaining: &mut Quantity, fill: Quantity, id: OrderId) {
    *remaining = remaining
        .checked_sub(fill)
        .unwrap_or_else(|err| panic!("order {id} filled beyond its remaining quantity: {err}"));
}

// ============================================================================
// Limit Order
// ============================================================================

/// Order resting at a fixed price until matched or cancelled.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LimitOrder {
    id: OrderId,
    price: SpecificPrice,
    initial_quantity: Quantity,
    remaining_quantity: Quantity,
    user: Option<UserHandle>,
    created_at: DateTime<Utc>,
    executed_at: Option<DateTime<Utc>>,
}

impl LimitOrder {
    /// `price.side()` is the side the order rests on: `Ask` sells, `Bid` buys.
    pub fn new(price: SpecificPrice, quantity: Quantity) -> Result<Self, OrderBookError> {
        let quantity = require_quantity(quantity)?;
        Ok(Self {
            id: OrderId::UNASSIGNED,
            price,
            initial_quantity: quantity,
            remaining_quantity: quantity,
            user: None,
            created_at: Utc::now(),
            executed_at: None,
        })
    }

    pub fn with_user(mut self, user: UserHandle) -> Self {
        self.user = Some(user);
        self
    }

    /// Keep a previously assigned id when seeding a book from stored orders.
    pub fn with_id(mut self, id: OrderId) -> Self {
        self.id = id;
        self
    }

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn price(&self) -> SpecificPrice {
        self.price
    }

    pub fn side(&self) -> Side {
        self.price.side()
    }

    pub fn pair(&self) -> CurrencyPair {
        self.price.pair()
    }

    pub fn initial_quantity(&self) -> Quantity {
        self.initial_quantity
    }

    pub fn remaining_quantity(&self) -> Quantity {
        self.remaining_quantity
    }

    pub fn user(&self) -> Option<&UserHandle> {
        self.user.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Time of the most recent fill.
    pub fn executed_at(&self) -> Option<DateTime<Utc>> {
        self.executed_at
    }

    pub fn is_filled(&self) -> bool {
        self.remaining_quantity.is_zero()
    }

    pub(crate) fn assign_id(&mut self, id: OrderId) {
        self.id = id;
    }

    pub(crate) fn fill(&mut self, quantity: Quantity, at: DateTime<Utc>) {
        consume(&mut self.remaining_quantity, quantity, self.id);
        self.executed_at = Some(at);
    }

    pub fn record(
        &self,
        transition: RecordKind,
        last_fill: Option<Quantity>,
        at: DateTime<Utc>,
    ) -> OrderRecord {
        OrderRecord {
            order_id: self.id,
            kind: OrderKind::Limit,
            side: self.side(),
            pair: self.pair(),
            price: Some(self.price.value()),
            initial_quantity: self.initial_quantity,
            remaining_quantity: self.remaining_quantity,
            last_fill,
            user: self.user.clone(),
            from_stop: None,
            transition,
            timestamp: at,
        }
    }
}

// ============================================================================
// Stop Order
// ============================================================================

/// Hidden order that turns into a market order once the market reaches its
/// trigger price. A `Bid` stop buys, an `Ask` stop sells.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StopOrder {
    id: OrderId,
    price: SpecificPrice,
    quantity: Quantity,
    user: Option<UserHandle>,
    created_at: DateTime<Utc>,
}

impl StopOrder {
    pub fn new(price: SpecificPrice, quantity: Quantity) -> Result<Self, OrderBookError> {
        let quantity = require_quantity(quantity)?;
        Ok(Self {
            id: OrderId::UNASSIGNED,
            price,
            quantity,
            user: None,
            created_at: Utc::now(),
        })
    }

    pub fn with_user(mut self, user: UserHandle) -> Self {
        self.user = Some(user);
        self
    }

    pub fn with_id(mut self, id: OrderId) -> Self {
        self.id = id;
        self
    }

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn price(&self) -> SpecificPrice {
        self.price
    }

    pub fn side(&self) -> Side {
        self.price.side()
    }

    pub fn pair(&self) -> CurrencyPair {
        self.price.pair()
    }

    /// Stops are never partially executed, so this is also the remaining quantity.
    pub fn quantity(&self) -> Quantity {
        self.quantity
    }

    pub fn user(&self) -> Option<&UserHandle> {
        self.user.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub(crate) fn assign_id(&mut self, id: OrderId) {
        self.id = id;
    }

    /// Convert into the market order that executes this stop.
    pub(crate) fn into_market(self, at: DateTime<Utc>) -> MarketOrder {
        let origin = StopOrigin {
            stop_id: self.id,
            trigger_price: self.price,
            quantity: self.quantity,
            user: self.user.clone(),
            placed_at: self.created_at,
        };
        MarketOrder {
            id: OrderId::UNASSIGNED,
            side: self.side(),
            pair: self.pair(),
            initial_quantity: self.quantity,
            remaining_quantity: self.quantity,
            execution_price: None,
            origin: Some(origin),
            user: self.user,
            created_at: at,
            executed_at: None,
        }
    }

    pub fn record(&self, transition: RecordKind, at: DateTime<Utc>) -> OrderRecord {
        OrderRecord {
            order_id: self.id,
            kind: OrderKind::Stop,
            side: self.side(),
            pair: self.pair(),
            price: Some(self.price.value()),
            initial_quantity: self.quantity,
            remaining_quantity: self.quantity,
            last_fill: None,
            user: self.user.clone(),
            from_stop: None,
            transition,
            timestamp: at,
        }
    }
}

/// Back-reference from a triggered market order to the stop it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StopOrigin {
    pub stop_id: OrderId,
    pub trigger_price: SpecificPrice,
    pub quantity: Quantity,
    pub user: Option<UserHandle>,
    pub placed_at: DateTime<Utc>,
}

impl StopOrigin {
    /// Record reconciling the originating stop once its market order has run.
    pub fn record(
        &self,
        transition: RecordKind,
        remaining: Quantity,
        at: DateTime<Utc>,
    ) -> OrderRecord {
        OrderRecord {
            order_id: self.stop_id,
            kind: OrderKind::Stop,
            side: self.trigger_price.side(),
            pair: self.trigger_price.pair(),
            price: Some(self.trigger_price.value()),
            initial_quantity: self.quantity,
            remaining_quantity: remaining,
            last_fill: None,
            user: self.user.clone(),
            from_stop: None,
            transition,
            timestamp: at,
        }
    }
}

// ============================================================================
// Market Order
// ============================================================================

/// Order executed immediately against the best opposite liquidity.
///
/// A `Bid` market order buys from ask lines, an `Ask` market order sells into
/// bid lines. It is either filled completely or rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MarketOrder {
    id: OrderId,
    side: Side,
    pair: CurrencyPair,
    initial_quantity: Quantity,
    remaining_quantity: Quantity,
    execution_price: Option<SpecificPrice>,
    origin: Option<StopOrigin>,
    user: Option<UserHandle>,
    created_at: DateTime<Utc>,
    executed_at: Option<DateTime<Utc>>,
}

impl MarketOrder {
    pub fn new(side: Side, pair: CurrencyPair, quantity: Quantity) -> Result<Self, OrderBookError> {
        let quantity = require_quantity(quantity)?;
        Ok(Self {
            id: OrderId::UNASSIGNED,
            side,
            pair,
            initial_quantity: quantity,
            remaining_quantity: quantity,
            execution_price: None,
            origin: None,
            user: None,
            created_at: Utc::now(),
            executed_at: None,
        })
    }

    pub fn with_user(mut self, user: UserHandle) -> Self {
        self.user = Some(user);
        self
    }

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn pair(&self) -> CurrencyPair {
        self.pair
    }

    pub fn initial_quantity(&self) -> Quantity {
        self.initial_quantity
    }

    pub fn remaining_quantity(&self) -> Quantity {
        self.remaining_quantity
    }

    pub fn filled_quantity(&self) -> Quantity {
        Quantity::new(self.initial_quantity.value() - self.remaining_quantity.value())
    }

    /// Best opposite price the order last executed at.
    pub fn execution_price(&self) -> Option<SpecificPrice> {
        self.execution_price
    }

    pub fn origin(&self) -> Option<&StopOrigin> {
        self.origin.as_ref()
    }

    pub fn user(&self) -> Option<&UserHandle> {
        self.user.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn executed_at(&self) -> Option<DateTime<Utc>> {
        self.executed_at
    }

    pub fn is_filled(&self) -> bool {
        self.remaining_quantity.is_zero()
    }

    /// Id and kind reported on trades: a market order created by a stop trades
    /// under the stop's identity.
    pub fn trade_identity(&self) -> (OrderId, OrderKind) {
        match &self.origin {
            Some(origin) => (origin.stop_id, OrderKind::Stop),
            None => (self.id, OrderKind::Market),
        }
    }

    pub(crate) fn assign_id(&mut self, id: OrderId) {
        self.id = id;
    }

    pub(crate) fn reject(&mut self) {
        self.id = OrderId::REJECTED;
    }

    pub(crate) fn set_execution_price(&mut self, price: SpecificPrice) {
        self.execution_price = Some(price);
    }

    pub(crate) fn fill(&mut self, quantity: Quantity, at: DateTime<Utc>) {
        consume(&mut self.remaining_quantity, quantity, self.id);
        self.executed_at = Some(at);
    }

    pub fn record(
        &self,
        transition: RecordKind,
        last_fill: Option<Quantity>,
        at: DateTime<Utc>,
    ) -> OrderRecord {
        OrderRecord {
            order_id: self.id,
            kind: OrderKind::Market,
            side: self.side,
            pair: self.pair,
            price: self.execution_price.map(|price| price.value()),
            initial_quantity: self.initial_quantity,
            remaining_quantity: self.remaining_quantity,
            last_fill,
            user: self.user.clone(),
            from_stop: self.origin.as_ref().map(|origin| origin.stop_id),
            transition,
            timestamp: at,
        }
    }
}

// ============================================================================
// Order
// ============================================================================

/// Any order variant, as returned by lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Order {
    Limit(LimitOrder),
    Market(MarketOrder),
    Stop(StopOrder),
}

impl Order {
    pub fn id(&self) -> OrderId {
        match self {
            Order::Limit(order) => order.id(),
            Order::Market(order) => order.id(),
            Order::Stop(order) => order.id(),
        }
    }

    pub fn kind(&self) -> OrderKind {
        match self {
            Order::Limit(_) => OrderKind::Limit,
            Order::Market(_) => OrderKind::Market,
            Order::Stop(_) => OrderKind::Stop,
        }
    }

    pub fn side(&self) -> Side {
        match self {
            Order::Limit(order) => order.side(),
            Order::Market(order) => order.side(),
            Order::Stop(order) => order.side(),
        }
    }

    /// Limit or stop price; the last execution price for market orders.
    pub fn price(&self) -> Option<SpecificPrice> {
        match self {
            Order::Limit(order) => Some(order.price()),
            Order::Market(order) => order.execution_price(),
            Order::Stop(order) => Some(order.price()),
        }
    }

    pub fn remaining_quantity(&self) -> Quantity {
        match self {
            Order::Limit(order) => order.remaining_quantity(),
            Order::Market(order) => order.remaining_quantity(),
            Order::Stop(order) => order.quantity(),
        }
    }

    pub fn user(&self) -> Option<&UserHandle> {
        match self {
            Order::Limit(order) => order.user(),
            Order::Market(order) => order.user(),
            Order::Stop(order) => order.user(),
        }
    }
}

impl From<LimitOrder> for Order {
    fn from(order: LimitOrder) -> Self {
        Order::Limit(order)
    }
}

impl From<StopOrder> for Order {
    fn from(order: StopOrder) -> Self {
        Order::Stop(order)
    }
}

impl From<MarketOrder> for Order {
    fn from(order: MarketOrder) -> Self {
        Order::Market(order)
    }
}
