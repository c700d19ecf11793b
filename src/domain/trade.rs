// ============================================================================
// Trade Domain Model
// ============================================================================

use super::{CurrencyPair, LimitOrder, MarketOrder, OrderId, OrderKind, Side, StopOrigin, UserHandle};
use crate::numeric::Quantity;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Whether a trade leg belongs to the resting order or the incoming one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TradeRole {
    /// Order resting in a limit line
    Maker,
    /// Market order that crossed the book
    Taker,
}

/// One leg of a fill, addressed to the owner of `order_id`.
///
/// Every fill produces two legs: one for the resting limit order and one for
/// the market order. A leg whose `order_id` is `OrderId::REJECTED` tells the
/// owner of a triggered stop that it could not be executed.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Trade {
    /// Unique trade identifier
    pub id: Uuid,
    pub pair: CurrencyPair,
    pub order_id: OrderId,
    pub order_kind: OrderKind,
    pub side: Side,
    pub role: TradeRole,
    pub price: u64,
    pub quantity: Quantity,
    pub user: Option<UserHandle>,
    pub timestamp: DateTime<Utc>,
}

impl Trade {
    /// Both legs of a fill of `quantity` between `resting` and `aggressor`.
    pub(crate) fn legs(
        resting: &LimitOrder,
        aggressor: &MarketOrder,
        quantity: Quantity,
        at: DateTime<Utc>,
    ) -> [Trade; 2] {
        let price = resting.price().value();
        let (aggressor_id, aggressor_kind) = aggressor.trade_identity();
        [
            Trade {
                id: Uuid::new_v4(),
                pair: resting.pair(),
                order_id: resting.id(),
                order_kind: OrderKind::Limit,
                side: resting.side(),
                role: TradeRole::Maker,
                price,
                quantity,
                user: resting.user().cloned(),
                timestamp: at,
            },
            Trade {
                id: Uuid::new_v4(),
                pair: aggressor.pair(),
                order_id: aggressor_id,
                order_kind: aggressor_kind,
                side: aggressor.side(),
                role: TradeRole::Taker,
                price,
                quantity,
                user: aggressor.user().cloned(),
                timestamp: at,
            },
        ]
    }

    /// Notice sent to the owner of a stop whose market order found no liquidity.
    pub fn stop_not_executed(origin: &StopOrigin, at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            pair: origin.trigger_price.pair(),
            order_id: OrderId::REJECTED,
            order_kind: OrderKind::Stop,
            side: origin.trigger_price.side(),
            role: TradeRole::Taker,
            price: origin.trigger_price.value(),
            quantity: origin.quantity,
            user: origin.user.clone(),
            timestamp: at,
        }
    }

    pub fn is_rejection(&self) -> bool {
        self.order_id.is_rejected()
    }

    /// Price times quantity in the secondary currency.
    pub fn notional_value(&self) -> Decimal {
        Decimal::from(self.price) * Decimal::from(self.quantity.value())
    }
}
