// ============================================================================
// Order Records
// Copied-out order state handed to persistence after the book lock is released
// ============================================================================

use super::{CurrencyPair, OrderId, OrderKind, Side, UserHandle};
use crate::numeric::Quantity;
use chrono::{DateTime, Utc};
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Which state transition produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RecordKind {
    /// Limit or stop order accepted into the book
    Created,
    PartiallyFilled,
    Filled,
    /// Stop order popped from its line and converted to a market order
    Triggered,
    Cancelled,
    /// Order refused; for a stop this means its market order found no liquidity
    Rejected,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordKind::Created => "created",
            RecordKind::PartiallyFilled => "partially_filled",
            RecordKind::Filled => "filled",
            RecordKind::Triggered => "triggered",
            RecordKind::Cancelled => "cancelled",
            RecordKind::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

/// Snapshot of one order at one state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OrderRecord {
    pub order_id: OrderId,
    pub kind: OrderKind,
    pub side: Side,
    pub pair: CurrencyPair,
    /// Limit/stop price, or the execution price of a market order fill
    pub price: Option<u64>,
    pub initial_quantity: Quantity,
    pub remaining_quantity: Quantity,
    /// Quantity exchanged by the fill that produced this record
    pub last_fill: Option<Quantity>,
    pub user: Option<UserHandle>,
    /// Stop order a market order was created from
    pub from_stop: Option<OrderId>,
    pub transition: RecordKind,
    pub timestamp: DateTime<Utc>,
}

impl OrderRecord {
    pub fn is_fill(&self) -> bool {
        matches!(
            self.transition,
            RecordKind::PartiallyFilled | RecordKind::Filled
        )
    }
}
