// ============================================================================
// Order Book Snapshot
// ============================================================================

use crate::domain::CurrencyPair;
use crate::numeric::Quantity;
use rust_decimal::Decimal;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Immutable snapshot of the order book state
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OrderBookSnapshot {
    pub pair: CurrencyPair,
    /// Bid levels (price, quantity), best first
    pub bids: Vec<(u64, Quantity)>,
    /// Ask levels (price, quantity), best first
    pub asks: Vec<(u64, Quantity)>,
    /// Buy stop lines (price, quantity), ascending
    pub stop_bids: Vec<(u64, Quantity)>,
    /// Sell stop lines (price, quantity), ascending
    pub stop_asks: Vec<(u64, Quantity)>,
    /// Current spread (ask - bid)
    pub spread: Option<Decimal>,
    /// Mid price
    pub mid_price: Option<Decimal>,
}

impl OrderBookSnapshot {
    pub fn new(pair: CurrencyPair) -> Self {
        Self::with_depth(pair, Vec::new(), Vec::new())
    }

    pub fn with_depth(
        pair: CurrencyPair,
        bids: Vec<(u64, Quantity)>,
        asks: Vec<(u64, Quantity)>,
    ) -> Self {
        let top = match (bids.first(), asks.first()) {
            (Some((bid, _)), Some((ask, _))) => Some((Decimal::from(*bid), Decimal::from(*ask))),
            _ => None,
        };

        Self {
            pair,
            bids,
            asks,
            stop_bids: Vec::new(),
            stop_asks: Vec::new(),
            spread: top.map(|(bid, ask)| ask - bid),
            mid_price: top.map(|(bid, ask)| (bid + ask) / Decimal::from(2)),
        }
    }

    pub fn with_stops(mut self, stop_bids: Vec<(u64, Quantity)>, stop_asks: Vec<(u64, Quantity)>) -> Self {
        self.stop_bids = stop_bids;
        self.stop_asks = stop_asks;
        self
    }

    pub fn best_bid(&self) -> Option<u64> {
        self.bids.first().map(|(price, _)| *price)
    }

    pub fn best_ask(&self) -> Option<u64> {
        self.asks.first().map(|(price, _)| *price)
    }

    pub fn total_bid_quantity(&self) -> Quantity {
        self.bids.iter().map(|(_, qty)| qty).sum()
    }

    pub fn total_ask_quantity(&self) -> Quantity {
        self.asks.iter().map(|(_, qty)| qty).sum()
    }
}

/// Ladder rendering: asks from worst to best above the spread, bids below.
impl fmt::Display for OrderBookSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} order book", self.pair)?;
        for (price, qty) in self.asks.iter().rev() {
            writeln!(f, "  ASK {price:>12} | {qty}")?;
        }
        match self.spread {
            Some(spread) => writeln!(f, "  ---- spread {spread} ----")?,
            None => writeln!(f, "  ----")?,
        }
        for (price, qty) in &self.bids {
            writeln!(f, "  BID {price:>12} | {qty}")?;
        }
        Ok(())
    }
}
