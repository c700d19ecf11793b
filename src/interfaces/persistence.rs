// ============================================================================
// Persistence Interface
// Best-effort side log of order state transitions
// ============================================================================

use crate::domain::{OrderId, OrderKind, OrderRecord, Side};
use crate::numeric::Quantity;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistError {
    #[error("order store unavailable: {0}")]
    Unavailable(String),

    #[error("order store refused record for order {order_id}: {reason}")]
    Refused { order_id: OrderId, reason: String },
}

/// Receives a copy of every order state transition.
///
/// Called after the book lock is released. Failures are not retried and never
/// undo the in-memory match.
pub trait PersistenceSink: Send + Sync {
    fn persist(&self, record: &OrderRecord) -> Result<(), PersistError>;
}

/// Persistence sink that drops every record
pub struct NoOpPersistence;

impl PersistenceSink for NoOpPersistence {
    fn persist(&self, _record: &OrderRecord) -> Result<(), PersistError> {
        Ok(())
    }
}

// ============================================================================
// In-Memory Order Store
// ============================================================================

/// Open/high/low/close of executed buy-side market fills on one UTC day.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DailyPriceStats {
    pub date: NaiveDate,
    pub open: u64,
    pub high: u64,
    pub low: u64,
    pub close: u64,
    pub volume: Quantity,
}

impl DailyPriceStats {
    fn opening(date: NaiveDate, price: u64, quantity: Quantity) -> Self {
        Self {
            date,
            open: price,
            high: price,
            low: price,
            close: price,
            volume: quantity,
        }
    }

    fn extend(&mut self, price: u64, quantity: Quantity) {
        self.high = self.high.max(price);
        self.low = self.low.min(price);
        self.close = price;
        self.volume = self.volume.saturating_add(quantity);
    }
}

/// Append-only record store kept in memory.
#[derive(Debug, Default)]
pub struct InMemoryOrderStore {
    records: RwLock<Vec<OrderRecord>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// All records in arrival order.
    pub fn records(&self) -> Vec<OrderRecord> {
        self.records.read().clone()
    }

    /// Every record of one order, oldest first.
    pub fn history(&self, order_id: OrderId) -> Vec<OrderRecord> {
        self.records
            .read()
            .iter()
            .filter(|record| record.order_id == order_id)
            .cloned()
            .collect()
    }

    /// Most recent state of one order.
    pub fn latest(&self, order_id: OrderId) -> Option<OrderRecord> {
        self.records
            .read()
            .iter()
            .rev()
            .find(|record| record.order_id == order_id)
            .cloned()
    }

    /// Daily price statistics for `month` of `year`, one entry per UTC day
    /// that saw a buy-side market fill, in date order.
    pub fn price_history(&self, year: i32, month: u32) -> Vec<DailyPriceStats> {
        let records = self.records.read();
        let mut fills: Vec<(DateTime<Utc>, u64, Quantity)> = records
            .iter()
            .filter(|record| {
                record.kind == OrderKind::Market && record.side == Side::Bid && record.is_fill()
            })
            .filter(|record| record.timestamp.year() == year && record.timestamp.month() == month)
            .filter_map(|record| {
                let price = record.price?;
                Some((record.timestamp, price, record.last_fill.unwrap_or(Quantity::ZERO)))
            })
            .collect();
        drop(records);
        fills.sort_by_key(|(timestamp, _, _)| *timestamp);

        let mut days: BTreeMap<NaiveDate, DailyPriceStats> = BTreeMap::new();
        for (timestamp, price, quantity) in fills {
            let date = timestamp.date_naive();
            days.entry(date)
                .and_modify(|stats| stats.extend(price, quantity))
                .or_insert_with(|| DailyPriceStats::opening(date, price, quantity));
        }
        days.into_values().collect()
    }

    /// Records as newline-separated JSON objects.
    #[cfg(feature = "serde")]
    pub fn to_json_lines(&self) -> Result<String, PersistError> {
        let records = self.records.read();
        let mut out = String::new();
        for record in records.iter() {
            let line = serde_json::to_string(record).map_err(|err| PersistError::Refused {
                order_id: record.order_id,
                reason: err.to_string(),
            })?;
            out.push_str(&line);
            out.push('\n');
        }
        Ok(out)
    }
}

impl PersistenceSink for InMemoryOrderStore {
    fn persist(&self, record: &OrderRecord) -> Result<(), PersistError> {
        self.records.write().push(record.clone());
        Ok(())
    }
}
