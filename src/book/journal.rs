// ============================================================================
// Match Journal
// Side effects collected under the book lock and published after release
// ============================================================================

use crate::domain::{LimitOrder, MarketOrder, OrderRecord, RecordKind, Trade};
use crate::numeric::Quantity;
use chrono::{DateTime, Utc};
use smallvec::SmallVec;

/// Trades, order records and triggered stops produced by one book operation.
///
/// The book only appends to the journal; persistence, notification and the
/// trigger queue consume it once the book lock has been released.
#[derive(Debug, Default)]
pub struct MatchJournal {
    trades: Vec<Trade>,
    records: Vec<OrderRecord>,
    triggered: SmallVec<[MarketOrder; 2]>,
}

impl MatchJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append both trade legs and both post-fill records of one fill.
    pub(crate) fn record_fill(
        &mut self,
        resting: &LimitOrder,
        aggressor: &MarketOrder,
        quantity: Quantity,
        at: DateTime<Utc>,
    ) {
        self.trades
            .extend(Trade::legs(resting, aggressor, quantity, at));
        self.records
            .push(resting.record(fill_kind(resting.is_filled()), Some(quantity), at));
        self.records
            .push(aggressor.record(fill_kind(aggressor.is_filled()), Some(quantity), at));
    }

    pub(crate) fn record(&mut self, record: OrderRecord) {
        self.records.push(record);
    }

    pub(crate) fn push_triggered(&mut self, order: MarketOrder) {
        self.triggered.push(order);
    }

    /// Market orders created by stops triggered during this operation, in
    /// trigger order.
    pub fn take_triggered(&mut self) -> SmallVec<[MarketOrder; 2]> {
        std::mem::take(&mut self.triggered)
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn records(&self) -> &[OrderRecord] {
        &self.records
    }

    pub fn triggered(&self) -> &[MarketOrder] {
        &self.triggered
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty() && self.records.is_empty() && self.triggered.is_empty()
    }

    pub fn into_parts(self) -> (Vec<Trade>, Vec<OrderRecord>) {
        (self.trades, self.records)
    }
}

fn fill_kind(filled: bool) -> RecordKind {
    if filled {
        RecordKind::Filled
    } else {
        RecordKind::PartiallyFilled
    }
}
