// ============================================================================
// Book Module
// Price lines and the single-threaded order book they make up
// ============================================================================

mod journal;
mod line;
mod snapshot;
mod state;

pub use journal::MatchJournal;
pub use line::{LineKind, MatchOutcome, OrderBookLine, RestingOrder};
pub use snapshot::OrderBookSnapshot;
pub use state::{Admission, BookState, MarketExecution, RejectReason};
