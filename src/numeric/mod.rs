// ============================================================================
// Numeric Module
// Integer quantities used by orders, lines and trades
// ============================================================================
//
// Prices and quantities are whole units of the secondary and primary currency
// respectively. Arithmetic on them is checked and never wraps.

mod errors;
mod quantity;

pub use errors::{NumericError, NumericResult};
pub use quantity::Quantity;
