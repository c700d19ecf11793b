// ============================================================================
// Numeric Errors
// Error types for integer quantity arithmetic
// ============================================================================

use thiserror::Error;

/// Errors that can occur during checked quantity arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum NumericError {
    /// Result exceeded u64::MAX
    #[error("arithmetic overflow: result exceeded maximum value")]
    Overflow,
    /// Result would be negative
    #[error("arithmetic underflow: result below zero")]
    Underflow,
}

/// Result type alias for numeric operations
pub type NumericResult<T> = Result<T, NumericError>;
