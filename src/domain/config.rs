// ============================================================================
// Order Book Configuration
// Instrument and price grid for a single order book
// ============================================================================

use super::CurrencyPair;
use crate::error::OrderBookError;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration for creating an order book
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OrderBookConfig {
    /// The traded currency pair
    pub pair: CurrencyPair,

    /// Price increment: every limit and stop price must be a multiple of it
    pub increment: u64,
}

impl OrderBookConfig {
    /// Create a configuration with an increment of one unit
    pub fn new(pair: CurrencyPair) -> Self {
        Self { pair, increment: 1 }
    }

    /// Builder method: Set price increment
    pub fn with_increment(mut self, increment: u64) -> Self {
        self.increment = increment;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), OrderBookError> {
        if self.pair.primary() == self.pair.secondary() {
            return Err(OrderBookError::InvalidConfig(format!(
                "currency pair {} trades a currency against itself",
                self.pair
            )));
        }

        if self.increment == 0 {
            return Err(OrderBookError::InvalidConfig(
                "price increment must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for OrderBookConfig {
    fn default() -> Self {
        Self::btc_usd()
    }
}

// ============================================================================
// Preset Configurations (Factory Methods)
// ============================================================================

impl OrderBookConfig {
    pub fn btc_usd() -> Self {
        Self::new(CurrencyPair::BTC_USD)
    }

    pub fn btc_eur() -> Self {
        Self::new(CurrencyPair::BTC_EUR)
    }

    pub fn eth_usd() -> Self {
        Self::new(CurrencyPair::ETH_USD)
    }

    pub fn eth_eur() -> Self {
        Self::new(CurrencyPair::ETH_EUR)
    }
}
