// ============================================================================
// Price Domain Model
// Currencies, book sides and side-tagged prices
// ============================================================================

use crate::error::OrderBookError;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

// ============================================================================
// Currency
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Currency {
    Btc,
    Eth,
    Usd,
    Eur,
}

impl Currency {
    pub const fn code(self) -> &'static str {
        match self {
            Currency::Btc => "BTC",
            Currency::Eth => "ETH",
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = OrderBookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BTC" => Ok(Currency::Btc),
            "ETH" => Ok(Currency::Eth),
            "USD" => Ok(Currency::Usd),
            "EUR" => Ok(Currency::Eur),
            _ => Err(OrderBookError::UnknownCurrency(s.to_string())),
        }
    }
}

// ============================================================================
// Currency Pair
// ============================================================================

/// Traded instrument: `primary` is bought and sold, `secondary` prices it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CurrencyPair {
    primary: Currency,
    secondary: Currency,
}

impl CurrencyPair {
    pub const BTC_USD: Self = Self::unchecked(Currency::Btc, Currency::Usd);
    pub const BTC_EUR: Self = Self::unchecked(Currency::Btc, Currency::Eur);
    pub const ETH_USD: Self = Self::unchecked(Currency::Eth, Currency::Usd);
    pub const ETH_EUR: Self = Self::unchecked(Currency::Eth, Currency::Eur);

    /// Create a pair; both legs must differ.
    pub fn new(primary: Currency, secondary: Currency) -> Result<Self, OrderBookError> {
        if primary == secondary {
            return Err(OrderBookError::InvalidConfig(format!(
                "currency pair needs two distinct currencies, got {primary}/{secondary}"
            )));
        }
        Ok(Self::unchecked(primary, secondary))
    }

    const fn unchecked(primary: Currency, secondary: Currency) -> Self {
        Self { primary, secondary }
    }

    pub const fn primary(&self) -> Currency {
        self.primary
    }

    pub const fn secondary(&self) -> Currency {
        self.secondary
    }
}

impl Default for CurrencyPair {
    fn default() -> Self {
        Self::BTC_USD
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.primary, self.secondary)
    }
}

impl FromStr for CurrencyPair {
    type Err = OrderBookError;

    /// Parses `"BTC/USD"` or `"BTC-USD"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (primary, secondary) = s
            .split_once(['/', '-'])
            .ok_or_else(|| OrderBookError::InvalidConfig(format!("malformed currency pair: {s}")))?;
        Self::new(primary.parse()?, secondary.parse()?)
    }
}

// ============================================================================
// Side
// ============================================================================

/// Book side. `Ask` is the sell side, `Bid` the buy side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Side {
    Ask,
    Bid,
}

impl Side {
    #[inline]
    pub const fn opposite(self) -> Self {
        match self {
            Side::Ask => Side::Bid,
            Side::Bid => Side::Ask,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Ask => f.write_str("ASK"),
            Side::Bid => f.write_str("BID"),
        }
    }
}

// ============================================================================
// Specific Price
// ============================================================================

/// A strictly positive price on one side of one currency pair.
///
/// Prices of the same pair order by value. Prices of different pairs are not
/// comparable: `partial_cmp` yields `None` and [`SpecificPrice::try_cmp`]
/// reports `CrossBookCurrencyMismatch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpecificPrice {
    value: u64,
    side: Side,
    pair: CurrencyPair,
}

impl SpecificPrice {
    pub fn new(value: u64, side: Side, pair: CurrencyPair) -> Result<Self, OrderBookError> {
        if value == 0 {
            return Err(OrderBookError::InvalidPrice {
                price: value,
                reason: "price must be greater than zero",
            });
        }
        Ok(Self { value, side, pair })
    }

    #[inline]
    pub const fn value(&self) -> u64 {
        self.value
    }

    #[inline]
    pub const fn side(&self) -> Side {
        self.side
    }

    #[inline]
    pub const fn pair(&self) -> CurrencyPair {
        self.pair
    }

    /// Compare by value, failing when the pairs differ.
    pub fn try_cmp(&self, other: &Self) -> Result<Ordering, OrderBookError> {
        if self.pair != other.pair {
            return Err(OrderBookError::CrossBookCurrencyMismatch {
                expected: self.pair,
                actual: other.pair,
            });
        }
        Ok(self.value.cmp(&other.value))
    }
}

impl PartialOrd for SpecificPrice {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.pair != other.pair {
            return None;
        }
        // Side only breaks ties so that equality agrees with `Eq`.
        Some(
            self.value
                .cmp(&other.value)
                .then_with(|| self.side.cmp(&other.side)),
        )
    }
}

impl fmt::Display for SpecificPrice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.side, self.value, self.pair.secondary)
    }
}
