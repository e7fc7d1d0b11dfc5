use std::str::FromStr;

use crate::domain::Validate;
use crate::{Symbol, Timeframe, UtcMillis, ValidationError};

const MAX_BOOK_DEPTH: u32 = 500;

/// Normalized OHLC request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OhlcRequest {
    pub symbol: Symbol,
    pub timeframe: Timeframe,
    pub since: Option<UtcMillis>,
}

impl OhlcRequest {
    pub fn new(symbol: Symbol, timeframe: Timeframe) -> Self {
        Self {
            symbol,
            timeframe,
            since: None,
        }
    }

    /// Validate raw caller input, e.g. `("XBT/USD", "1m")`.
    pub fn parse(symbol: &str, timeframe: &str) -> Result<Self, ValidationError> {
        Ok(Self::new(
            Symbol::parse(symbol)?,
            Timeframe::from_str(timeframe)?,
        ))
    }

    pub fn with_since(mut self, since: UtcMillis) -> Self {
        self.since = Some(since);
        self
    }
}

// Symbol, timeframe and timestamp are checked when parsed.
impl Validate for OhlcRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

/// Normalized spread (top of book history) request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpreadRequest {
    pub symbol: Symbol,
}

impl SpreadRequest {
    pub fn new(symbol: Symbol) -> Self {
        Self { symbol }
    }
}

impl Validate for SpreadRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

/// Normalized order book request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBookRequest {
    pub symbol: Symbol,
    pub depth: Option<u32>,
}

impl OrderBookRequest {
    pub fn new(symbol: Symbol, depth: Option<u32>) -> Result<Self, ValidationError> {
        let request = Self { symbol, depth };
        request.validate()?;
        Ok(request)
    }
}

impl Validate for OrderBookRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        match self.depth {
            Some(depth) if depth == 0 || depth > MAX_BOOK_DEPTH => {
                Err(ValidationError::OutOfRange {
                    field: "depth",
                    value: i64::from(depth),
                    min: 1,
                    max: i64::from(MAX_BOOK_DEPTH),
                })
            }
            _ => Ok(()),
        }
    }
}

/// Normalized request for the caller's own trade history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TradesRequest {
    /// Only keep trades on this symbol when set.
    pub symbol: Option<Symbol>,
}

impl TradesRequest {
    pub fn all() -> Self {
        Self { symbol: None }
    }

    pub fn for_symbol(symbol: Symbol) -> Self {
        Self {
            symbol: Some(symbol),
        }
    }
}

impl Validate for TradesRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}
