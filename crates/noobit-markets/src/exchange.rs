//! Exchange identifiers and the caller-facing interface contract.
//!
//! Every exchange adapter implements [`ExchangeInterface`]. Callers depend on
//! operation names, never on an exchange's module layout.
//!
//! # Operations
//!
//! | Operation | Visibility | Request | Response |
//! |-----------|------------|---------|----------|
//! | `ohlc` | public | [`OhlcRequest`] | [`OhlcResponse`] |
//! | `spread` | public | [`SpreadRequest`] | [`SpreadResponse`] |
//! | `orderbook` | public | [`OrderBookRequest`] | [`OrderBook`] |
//! | `symbols` | public | - | [`SymbolsResponse`] |
//! | `balances` | private | - | [`Balances`] |
//! | `exposure` | private | - | [`Exposure`] |
//! | `trades` | private | [`TradesRequest`] | [`TradesResponse`] |

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{
    Balances, ErrorEnvelope, Exposure, NoobitResult, OhlcRequest, OhlcResponse, OrderBook,
    OrderBookRequest, SpreadRequest, SpreadResponse, SymbolsResponse, TradesRequest,
    TradesResponse, ValidationError,
};

/// Supported exchanges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeId {
    Kraken,
    Binance,
    Ftx,
}

impl ExchangeId {
    pub const ALL: [Self; 3] = [Self::Kraken, Self::Binance, Self::Ftx];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Kraken => "kraken",
            Self::Binance => "binance",
            Self::Ftx => "ftx",
        }
    }

    /// Prefix of the environment variables carrying this exchange's keys.
    pub const fn env_prefix(self) -> &'static str {
        match self {
            Self::Kraken => "NOOBIT_KRAKEN",
            Self::Binance => "NOOBIT_BINANCE",
            Self::Ftx => "NOOBIT_FTX",
        }
    }
}

impl Display for ExchangeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExchangeId {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "kraken" => Ok(Self::Kraken),
            "binance" => Ok(Self::Binance),
            "ftx" => Ok(Self::Ftx),
            other => Err(ValidationError::InvalidExchange {
                value: other.to_owned(),
            }),
        }
    }
}

/// Whether an endpoint needs a signed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

/// Operation names exposed by the interface registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Ohlc,
    Spread,
    Orderbook,
    Symbols,
    Balances,
    Exposure,
    Trades,
}

impl Operation {
    pub const ALL: [Self; 7] = [
        Self::Ohlc,
        Self::Spread,
        Self::Orderbook,
        Self::Symbols,
        Self::Balances,
        Self::Exposure,
        Self::Trades,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ohlc => "ohlc",
            Self::Spread => "spread",
            Self::Orderbook => "orderbook",
            Self::Symbols => "symbols",
            Self::Balances => "balances",
            Self::Exposure => "exposure",
            Self::Trades => "trades",
        }
    }

    pub const fn visibility(self) -> Visibility {
        match self {
            Self::Ohlc | Self::Spread | Self::Orderbook | Self::Symbols => Visibility::Public,
            Self::Balances | Self::Exposure | Self::Trades => Visibility::Private,
        }
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|operation| operation.as_str() == normalized)
            .ok_or(ValidationError::InvalidOperation { value: normalized })
    }
}

/// Operations an adapter implements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilitySet {
    operations: Vec<Operation>,
}

impl CapabilitySet {
    pub fn new(operations: impl IntoIterator<Item = Operation>) -> Self {
        let mut operations: Vec<Operation> = operations.into_iter().collect();
        operations.sort();
        operations.dedup();
        Self { operations }
    }

    pub fn supports(&self, operation: Operation) -> bool {
        self.operations.contains(&operation)
    }

    pub fn supported_operations(&self) -> Vec<&'static str> {
        self.operations.iter().map(|op| op.as_str()).collect()
    }
}

pub type OperationFuture<'a, T> = Pin<Box<dyn Future<Output = NoobitResult<T>> + Send + 'a>>;

/// Exchange adapter contract.
///
/// Transport, authentication and translation tables are injected into the
/// implementing adapter; methods only take normalized parameters. Operations
/// an exchange does not offer fall back to an
/// [`UnsupportedOperation`](crate::ErrorKind::UnsupportedOperation) error.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; one adapter serves concurrent
/// callers.
pub trait ExchangeInterface: Send + Sync {
    fn id(&self) -> ExchangeId;

    fn capabilities(&self) -> CapabilitySet;

    fn ohlc<'a>(&'a self, req: OhlcRequest) -> OperationFuture<'a, OhlcResponse> {
        let _ = req;
        unsupported(self.id(), Operation::Ohlc)
    }

    fn spread<'a>(&'a self, req: SpreadRequest) -> OperationFuture<'a, SpreadResponse> {
        let _ = req;
        unsupported(self.id(), Operation::Spread)
    }

    fn orderbook<'a>(&'a self, req: OrderBookRequest) -> OperationFuture<'a, OrderBook> {
        let _ = req;
        unsupported(self.id(), Operation::Orderbook)
    }

    fn symbols<'a>(&'a self) -> OperationFuture<'a, SymbolsResponse> {
        unsupported(self.id(), Operation::Symbols)
    }

    fn balances<'a>(&'a self) -> OperationFuture<'a, Balances> {
        unsupported(self.id(), Operation::Balances)
    }

    fn exposure<'a>(&'a self) -> OperationFuture<'a, Exposure> {
        unsupported(self.id(), Operation::Exposure)
    }

    fn trades<'a>(&'a self, req: TradesRequest) -> OperationFuture<'a, TradesResponse> {
        let _ = req;
        unsupported(self.id(), Operation::Trades)
    }
}

fn unsupported<'a, T: Send + 'a>(exchange: ExchangeId, operation: Operation) -> OperationFuture<'a, T> {
    Box::pin(async move { Err(ErrorEnvelope::unsupported(exchange, operation)) })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_names_round_trip() {
        for operation in Operation::ALL {
            assert_eq!(Operation::from_str(operation.as_str()), Ok(operation));
        }
        assert!(Operation::from_str("candles").is_err());
    }

    #[test]
    fn private_operations_are_flagged() {
        assert_eq!(Operation::Balances.visibility(), Visibility::Private);
        assert_eq!(Operation::Ohlc.visibility(), Visibility::Public);
    }

    #[test]
    fn capability_set_deduplicates() {
        let caps = CapabilitySet::new([Operation::Ohlc, Operation::Balances, Operation::Ohlc]);
        assert_eq!(caps.supported_operations(), vec!["ohlc", "balances"]);
        assert!(!caps.supports(Operation::Trades));
    }
}
