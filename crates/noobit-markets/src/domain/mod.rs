//! # Domain Models
//!
//! The normalized ("Noobit") schema shared by every exchange adapter.
//!
//! ## Overview
//!
//! Field names follow FIX conventions (`utcTime`, `trdCount`, `avgPx`) and
//! serialize in camelCase. All records are validated:
//!
//! - **Leaf values** validate on construction (`Symbol::parse`,
//!   `UtcMillis::from_millis`, `OhlcItem::new`)
//! - **Aggregates** implement [`Validate`], the last gate of every pipeline
//!   run before a response reaches the caller
//!
//! ## Models
//!
//! | Type | Description |
//! |------|-------------|
//! | [`OhlcResponse`] | Candles plus the exchange cursor |
//! | [`SpreadResponse`] | Best bid/ask history |
//! | [`OrderBook`] | Depth snapshot |
//! | [`SymbolsResponse`] | Tradable pairs and asset codes |
//! | [`Balances`] | Per-asset holdings |
//! | [`Exposure`] | Margin and valuation summary |
//! | [`TradesResponse`] | The caller's own fills |

mod models;
mod requests;
mod symbol;
mod timeframe;
mod timestamp;

pub use models::{
    Balances, BookLevel, Exposure, OhlcItem, OhlcResponse, OrdType, OrderBook, Side, SpreadItem,
    SpreadResponse, SymbolInfo, SymbolsResponse, TradeItem, TradesResponse,
};
pub use requests::{OhlcRequest, OrderBookRequest, SpreadRequest, TradesRequest};
pub use symbol::{Asset, Symbol};
pub use timeframe::Timeframe;
pub use timestamp::UtcMillis;

use crate::ValidationError;

/// Schema check applied at a pipeline boundary.
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

/// Operations without parameters.
impl Validate for () {
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}
