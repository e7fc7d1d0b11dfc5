//! # Noobit Markets
//!
//! Normalized REST access to Kraken, Binance and FTX.
//!
//! ## Overview
//!
//! Every exchange response is translated into one schema (the "Noobit"
//! models) and every failure into one [`ErrorEnvelope`]:
//!
//! - **Normalized models** for candles, spreads, order books, balances,
//!   margin exposure and trade history
//! - **Adapter pipeline** that validates, maps, dispatches, checks and maps
//!   back one request in sequential stages
//! - **Retry combinator** driven by per-exchange error classification
//! - **Request signing** with rotating credentials and monotonic nonces
//! - **Registry** of exchange adapters built from a TOML settings file
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`auth`] | Credentials, nonces and request signing |
//! | [`classification`] | Exchange error code to retry semantics |
//! | [`config`] | Settings file and logging setup |
//! | [`domain`] | Normalized models and requests |
//! | [`endpoints`] | Per-exchange route tables |
//! | [`error`] | Validation, configuration and pipeline errors |
//! | [`exchange`] | Exchange identifiers and the adapter trait |
//! | [`exchanges`] | Kraken, Binance and FTX adapters |
//! | [`http_client`] | HTTP transport abstraction |
//! | [`mappings`] | Symbol and asset translation tables |
//! | [`pipeline`] | Staged request execution |
//! | [`registry`] | Adapters by exchange |
//! | [`retry`] | Retry and deadline combinators |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use noobit_markets::{ExchangeInterface, OhlcRequest, ReqwestHttpClient, KrakenAdapter};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let kraken = KrakenAdapter::new(Arc::new(ReqwestHttpClient::new()))?;
//!     kraken.refresh_tables().await?;
//!
//!     let candles = kraken.ohlc(OhlcRequest::parse("XBT/USD", "1m")?).await?;
//!     println!("{} candles, next since {}", candles.ohlc.len(), candles.last);
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! ```rust
//! use noobit_markets::{ErrorEnvelope, ErrorKind};
//!
//! fn handle_error(error: ErrorEnvelope) {
//!     match error.kind() {
//!         ErrorKind::Exchange if error.retryable() => {
//!             // Retry budget exhausted on a transient error
//!         }
//!         ErrorKind::SymbolMismatch => {
//!             // Exchange answered for another instrument
//!         }
//!         ErrorKind::Validation => {
//!             // Local schema violation, request or response
//!         }
//!         _ => {}
//!     }
//! }
//! ```

pub mod auth;
pub mod classification;
pub mod config;
pub mod domain;
pub mod endpoints;
pub mod error;
pub mod exchange;
pub mod exchanges;
pub mod http_client;
pub mod mappings;
pub mod pipeline;
pub mod registry;
pub mod retry;

// Domain models and requests
pub use domain::{
    Asset, Balances, BookLevel, Exposure, OhlcItem, OhlcRequest, OhlcResponse, OrdType,
    OrderBook, OrderBookRequest, Side, SpreadItem, SpreadRequest, SpreadResponse, Symbol,
    SymbolInfo, SymbolsResponse, Timeframe, TradeItem, TradesRequest, TradesResponse, UtcMillis,
    Validate,
};

// Errors
pub use error::{
    ConfigError, ErrorEnvelope, ErrorKind, ErrorPayload, ExchangeError, NoobitResult,
    ValidationError,
};

// Exchange contract and adapters
pub use exchange::{CapabilitySet, ExchangeId, ExchangeInterface, Operation, Visibility};
pub use exchanges::{BinanceAdapter, FtxAdapter, KrakenAdapter};

// Transport, auth and configuration
pub use auth::{Credential, ExchangeAuth, NonceGenerator};
pub use classification::{ErrorClassifier, ErrorRule};
pub use config::{LoggingConfig, Settings};
pub use endpoints::EndpointTable;
pub use http_client::{
    HttpClient, HttpError, HttpRequest, HttpResponse, ReqwestHttpClient, ScriptedHttpClient,
};
pub use mappings::{AssetMap, SymbolMap, TranslationTables};
pub use pipeline::ExchangeContext;
pub use registry::{ExchangeRegistry, OperationRequest};
pub use retry::{with_deadline, Backoff, Retry, RetryConfig};
