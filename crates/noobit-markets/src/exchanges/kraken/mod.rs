//! Kraken REST adapter.
//!
//! Responses share the `{"error": [...], "result": {...}}` envelope. Market
//! data is keyed by Kraken's own pair name (`XXBTZUSD`), so public operations
//! need a [`TranslationTables`] value, usually obtained from
//! [`KrakenAdapter::refresh_tables`].

mod balances;
mod exposure;
mod ohlc;
mod orderbook;
mod spread;
mod symbols;
mod trades;

use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use crate::classification::ErrorClassifier;
use crate::exchange::{CapabilitySet, ExchangeInterface, Operation, OperationFuture};
use crate::http_client::HttpClient;
use crate::mappings::TranslationTables;
use crate::pipeline::{ExchangeContext, WireFormat};
use crate::{
    Balances, ConfigError, ErrorPayload, ExchangeId, Exposure, NoobitResult, OhlcRequest,
    OhlcResponse, OrderBook, OrderBookRequest, SpreadRequest, SpreadResponse, SymbolsResponse,
    Timeframe, TradesRequest, TradesResponse, ValidationError,
};

use self::balances::KrakenBalances;
use self::exposure::KrakenExposure;
use self::ohlc::KrakenOhlc;
use self::orderbook::KrakenOrderBook;
use self::spread::KrakenSpread;
use self::symbols::KrakenSymbols;
use self::trades::KrakenTrades;

/// Intervals (minutes) accepted by the OHLC endpoint.
const INTERVALS: [u32; 9] = [1, 5, 15, 30, 60, 240, 1440, 10080, 21600];

/// Kraken expresses every supported timeframe in minutes.
pub(crate) fn interval(timeframe: Timeframe) -> u32 {
    timeframe.minutes()
}

pub(crate) fn validate_interval(interval: u32) -> Result<(), ValidationError> {
    if INTERVALS.contains(&interval) {
        Ok(())
    } else {
        Err(ValidationError::InvalidField {
            field: "interval",
            value: interval.to_string(),
        })
    }
}

pub(crate) fn validate_pair(pair: &str) -> Result<(), ValidationError> {
    if pair.is_empty() || !pair.chars().all(|c| c.is_ascii_alphanumeric() || c == '.') {
        return Err(ValidationError::InvalidField {
            field: "pair",
            value: pair.to_owned(),
        });
    }
    Ok(())
}

/// `{"error": [...], "result": {...}}`
#[derive(Debug, Clone, Copy, Default)]
pub struct KrakenWire;

impl WireFormat for KrakenWire {
    fn decode_errors(&self, body: &Value, classifier: &ErrorClassifier) -> ErrorPayload {
        let classify = |item: &Value| {
            let code = item
                .as_str()
                .map(str::to_owned)
                .unwrap_or_else(|| item.to_string());
            classifier.classify(&code, "")
        };

        match body.get("error") {
            Some(Value::Array(items)) if !items.is_empty() => {
                ErrorPayload::List(items.iter().map(classify).collect())
            }
            Some(item @ Value::String(text)) if !text.is_empty() => {
                ErrorPayload::List(vec![classify(item)])
            }
            _ => ErrorPayload::None,
        }
    }

    fn extract_result(&self, mut body: Value) -> Result<Value, ValidationError> {
        body.get_mut("result")
            .map(Value::take)
            .ok_or_else(|| ValidationError::MissingKey {
                key: String::from("result"),
            })
    }
}

/// Kraken implementation of [`ExchangeInterface`].
pub struct KrakenAdapter {
    ctx: ExchangeContext,
    tables: RwLock<Arc<TranslationTables>>,
}

impl KrakenAdapter {
    pub fn new(http: Arc<dyn HttpClient>) -> Result<Self, ConfigError> {
        Ok(Self::from_context(
            ExchangeContext::new(ExchangeId::Kraken, http)?,
            TranslationTables::default(),
        ))
    }

    pub fn from_context(ctx: ExchangeContext, tables: TranslationTables) -> Self {
        Self {
            ctx,
            tables: RwLock::new(Arc::new(tables)),
        }
    }

    pub fn context(&self) -> &ExchangeContext {
        &self.ctx
    }

    pub fn tables(&self) -> Arc<TranslationTables> {
        Arc::clone(&self.tables.read())
    }

    pub fn set_tables(&self, tables: TranslationTables) {
        *self.tables.write() = Arc::new(tables);
    }

    /// Load tradable pairs and swap in the translation tables they describe.
    pub async fn refresh_tables(&self) -> NoobitResult<Arc<TranslationTables>> {
        let symbols = self.ctx.run(&KrakenSymbols, &()).await?;
        let tables = Arc::new(symbols.translation_tables()?);
        *self.tables.write() = Arc::clone(&tables);
        tracing::info!(
            exchange = %ExchangeId::Kraken,
            pairs = tables.symbols.len(),
            assets = tables.assets.len(),
            "translation tables refreshed"
        );
        Ok(tables)
    }
}

impl ExchangeInterface for KrakenAdapter {
    fn id(&self) -> ExchangeId {
        ExchangeId::Kraken
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::new(Operation::ALL)
    }

    fn ohlc<'a>(&'a self, req: OhlcRequest) -> OperationFuture<'a, OhlcResponse> {
        Box::pin(async move {
            let tables = self.tables();
            self.ctx.run(&KrakenOhlc { tables: &tables }, &req).await
        })
    }

    fn spread<'a>(&'a self, req: SpreadRequest) -> OperationFuture<'a, SpreadResponse> {
        Box::pin(async move {
            let tables = self.tables();
            self.ctx.run(&KrakenSpread { tables: &tables }, &req).await
        })
    }

    fn orderbook<'a>(&'a self, req: OrderBookRequest) -> OperationFuture<'a, OrderBook> {
        Box::pin(async move {
            let tables = self.tables();
            self.ctx.run(&KrakenOrderBook { tables: &tables }, &req).await
        })
    }

    fn symbols<'a>(&'a self) -> OperationFuture<'a, SymbolsResponse> {
        Box::pin(async move { self.ctx.run(&KrakenSymbols, &()).await })
    }

    fn balances<'a>(&'a self) -> OperationFuture<'a, Balances> {
        Box::pin(async move {
            let tables = self.tables();
            self.ctx.run(&KrakenBalances { tables: &tables }, &()).await
        })
    }

    fn exposure<'a>(&'a self) -> OperationFuture<'a, Exposure> {
        Box::pin(async move { self.ctx.run(&KrakenExposure, &()).await })
    }

    fn trades<'a>(&'a self, req: TradesRequest) -> OperationFuture<'a, TradesResponse> {
        Box::pin(async move {
            let tables = self.tables();
            self.ctx.run(&KrakenTrades { tables: &tables }, &req).await
        })
    }
}
