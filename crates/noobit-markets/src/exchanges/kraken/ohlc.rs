use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::Validate;
use crate::exchange::Operation;
use crate::mappings::TranslationTables;
use crate::pipeline::{keyed_entry, verify_keyed_symbol, RestOperation};
use crate::{
    ExchangeId, NoobitResult, OhlcItem, OhlcRequest, OhlcResponse, UtcMillis, ValidationError,
};

use super::{interval, validate_interval, validate_pair};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct KrakenOhlcRequest {
    pub pair: String,
    pub interval: u32,
    /// Unix seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since: Option<i64>,
}

impl Validate for KrakenOhlcRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        validate_pair(&self.pair)?;
        validate_interval(self.interval)?;
        if matches!(self.since, Some(since) if since <= 0) {
            return Err(ValidationError::NonPositiveValue { field: "since" });
        }
        Ok(())
    }
}

/// `[time, open, high, low, close, vwap, volume, count]`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub(crate) struct KrakenCandle(
    i64,
    Decimal,
    Decimal,
    Decimal,
    Decimal,
    Decimal,
    Decimal,
    u64,
);

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct KrakenOhlcResponse {
    pub candles: Vec<KrakenCandle>,
    pub last: i64,
}

pub(crate) struct KrakenOhlc<'a> {
    pub tables: &'a TranslationTables,
}

impl RestOperation for KrakenOhlc<'_> {
    const OPERATION: Operation = Operation::Ohlc;

    type Request = OhlcRequest;
    type ExchangeRequest = KrakenOhlcRequest;
    type ExchangeResponse = KrakenOhlcResponse;
    type Response = OhlcResponse;

    fn map_request(&self, request: &OhlcRequest) -> Result<KrakenOhlcRequest, ValidationError> {
        Ok(KrakenOhlcRequest {
            pair: self
                .tables
                .symbols
                .to_exchange(&request.symbol, ExchangeId::Kraken)?
                .to_owned(),
            interval: interval(request.timeframe),
            since: request.since.map(UtcMillis::as_seconds),
        })
    }

    fn verify_symbol(&self, request: &KrakenOhlcRequest, result: &Value) -> NoobitResult<()> {
        verify_keyed_symbol(result, &request.pair, &["last"])
    }

    fn parse_payload(
        &self,
        request: &KrakenOhlcRequest,
        result: Value,
    ) -> Result<KrakenOhlcResponse, ValidationError> {
        Ok(KrakenOhlcResponse {
            candles: keyed_entry(&result, &request.pair)?,
            last: keyed_entry(&result, "last")?,
        })
    }

    fn map_response(
        &self,
        request: &OhlcRequest,
        _exchange_request: &KrakenOhlcRequest,
        response: KrakenOhlcResponse,
    ) -> Result<OhlcResponse, ValidationError> {
        let ohlc = response
            .candles
            .into_iter()
            .map(|KrakenCandle(time, open, high, low, close, _vwap, volume, count)| {
                OhlcItem::new(
                    request.symbol.clone(),
                    UtcMillis::from_seconds(time)?,
                    open,
                    high,
                    low,
                    close,
                    volume,
                    Some(count),
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(OhlcResponse {
            ohlc,
            last: UtcMillis::from_seconds(response.last)?,
        })
    }
}
