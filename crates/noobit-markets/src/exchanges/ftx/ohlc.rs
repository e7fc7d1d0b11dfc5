use std::borrow::Cow;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::Validate;
use crate::exchange::Operation;
use crate::mappings::TranslationTables;
use crate::pipeline::{from_payload, RestOperation};
use crate::{
    ExchangeId, OhlcItem, OhlcRequest, OhlcResponse, UtcMillis, ValidationError,
};

use super::{resolution, valid_resolution};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct FtxCandlesRequest {
    /// Goes into the path, never the query.
    #[serde(skip)]
    pub market: String,
    /// Seconds.
    pub resolution: u64,
    /// Unix seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<i64>,
}

impl Validate for FtxCandlesRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.market.is_empty() || self.market.chars().any(char::is_whitespace) {
            return Err(ValidationError::InvalidField {
                field: "market",
                value: self.market.clone(),
            });
        }
        if !valid_resolution(self.resolution) {
            return Err(ValidationError::InvalidField {
                field: "resolution",
                value: self.resolution.to_string(),
            });
        }
        if matches!(self.start_time, Some(start) if start <= 0) {
            return Err(ValidationError::NonPositiveValue { field: "start_time" });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub(crate) struct FtxCandle {
    /// Milliseconds, sent as a float.
    pub time: f64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

pub(crate) struct FtxOhlc<'a> {
    pub tables: &'a TranslationTables,
}

impl RestOperation for FtxOhlc<'_> {
    const OPERATION: Operation = Operation::Ohlc;

    type Request = OhlcRequest;
    type ExchangeRequest = FtxCandlesRequest;
    type ExchangeResponse = Vec<FtxCandle>;
    type Response = OhlcResponse;

    fn map_request(&self, request: &OhlcRequest) -> Result<FtxCandlesRequest, ValidationError> {
        let resolution =
            resolution(request.timeframe).ok_or_else(|| ValidationError::UnsupportedTimeframe {
                timeframe: request.timeframe.to_string(),
                exchange: ExchangeId::Ftx,
            })?;

        Ok(FtxCandlesRequest {
            market: self
                .tables
                .symbols
                .to_exchange(&request.symbol, ExchangeId::Ftx)?
                .to_owned(),
            resolution,
            start_time: request.since.map(UtcMillis::as_seconds),
        })
    }

    fn path<'t>(&self, template: &'t str, request: &FtxCandlesRequest) -> Cow<'t, str> {
        Cow::Owned(template.replace("{market}", &request.market))
    }

    fn parse_payload(
        &self,
        _request: &FtxCandlesRequest,
        result: Value,
    ) -> Result<Vec<FtxCandle>, ValidationError> {
        from_payload(result)
    }

    fn map_response(
        &self,
        request: &OhlcRequest,
        _exchange_request: &FtxCandlesRequest,
        response: Vec<FtxCandle>,
    ) -> Result<OhlcResponse, ValidationError> {
        let ohlc = response
            .into_iter()
            .map(|candle| {
                OhlcItem::new(
                    request.symbol.clone(),
                    UtcMillis::from_millis(candle.time.round() as i64)?,
                    candle.open,
                    candle.high,
                    candle.low,
                    candle.close,
                    candle.volume,
                    None,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        let last = ohlc.last().map_or_else(UtcMillis::now, |item| item.utc_time);
        Ok(OhlcResponse { ohlc, last })
    }
}
