use rust_decimal::Decimal;
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::Validate;
use crate::exchange::Operation;
use crate::mappings::TranslationTables;
use crate::pipeline::{from_payload, RestOperation};
use crate::{
    ExchangeId, OhlcItem, OhlcRequest, OhlcResponse, UtcMillis, ValidationError,
};

use super::{interval, INTERVALS};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BinanceKlinesRequest {
    pub symbol: String,
    pub interval: &'static str,
    /// Unix milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<i64>,
}

impl Validate for BinanceKlinesRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.symbol.is_empty()
            || !self
                .symbol
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        {
            return Err(ValidationError::InvalidField {
                field: "symbol",
                value: self.symbol.clone(),
            });
        }
        if !INTERVALS.contains(&self.interval) {
            return Err(ValidationError::InvalidField {
                field: "interval",
                value: self.interval.to_owned(),
            });
        }
        if matches!(self.start_time, Some(start) if start <= 0) {
            return Err(ValidationError::NonPositiveValue { field: "startTime" });
        }
        Ok(())
    }
}

/// `[openTime, open, high, low, close, volume, closeTime, quoteVolume,
/// trades, takerBase, takerQuote, ignore]`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub(crate) struct BinanceKline(
    i64,
    Decimal,
    Decimal,
    Decimal,
    Decimal,
    Decimal,
    i64,
    Decimal,
    u64,
    Decimal,
    Decimal,
    IgnoredAny,
);

pub(crate) struct BinanceOhlc<'a> {
    pub tables: &'a TranslationTables,
}

impl RestOperation for BinanceOhlc<'_> {
    const OPERATION: Operation = Operation::Ohlc;

    type Request = OhlcRequest;
    type ExchangeRequest = BinanceKlinesRequest;
    type ExchangeResponse = Vec<BinanceKline>;
    type Response = OhlcResponse;

    fn map_request(&self, request: &OhlcRequest) -> Result<BinanceKlinesRequest, ValidationError> {
        let interval =
            interval(request.timeframe).ok_or_else(|| ValidationError::UnsupportedTimeframe {
                timeframe: request.timeframe.to_string(),
                exchange: ExchangeId::Binance,
            })?;

        Ok(BinanceKlinesRequest {
            symbol: self
                .tables
                .symbols
                .to_exchange(&request.symbol, ExchangeId::Binance)?
                .to_owned(),
            interval,
            start_time: request.since.map(UtcMillis::as_millis),
        })
    }

    fn parse_payload(
        &self,
        _request: &BinanceKlinesRequest,
        result: Value,
    ) -> Result<Vec<BinanceKline>, ValidationError> {
        from_payload(result)
    }

    fn map_response(
        &self,
        request: &OhlcRequest,
        _exchange_request: &BinanceKlinesRequest,
        response: Vec<BinanceKline>,
    ) -> Result<OhlcResponse, ValidationError> {
        let ohlc = response
            .into_iter()
            .map(
                |BinanceKline(open_time, open, high, low, close, volume, _, _, trades, _, _, _)| {
                    OhlcItem::new(
                        request.symbol.clone(),
                        UtcMillis::from_millis(open_time)?,
                        open,
                        high,
                        low,
                        close,
                        volume,
                        Some(trades),
                    )
                },
            )
            .collect::<Result<Vec<_>, _>>()?;

        let last = ohlc.last().map_or_else(UtcMillis::now, |item| item.utc_time);
        Ok(OhlcResponse { ohlc, last })
    }
}
