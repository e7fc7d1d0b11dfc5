use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::Validate;
use crate::exchange::Operation;
use crate::mappings::TranslationTables;
use crate::pipeline::{keyed_entry, verify_keyed_symbol, RestOperation};
use crate::{
    BookLevel, ExchangeId, NoobitResult, OrderBook, OrderBookRequest, UtcMillis, ValidationError,
};

use super::validate_pair;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct KrakenDepthRequest {
    pub pair: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
}

impl Validate for KrakenDepthRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        validate_pair(&self.pair)?;
        if self.count == Some(0) {
            return Err(ValidationError::NonPositiveValue { field: "count" });
        }
        Ok(())
    }
}

/// `[price, volume, time]`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub(crate) struct KrakenLevel(Decimal, Decimal, f64);

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub(crate) struct KrakenDepth {
    pub asks: Vec<KrakenLevel>,
    pub bids: Vec<KrakenLevel>,
}

pub(crate) struct KrakenOrderBook<'a> {
    pub tables: &'a TranslationTables,
}

impl RestOperation for KrakenOrderBook<'_> {
    const OPERATION: Operation = Operation::Orderbook;

    type Request = OrderBookRequest;
    type ExchangeRequest = KrakenDepthRequest;
    type ExchangeResponse = KrakenDepth;
    type Response = OrderBook;

    fn map_request(&self, request: &OrderBookRequest) -> Result<KrakenDepthRequest, ValidationError> {
        Ok(KrakenDepthRequest {
            pair: self
                .tables
                .symbols
                .to_exchange(&request.symbol, ExchangeId::Kraken)?
                .to_owned(),
            count: request.depth,
        })
    }

    fn verify_symbol(&self, request: &KrakenDepthRequest, result: &Value) -> NoobitResult<()> {
        verify_keyed_symbol(result, &request.pair, &[])
    }

    fn parse_payload(
        &self,
        request: &KrakenDepthRequest,
        result: Value,
    ) -> Result<KrakenDepth, ValidationError> {
        keyed_entry(&result, &request.pair)
    }

    fn map_response(
        &self,
        request: &OrderBookRequest,
        _exchange_request: &KrakenDepthRequest,
        response: KrakenDepth,
    ) -> Result<OrderBook, ValidationError> {
        let newest = response
            .asks
            .iter()
            .chain(response.bids.iter())
            .map(|KrakenLevel(_, _, time)| *time)
            .fold(None, |acc: Option<f64>, time| Some(acc.map_or(time, |a| a.max(time))));

        let utc_time = match newest {
            Some(time) => UtcMillis::from_fractional_seconds(time)?,
            None => UtcMillis::now(),
        };

        Ok(OrderBook {
            utc_time,
            symbol: request.symbol.clone(),
            asks: levels(response.asks)?,
            bids: levels(response.bids)?,
        })
    }
}

fn levels(raw: Vec<KrakenLevel>) -> Result<Vec<BookLevel>, ValidationError> {
    raw.into_iter()
        .map(|KrakenLevel(price, volume, _)| BookLevel::new(price, volume))
        .collect()
}
