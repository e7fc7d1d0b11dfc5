use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::Validate;
use crate::exchange::Operation;
use crate::mappings::TranslationTables;
use crate::pipeline::{keyed_entry, verify_keyed_symbol, RestOperation};
use crate::{
    ExchangeId, NoobitResult, SpreadItem, SpreadRequest, SpreadResponse, UtcMillis,
    ValidationError,
};

use super::validate_pair;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct KrakenSpreadRequest {
    pub pair: String,
}

impl Validate for KrakenSpreadRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        validate_pair(&self.pair)
    }
}

/// `[time, bid, ask]`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub(crate) struct KrakenSpreadEntry(i64, Decimal, Decimal);

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct KrakenSpreadResponse {
    pub entries: Vec<KrakenSpreadEntry>,
    pub last: i64,
}

pub(crate) struct KrakenSpread<'a> {
    pub tables: &'a TranslationTables,
}

impl RestOperation for KrakenSpread<'_> {
    const OPERATION: Operation = Operation::Spread;

    type Request = SpreadRequest;
    type ExchangeRequest = KrakenSpreadRequest;
    type ExchangeResponse = KrakenSpreadResponse;
    type Response = SpreadResponse;

    fn map_request(&self, request: &SpreadRequest) -> Result<KrakenSpreadRequest, ValidationError> {
        Ok(KrakenSpreadRequest {
            pair: self
                .tables
                .symbols
                .to_exchange(&request.symbol, ExchangeId::Kraken)?
                .to_owned(),
        })
    }

    fn verify_symbol(&self, request: &KrakenSpreadRequest, result: &Value) -> NoobitResult<()> {
        verify_keyed_symbol(result, &request.pair, &["last"])
    }

    fn parse_payload(
        &self,
        request: &KrakenSpreadRequest,
        result: Value,
    ) -> Result<KrakenSpreadResponse, ValidationError> {
        Ok(KrakenSpreadResponse {
            entries: keyed_entry(&result, &request.pair)?,
            last: keyed_entry(&result, "last")?,
        })
    }

    fn map_response(
        &self,
        request: &SpreadRequest,
        _exchange_request: &KrakenSpreadRequest,
        response: KrakenSpreadResponse,
    ) -> Result<SpreadResponse, ValidationError> {
        let spread = response
            .entries
            .into_iter()
            .map(|KrakenSpreadEntry(time, bid, ask)| {
                SpreadItem::new(
                    request.symbol.clone(),
                    bid,
                    ask,
                    UtcMillis::from_seconds(time)?,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SpreadResponse {
            spread,
            last: UtcMillis::from_seconds(response.last)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::mappings::SymbolMap;
    use crate::{ErrorKind, Symbol};

    fn tables() -> TranslationTables {
        TranslationTables {
            symbols: SymbolMap::from_pairs([("ETH-USD", "XETHZUSD")]).expect("valid table"),
            ..TranslationTables::default()
        }
    }

    #[test]
    fn maps_spread_history() {
        let tables = tables();
        let op = KrakenSpread { tables: &tables };
        let request = SpreadRequest::new(Symbol::parse("ETH-USD").expect("valid"));
        let mapped = op.map_request(&request).expect("must map");
        let result = json!({
            "XETHZUSD": [[1600000000, "380.10", "380.20"], [1600000005, "380.15", "380.30"]],
            "last": 1600000005
        });

        assert!(op.verify_symbol(&mapped, &result).is_ok());
        let payload = op.parse_payload(&mapped, result).expect("must parse");
        let response = op.map_response(&request, &mapped, payload).expect("must map");

        assert_eq!(response.spread.len(), 2);
        assert_eq!(response.spread[1].utc_time.as_millis(), 1_600_000_005_000);
        assert!(response.validate().is_ok());
    }

    #[test]
    fn echoed_pair_must_match() {
        let tables = tables();
        let op = KrakenSpread { tables: &tables };
        let mapped = KrakenSpreadRequest {
            pair: String::from("XETHZUSD"),
        };
        let result = json!({"XXBTZUSD": [], "last": 1600000005});

        let err = op.verify_symbol(&mapped, &result).expect_err("must fail");
        assert_eq!(err.kind(), ErrorKind::SymbolMismatch);
    }

    #[test]
    fn crossed_spread_is_rejected() {
        let tables = tables();
        let op = KrakenSpread { tables: &tables };
        let request = SpreadRequest::new(Symbol::parse("ETH-USD").expect("valid"));
        let mapped = op.map_request(&request).expect("must map");
        let payload = KrakenSpreadResponse {
            entries: vec![KrakenSpreadEntry(
                1_600_000_000,
                Decimal::new(38_030, 2),
                Decimal::new(38_020, 2),
            )],
            last: 1_600_000_000,
        };

        let err = op
            .map_response(&request, &mapped, payload)
            .expect_err("must fail");
        assert_eq!(err, ValidationError::CrossedSpread);
    }
}
