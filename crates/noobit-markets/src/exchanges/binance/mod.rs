//! Binance spot REST adapter.
//!
//! Successful responses are bare JSON; failures carry
//! `{"code": -1121, "msg": "Invalid symbol."}`, usually with a non-2xx status.

mod balances;
mod ohlc;

use std::sync::Arc;

use serde_json::Value;

use crate::classification::ErrorClassifier;
use crate::exchange::{CapabilitySet, ExchangeInterface, Operation, OperationFuture};
use crate::http_client::HttpClient;
use crate::mappings::TranslationTables;
use crate::pipeline::{ExchangeContext, WireFormat};
use crate::{
    Balances, ConfigError, ErrorPayload, ExchangeId, OhlcRequest, OhlcResponse, Timeframe,
    ValidationError,
};

use self::balances::BinanceBalances;
use self::ohlc::BinanceOhlc;

/// Kline interval for a timeframe, `None` when Binance has no equivalent.
pub(crate) fn interval(timeframe: Timeframe) -> Option<&'static str> {
    match timeframe {
        Timeframe::OneMinute => Some("1m"),
        Timeframe::FiveMinutes => Some("5m"),
        Timeframe::FifteenMinutes => Some("15m"),
        Timeframe::ThirtyMinutes => Some("30m"),
        Timeframe::OneHour => Some("1h"),
        Timeframe::FourHours => Some("4h"),
        Timeframe::OneDay => Some("1d"),
        Timeframe::OneWeek => Some("1w"),
        Timeframe::FifteenDays => None,
    }
}

pub(crate) const INTERVALS: [&str; 8] = ["1m", "5m", "15m", "30m", "1h", "4h", "1d", "1w"];

/// Bare JSON, or `{"code": ..., "msg": ...}` on failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinanceWire;

impl WireFormat for BinanceWire {
    fn decode_errors(&self, body: &Value, classifier: &ErrorClassifier) -> ErrorPayload {
        let Some(code) = body.get("code") else {
            return ErrorPayload::None;
        };
        let code = match code {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        let message = body.get("msg").and_then(Value::as_str).unwrap_or_default();
        ErrorPayload::Single(classifier.classify(&code, message))
    }

    fn extract_result(&self, body: Value) -> Result<Value, ValidationError> {
        Ok(body)
    }
}

/// Binance implementation of [`ExchangeInterface`]: `ohlc` and `balances`.
pub struct BinanceAdapter {
    ctx: ExchangeContext,
    tables: Arc<TranslationTables>,
}

impl BinanceAdapter {
    pub fn new(http: Arc<dyn HttpClient>, tables: TranslationTables) -> Result<Self, ConfigError> {
        Ok(Self::from_context(
            ExchangeContext::new(ExchangeId::Binance, http)?,
            tables,
        ))
    }

    pub fn from_context(ctx: ExchangeContext, tables: TranslationTables) -> Self {
        Self {
            ctx,
            tables: Arc::new(tables),
        }
    }

    pub fn context(&self) -> &ExchangeContext {
        &self.ctx
    }
}

impl ExchangeInterface for BinanceAdapter {
    fn id(&self) -> ExchangeId {
        ExchangeId::Binance
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::new([Operation::Ohlc, Operation::Balances])
    }

    fn ohlc<'a>(&'a self, req: OhlcRequest) -> OperationFuture<'a, OhlcResponse> {
        Box::pin(async move {
            let op = BinanceOhlc {
                tables: &self.tables,
            };
            self.ctx.run(&op, &req).await
        })
    }

    fn balances<'a>(&'a self) -> OperationFuture<'a, Balances> {
        Box::pin(async move {
            let op = BinanceBalances {
                tables: &self.tables,
            };
            self.ctx.run(&op, &()).await
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;

    #[test]
    fn error_object_is_a_single_classified_error() {
        let classifier = ErrorClassifier::defaults(ExchangeId::Binance);
        let body = json!({"code": -1003, "msg": "Too many requests."});

        let ErrorPayload::Single(error) = BinanceWire.decode_errors(&body, &classifier) else {
            panic!("expected a single error");
        };
        assert_eq!(error.code, "-1003");
        assert_eq!(error.message, "Too many requests.");
        assert_eq!(error.sleep, Some(Duration::from_secs(10)));
    }

    #[test]
    fn kline_arrays_carry_no_error() {
        let classifier = ErrorClassifier::defaults(ExchangeId::Binance);
        assert!(BinanceWire
            .decode_errors(&json!([[1, "2"]]), &classifier)
            .is_empty());
    }

    #[test]
    fn fifteen_day_candles_are_unsupported() {
        assert_eq!(interval(Timeframe::FifteenDays), None);
        for timeframe in Timeframe::ALL {
            if let Some(value) = interval(timeframe) {
                assert!(INTERVALS.contains(&value));
            }
        }
    }
}
