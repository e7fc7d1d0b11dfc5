//! FTX REST adapter.
//!
//! Every body is `{"success": bool, "result": ..., "error": "..."}`.

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

use self::balances::FtxBalances;
use self::ohlc::FtxOhlc;

const MAX_RESOLUTION_DAYS: u64 = 30;

/// Candle resolution in seconds, `None` when FTX has no equivalent.
pub(crate) fn resolution(timeframe: Timeframe) -> Option<u64> {
    let seconds = timeframe.seconds();
    valid_resolution(seconds).then_some(seconds)
}

/// 15s, 1m, 5m, 15m, 1h, 4h, or a multiple of one day up to 30 days.
pub(crate) fn valid_resolution(seconds: u64) -> bool {
    const DAY: u64 = 86_400;
    matches!(seconds, 15 | 60 | 300 | 900 | 3_600 | 14_400)
        || (seconds % DAY == 0 && (1..=MAX_RESOLUTION_DAYS).contains(&(seconds / DAY)))
}

/// `{"success": bool, "result": ..., "error": "..."}`
#[derive(Debug, Clone, Copy, Default)]
pub struct FtxWire;

impl WireFormat for FtxWire {
    fn decode_errors(&self, body: &Value, classifier: &ErrorClassifier) -> ErrorPayload {
        let failed = body.get("success").and_then(Value::as_bool) == Some(false);
        let message = body.get("error").and_then(Value::as_str);
        match (failed, message) {
            (_, Some(message)) if !message.is_empty() => {
                ErrorPayload::Single(classifier.classify(message, ""))
            }
            (true, _) => ErrorPayload::Single(classifier.classify("unknown error", "")),
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

/// FTX implementation of [`ExchangeInterface`]: `ohlc` and `balances`.
pub struct FtxAdapter {
    ctx: ExchangeContext,
    tables: Arc<TranslationTables>,
}

impl FtxAdapter {
    pub fn new(http: Arc<dyn HttpClient>, tables: TranslationTables) -> Result<Self, ConfigError> {
        Ok(Self::from_context(
            ExchangeContext::new(ExchangeId::Ftx, http)?,
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

impl ExchangeInterface for FtxAdapter {
    fn id(&self) -> ExchangeId {
        ExchangeId::Ftx
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::new([Operation::Ohlc, Operation::Balances])
    }

    fn ohlc<'a>(&'a self, req: OhlcRequest) -> OperationFuture<'a, OhlcResponse> {
        Box::pin(async move {
            let op = FtxOhlc {
                tables: &self.tables,
            };
            self.ctx.run(&op, &req).await
        })
    }

    fn balances<'a>(&'a self) -> OperationFuture<'a, Balances> {
        Box::pin(async move {
            let op = FtxBalances {
                tables: &self.tables,
            };
            self.ctx.run(&op, &()).await
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn resolutions_follow_ftx_rules() {
        assert_eq!(resolution(Timeframe::OneMinute), Some(60));
        assert_eq!(resolution(Timeframe::FourHours), Some(14_400));
        assert_eq!(resolution(Timeframe::OneWeek), Some(604_800));
        assert_eq!(resolution(Timeframe::FifteenDays), Some(1_296_000));
        assert_eq!(resolution(Timeframe::ThirtyMinutes), None);
    }

    #[test]
    fn failed_body_becomes_single_error() {
        let classifier = ErrorClassifier::defaults(ExchangeId::Ftx);
        let body = json!({"success": false, "error": "Please retry request"});

        let ErrorPayload::Single(error) = FtxWire.decode_errors(&body, &classifier) else {
            panic!("expected a single error");
        };
        assert!(!error.accept);
        assert!(error.sleep.is_some());
    }

    #[test]
    fn successful_body_yields_result() {
        let classifier = ErrorClassifier::defaults(ExchangeId::Ftx);
        let body = json!({"success": true, "result": []});

        assert!(FtxWire.decode_errors(&body, &classifier).is_empty());
        assert_eq!(FtxWire.extract_result(body).expect("result"), json!([]));
    }
}
