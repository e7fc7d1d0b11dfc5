use std::fmt::{Display, Formatter};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::exchange::{ExchangeId, Operation};
use crate::http_client::SentRequest;

/// Local schema violations raised at any validation boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("symbol cannot be empty")]
    EmptySymbol,
    #[error("symbol '{value}' must be BASE-QUOTE (or BASE/QUOTE)")]
    SymbolMissingQuote { value: String },
    #[error("symbol contains invalid character '{ch}' at index {index}")]
    SymbolInvalidChar { ch: char, index: usize },
    #[error("asset cannot be empty")]
    EmptyAsset,
    #[error("asset '{value}' must be 1 to 12 ASCII alphanumeric characters")]
    InvalidAsset { value: String },

    #[error("invalid timeframe '{value}', expected one of 1m, 5m, 15m, 30m, 1H, 4H, 1D, 1W, 15D")]
    InvalidTimeframe { value: String },
    #[error("timeframe '{timeframe}' is not supported by {exchange}")]
    UnsupportedTimeframe {
        timeframe: String,
        exchange: ExchangeId,
    },
    #[error("invalid exchange '{value}', expected one of kraken, binance, ftx")]
    InvalidExchange { value: String },
    #[error("invalid operation '{value}'")]
    InvalidOperation { value: String },

    #[error("symbol '{symbol}' has no entry in the {exchange} translation table")]
    UnknownSymbol { symbol: String, exchange: ExchangeId },
    #[error("exchange pair '{pair}' has no entry in the translation table")]
    UnknownPair { pair: String },
    #[error("asset '{value}' has no entry in the translation table")]
    UnknownAsset { value: String },

    #[error("field '{field}' must be positive")]
    NonPositiveValue { field: &'static str },
    #[error("field '{field}' must be non-negative")]
    NegativeValue { field: &'static str },
    #[error("field '{field}' value {value} is out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },
    #[error("field '{field}' has invalid value '{value}'")]
    InvalidField { field: &'static str, value: String },

    #[error("timestamp {value} is not a valid unix time")]
    InvalidTimestamp { value: i64 },
    #[error("timestamp year {year} not within [2009, 2050]")]
    TimestampOutOfEra { year: i32 },
    #[error("candle high must be >= low")]
    InvalidCandleRange,
    #[error("best bid must not exceed best ask")]
    CrossedSpread,
    #[error("'{field}' must be sorted by {order}")]
    Unsorted {
        field: &'static str,
        order: &'static str,
    },

    #[error("response body is not valid JSON: {reason}")]
    MalformedJson { reason: String },
    #[error("response payload is missing key '{key}'")]
    MissingKey { key: String },
    #[error("response payload has unexpected shape: {reason}")]
    UnexpectedShape { reason: String },
}

/// Startup failures. Never raised per call.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no credentials configured for {exchange}")]
    MissingCredentials { exchange: ExchangeId },
    #[error("credential secret for {exchange} is malformed: {reason}")]
    MalformedSecret { exchange: ExchangeId, reason: String },
    #[error("invalid base url '{value}': {reason}")]
    InvalidBaseUrl { value: String, reason: String },
    #[error("credentials for {actual} cannot sign {expected} requests")]
    AuthExchangeMismatch {
        expected: ExchangeId,
        actual: ExchangeId,
    },
    #[error("endpoint table for {exchange} is malformed: {reason}")]
    MalformedEndpointTable { exchange: ExchangeId, reason: String },
    #[error("duplicate translation entry '{value}'")]
    DuplicateTranslation { value: String },
    #[error("retry budget must be at least 1")]
    ZeroRetryBudget,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("failed to read settings file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Classification of every failure travelling through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Transport,
    Exchange,
    SymbolMismatch,
    Configuration,
    Timeout,
    UnsupportedOperation,
}

impl ErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Transport => "transport",
            Self::Exchange => "exchange",
            Self::SymbolMismatch => "symbol_mismatch",
            Self::Configuration => "configuration",
            Self::Timeout => "timeout",
            Self::UnsupportedOperation => "unsupported_operation",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One exchange-reported error, already classified.
///
/// `accept` marks an outcome the caller should take as final; `sleep` is the
/// suggested wait before a retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeError {
    pub code: String,
    pub message: String,
    pub accept: bool,
    pub sleep: Option<Duration>,
}

impl ExchangeError {
    pub fn terminal(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            accept: true,
            sleep: None,
        }
    }

    pub fn transient(
        code: impl Into<String>,
        message: impl Into<String>,
        sleep: Option<Duration>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            accept: false,
            sleep,
        }
    }
}

impl Display for ExchangeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.message.is_empty() || self.message == self.code {
            f.write_str(&self.code)
        } else {
            write!(f, "{}: {}", self.code, self.message)
        }
    }
}

/// Decoded exchange errors in the shape the exchange sent them.
///
/// Kraken-style APIs report a list; Binance and FTX report a single object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ErrorPayload {
    #[default]
    None,
    Single(ExchangeError),
    List(Vec<ExchangeError>),
}

impl ErrorPayload {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::None => true,
            Self::Single(_) => false,
            Self::List(errors) => errors.is_empty(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExchangeError> {
        let slice: &[ExchangeError] = match self {
            Self::None => &[],
            Self::Single(error) => std::slice::from_ref(error),
            Self::List(errors) => errors,
        };
        slice.iter()
    }
}

/// The single failure channel of every pipeline stage.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorEnvelope {
    kind: ErrorKind,
    message: String,
    status: Option<u16>,
    errors: ErrorPayload,
    payload: Option<serde_json::Value>,
    request: Option<SentRequest>,
    transient: bool,
}

pub type NoobitResult<T> = Result<T, ErrorEnvelope>;

impl ErrorEnvelope {
    fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            errors: ErrorPayload::None,
            payload: None,
            request: None,
            transient: false,
        }
    }

    pub fn validation(error: ValidationError) -> Self {
        Self::new(ErrorKind::Validation, error.to_string())
    }

    /// Connection-level failure before any status line was received.
    pub fn connection(message: impl Into<String>, transient: bool) -> Self {
        Self {
            transient,
            ..Self::new(ErrorKind::Transport, message)
        }
    }

    /// Non-2xx response. `transient` reflects the status alone and is ignored
    /// once decoded exchange errors are attached.
    pub fn http_status(
        status: u16,
        payload: Option<serde_json::Value>,
        errors: ErrorPayload,
        transient: bool,
    ) -> Self {
        Self {
            status: Some(status),
            payload,
            errors,
            transient,
            ..Self::new(ErrorKind::Transport, format!("HTTP status error: {status}"))
        }
    }

    /// 2xx response whose body carries an application-level error.
    pub fn exchange(errors: ErrorPayload, payload: Option<serde_json::Value>) -> Self {
        let message = errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        Self {
            errors,
            payload,
            ..Self::new(ErrorKind::Exchange, message)
        }
    }

    pub fn symbol_mismatch(requested: &str, received: &str) -> Self {
        Self::new(
            ErrorKind::SymbolMismatch,
            format!("requested: {requested}, got: {received}"),
        )
    }

    pub fn configuration(error: ConfigError) -> Self {
        Self::new(ErrorKind::Configuration, error.to_string())
    }

    pub fn timeout(deadline: Duration) -> Self {
        Self::new(
            ErrorKind::Timeout,
            format!("deadline of {} ms elapsed", deadline.as_millis()),
        )
    }

    pub fn unsupported(exchange: ExchangeId, operation: Operation) -> Self {
        Self::new(
            ErrorKind::UnsupportedOperation,
            format!("operation '{operation}' is not supported by {exchange}"),
        )
    }

    pub fn with_request(mut self, request: SentRequest) -> Self {
        self.request = Some(request);
        self
    }

    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn errors(&self) -> &ErrorPayload {
        &self.errors
    }

    pub fn payload(&self) -> Option<&serde_json::Value> {
        self.payload.as_ref()
    }

    pub fn request(&self) -> Option<&SentRequest> {
        self.request.as_ref()
    }

    /// Whether the failure is worth retrying, and after how long.
    ///
    /// `Some(None)` means transient without a hint; the retry combinator then
    /// falls back to its backoff.
    pub fn retry_hint(&self) -> Option<Option<Duration>> {
        match self.kind {
            ErrorKind::Validation
            | ErrorKind::SymbolMismatch
            | ErrorKind::Configuration
            | ErrorKind::Timeout
            | ErrorKind::UnsupportedOperation => None,
            ErrorKind::Transport | ErrorKind::Exchange => match &self.errors {
                ErrorPayload::None => self.transient.then_some(None),
                ErrorPayload::List(errors) => match errors.as_slice() {
                    [] => self.transient.then_some(None),
                    [only] if !only.accept => Some(only.sleep),
                    _ => None,
                },
                ErrorPayload::Single(error) => match (error.accept, error.sleep) {
                    (false, Some(sleep)) => Some(Some(sleep)),
                    _ => None,
                },
            },
        }
    }

    pub fn retryable(&self) -> bool {
        self.retry_hint().is_some()
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            ErrorKind::Validation => "noobit.validation",
            ErrorKind::Transport => "noobit.transport",
            ErrorKind::Exchange => "noobit.exchange",
            ErrorKind::SymbolMismatch => "noobit.symbol_mismatch",
            ErrorKind::Configuration => "noobit.configuration",
            ErrorKind::Timeout => "noobit.timeout",
            ErrorKind::UnsupportedOperation => "noobit.unsupported_operation",
        }
    }
}

impl Display for ErrorEnvelope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for ErrorEnvelope {}

impl From<ValidationError> for ErrorEnvelope {
    fn from(error: ValidationError) -> Self {
        Self::validation(error)
    }
}

impl From<ConfigError> for ErrorEnvelope {
    fn from(error: ConfigError) -> Self {
        Self::configuration(error)
    }
}
