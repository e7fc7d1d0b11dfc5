//! # Request Pipeline
//!
//! Every exchange call runs the same staged sequence. Each stage consumes the
//! previous stage's `Ok` value; the first `Err` ends the run.
//!
//! 1. validate the normalized request
//! 2. map it to the exchange's vocabulary ([`RestOperation::map_request`])
//! 3. validate the exchange request
//! 4. sign (private endpoints) and dispatch: the only network call
//! 5. validate the raw response: status, JSON, exchange error payload
//! 6. extract the result payload ([`WireFormat::extract_result`])
//! 7. verify the echoed instrument key, for endpoints that echo one
//! 8. parse and map to the normalized shape
//! 9. validate the normalized response
//!
//! Adapters describe an endpoint by implementing [`RestOperation`]; the
//! stages themselves live in [`execute`].

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::auth::ExchangeAuth;
use crate::classification::ErrorClassifier;
use crate::domain::Validate;
use crate::endpoints::EndpointTable;
use crate::exchange::{ExchangeId, Operation, Visibility};
use crate::http_client::{HttpClient, HttpMethod, HttpRequest, SentRequest};
use crate::retry::{with_deadline, Retry, RetryConfig};
use crate::{ConfigError, ErrorEnvelope, ErrorPayload, NoobitResult, ValidationError};

/// Untrusted response as received from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    pub request: SentRequest,
}

impl RawResponse {
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Envelope shape of an exchange's JSON responses.
pub trait WireFormat: Send + Sync {
    /// Decode the application-level errors carried by a body.
    fn decode_errors(&self, body: &Value, classifier: &ErrorClassifier) -> ErrorPayload;

    /// Unwrap the result payload of an error-free body.
    fn extract_result(&self, body: Value) -> Result<Value, ValidationError>;
}

/// Everything an adapter needs to run a pipeline, injected at construction.
#[derive(Clone)]
pub struct ExchangeContext {
    pub exchange: ExchangeId,
    pub http: Arc<dyn HttpClient>,
    pub endpoints: EndpointTable,
    pub auth: Option<Arc<ExchangeAuth>>,
    pub classifier: ErrorClassifier,
    pub wire: Arc<dyn WireFormat>,
    pub retry: RetryConfig,
    pub timeout_ms: u64,
    pub deadline: Option<Duration>,
}

impl std::fmt::Debug for ExchangeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeContext")
            .field("exchange", &self.exchange)
            .field("endpoints", &self.endpoints)
            .field("auth", &self.auth)
            .field("retry", &self.retry)
            .field("timeout_ms", &self.timeout_ms)
            .field("deadline", &self.deadline)
            .finish()
    }
}

impl ExchangeContext {
    /// Context with the exchange's default endpoints, error table and wire format.
    pub fn new(exchange: ExchangeId, http: Arc<dyn HttpClient>) -> Result<Self, ConfigError> {
        Ok(Self {
            exchange,
            http,
            endpoints: EndpointTable::defaults(exchange)?,
            auth: None,
            classifier: ErrorClassifier::defaults(exchange),
            wire: crate::exchanges::wire_format(exchange),
            retry: RetryConfig::default(),
            timeout_ms: 3_000,
            deadline: None,
        })
    }

    pub fn with_endpoints(mut self, endpoints: EndpointTable) -> Result<Self, ConfigError> {
        if endpoints.exchange() != self.exchange {
            return Err(ConfigError::MalformedEndpointTable {
                exchange: self.exchange,
                reason: format!("table belongs to {}", endpoints.exchange()),
            });
        }
        self.endpoints = endpoints;
        Ok(self)
    }

    pub fn with_auth(mut self, auth: Arc<ExchangeAuth>) -> Result<Self, ConfigError> {
        if auth.exchange() != self.exchange {
            return Err(ConfigError::AuthExchangeMismatch {
                expected: self.exchange,
                actual: auth.exchange(),
            });
        }
        self.auth = Some(auth);
        Ok(self)
    }

    pub fn with_classifier(mut self, classifier: ErrorClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Run an operation under the configured retry policy and deadline.
    pub async fn run<O>(&self, op: &O, request: &O::Request) -> NoobitResult<O::Response>
    where
        O: RestOperation,
    {
        let retry = Retry::from_config(&self.retry);
        let attempts = retry.run(|| execute(self, op, request));
        match self.deadline {
            Some(deadline) => with_deadline(deadline, attempts).await,
            None => attempts.await,
        }
    }
}

/// One REST endpoint of one exchange.
pub trait RestOperation: Send + Sync {
    const OPERATION: Operation;

    type Request: Validate + Send + Sync;
    type ExchangeRequest: Serialize + Validate + Send + Sync;
    type ExchangeResponse;
    type Response: Validate;

    fn map_request(&self, request: &Self::Request) -> Result<Self::ExchangeRequest, ValidationError>;

    /// Substitute placeholders of the route's path template.
    fn path<'t>(&self, template: &'t str, request: &Self::ExchangeRequest) -> Cow<'t, str> {
        let _ = request;
        Cow::Borrowed(template)
    }

    /// Check that the payload describes the instrument that was asked for.
    fn verify_symbol(&self, request: &Self::ExchangeRequest, result: &Value) -> NoobitResult<()> {
        let _ = (request, result);
        Ok(())
    }

    /// Decode the unwrapped result. Most operations hand it to [`from_payload`];
    /// keyed Kraken results pick their entry with [`keyed_entry`].
    fn parse_payload(
        &self,
        request: &Self::ExchangeRequest,
        result: Value,
    ) -> Result<Self::ExchangeResponse, ValidationError>;

    fn map_response(
        &self,
        request: &Self::Request,
        exchange_request: &Self::ExchangeRequest,
        response: Self::ExchangeResponse,
    ) -> Result<Self::Response, ValidationError>;
}

/// Run all stages of one operation once. Performs exactly one network call.
pub async fn execute<O>(
    ctx: &ExchangeContext,
    op: &O,
    request: &O::Request,
) -> NoobitResult<O::Response>
where
    O: RestOperation,
{
    request.validate()?;
    let exchange_request = op.map_request(request)?;
    exchange_request.validate()?;

    let raw = dispatch(ctx, op, &exchange_request).await?;
    let sent = raw.request.clone();
    let tag = |error: ValidationError| ErrorEnvelope::from(error).with_request(sent.clone());

    let result = accept_response(ctx, raw)?;
    op.verify_symbol(&exchange_request, &result)
        .map_err(|e| e.with_request(sent.clone()))?;
    let payload = op.parse_payload(&exchange_request, result).map_err(tag)?;
    let response = op
        .map_response(request, &exchange_request, payload)
        .map_err(tag)?;
    response.validate().map_err(tag)?;

    Ok(response)
}

async fn dispatch<O>(
    ctx: &ExchangeContext,
    op: &O,
    exchange_request: &O::ExchangeRequest,
) -> NoobitResult<RawResponse>
where
    O: RestOperation,
{
    let route = ctx
        .endpoints
        .route(O::OPERATION)
        .ok_or_else(|| ErrorEnvelope::unsupported(ctx.exchange, O::OPERATION))?;
    let path = op.path(&route.path, exchange_request);
    let url = ctx.endpoints.url(route, &path)?;
    let params = to_params(exchange_request)?;

    let (params, headers) = match route.visibility {
        Visibility::Public => (params, Vec::new()),
        Visibility::Private => {
            let auth = ctx.auth.as_ref().ok_or(ConfigError::MissingCredentials {
                exchange: ctx.exchange,
            })?;
            let signed = auth.sign(route.method, url.path(), params)?;
            (signed.params, signed.headers)
        }
    };

    let request = match route.method {
        HttpMethod::Get => HttpRequest::get(url.as_str()).with_query(&params),
        HttpMethod::Post => HttpRequest::post(url.as_str()).with_form(&params),
    }
    .with_headers(headers)
    .with_timeout_ms(ctx.timeout_ms);

    let sent = request.sent();
    debug!(
        exchange = %ctx.exchange,
        operation = %O::OPERATION,
        method = %sent.method,
        url = %sent.url,
        "dispatching request"
    );

    let response = ctx.http.execute(request).await.map_err(|e| {
        warn!(exchange = %ctx.exchange, error = %e, "transport failure");
        ErrorEnvelope::connection(e.message(), e.retryable() && ctx.retry.retry_on_connect)
            .with_request(sent.clone())
    })?;

    Ok(RawResponse {
        status: response.status,
        headers: response.headers,
        body: response.body,
        request: sent,
    })
}

/// Status, JSON and exchange-error gates; yields the result payload.
fn accept_response(ctx: &ExchangeContext, raw: RawResponse) -> NoobitResult<Value> {
    let parsed = serde_json::from_str::<Value>(&raw.body);

    if !raw.is_success() {
        let payload = parsed.ok();
        let errors = payload
            .as_ref()
            .map(|body| ctx.wire.decode_errors(body, &ctx.classifier))
            .unwrap_or_default();
        warn!(exchange = %ctx.exchange, status = raw.status, "non-success status");
        return Err(ErrorEnvelope::http_status(
            raw.status,
            payload,
            errors,
            ctx.retry.should_retry_status(raw.status),
        )
        .with_request(raw.request));
    }

    let body = parsed.map_err(|e| {
        ErrorEnvelope::from(ValidationError::MalformedJson {
            reason: e.to_string(),
        })
        .with_request(raw.request.clone())
    })?;

    let errors = ctx.wire.decode_errors(&body, &ctx.classifier);
    if !errors.is_empty() {
        let envelope = ErrorEnvelope::exchange(errors, Some(body)).with_request(raw.request);
        warn!(exchange = %ctx.exchange, error = %envelope, "exchange reported an error");
        return Err(envelope);
    }

    ctx.wire
        .extract_result(body)
        .map_err(|e| ErrorEnvelope::from(e).with_request(raw.request))
}

/// Flatten a serializable exchange request into wire parameters sorted by key.
///
/// `null` fields are skipped, arrays are comma-joined.
pub fn to_params<T: Serialize>(request: &T) -> Result<Vec<(String, String)>, ValidationError> {
    let value = serde_json::to_value(request).map_err(|e| ValidationError::UnexpectedShape {
        reason: e.to_string(),
    })?;

    let map = match value {
        Value::Null => return Ok(Vec::new()),
        Value::Object(map) => map,
        other => {
            return Err(ValidationError::UnexpectedShape {
                reason: format!("request must serialize to an object, got {other}"),
            })
        }
    };

    let mut params = Vec::with_capacity(map.len());
    for (key, value) in map {
        let rendered = match value {
            Value::Null => continue,
            Value::String(text) => text,
            Value::Number(number) => number.to_string(),
            Value::Bool(flag) => flag.to_string(),
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(","),
            Value::Object(_) => {
                return Err(ValidationError::UnexpectedShape {
                    reason: format!("parameter '{key}' must be a scalar"),
                })
            }
        };
        params.push((key, rendered));
    }
    params.sort();
    Ok(params)
}

/// Deserialize a payload into an exchange model.
pub fn from_payload<T: DeserializeOwned>(payload: Value) -> Result<T, ValidationError> {
    serde_json::from_value(payload).map_err(|e| ValidationError::UnexpectedShape {
        reason: e.to_string(),
    })
}

/// Deserialize the entry stored under `key` in an object payload.
///
/// Exchanges that key results by their own pair name (`{"XXBTZUSD": [...]}`)
/// go through here with the pair as data.
pub fn keyed_entry<T: DeserializeOwned>(payload: &Value, key: &str) -> Result<T, ValidationError> {
    let object = payload
        .as_object()
        .ok_or_else(|| ValidationError::UnexpectedShape {
            reason: String::from("result must be an object"),
        })?;
    let entry = object
        .get(key)
        .ok_or_else(|| ValidationError::MissingKey {
            key: key.to_owned(),
        })?;
    from_payload(entry.clone())
}

/// Compare the instrument key a payload echoes with the requested one.
///
/// Keys listed in `ignore` (cursors such as `last`) are skipped.
pub fn verify_keyed_symbol(payload: &Value, requested: &str, ignore: &[&str]) -> NoobitResult<()> {
    let object = payload.as_object().ok_or_else(|| {
        ErrorEnvelope::from(ValidationError::UnexpectedShape {
            reason: String::from("result must be an object"),
        })
    })?;

    let mut keys = object
        .keys()
        .filter(|key| !ignore.contains(&key.as_str()));
    match (keys.next(), keys.next()) {
        (Some(key), None) if key == requested => Ok(()),
        (Some(key), None) => Err(ErrorEnvelope::symbol_mismatch(requested, key)),
        (None, _) => Err(ValidationError::MissingKey {
            key: requested.to_owned(),
        }
        .into()),
        (Some(_), Some(_)) => Err(ValidationError::UnexpectedShape {
            reason: String::from("result holds more than one instrument"),
        }
        .into()),
    }
}
