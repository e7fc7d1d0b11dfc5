use std::collections::{BTreeMap, VecDeque};
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::Mutex;

/// HTTP methods used by exchange endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

impl Display for HttpMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP request envelope handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
    pub timeout_ms: u64,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: BTreeMap::new(),
            body: None,
            timeout_ms: 3_000,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, url)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_headers(mut self, headers: impl IntoIterator<Item = (String, String)>) -> Self {
        for (name, value) in headers {
            self.headers.insert(name.to_ascii_lowercase(), value);
        }
        self
    }

    /// Append url-encoded parameters to the query string. Order is kept.
    pub fn with_query(mut self, params: &[(String, String)]) -> Self {
        if params.is_empty() {
            return self;
        }
        let separator = if self.url.contains('?') { '&' } else { '?' };
        self.url = format!("{}{}{}", self.url, separator, encode_params(params));
        self
    }

    /// Send parameters as an `application/x-www-form-urlencoded` body.
    pub fn with_form(self, params: &[(String, String)]) -> Self {
        self.with_header("content-type", "application/x-www-form-urlencoded")
            .with_body(encode_params(params))
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Diagnostic copy with credential headers masked.
    pub fn sent(&self) -> SentRequest {
        let headers = self
            .headers
            .iter()
            .map(|(name, value)| {
                let value = if is_sensitive_header(name) {
                    String::from("<redacted>")
                } else {
                    value.clone()
                };
                (name.clone(), value)
            })
            .collect();

        SentRequest {
            method: self.method,
            url: self.url.clone(),
            headers,
            body: self.body.clone(),
        }
    }
}

/// The request as it went out, attached to errors for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
}

fn is_sensitive_header(name: &str) -> bool {
    name.contains("key") || name.contains("sign")
}

/// Url-encode `key=value` pairs joined by `&`.
pub fn encode_params(params: &[(String, String)]) -> String {
    params
        .iter()
        .map(|(key, value)| {
            format!(
                "{}={}",
                urlencoding::encode(key),
                urlencoding::encode(value)
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// HTTP response envelope returned by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    pub fn ok_json(body: impl Into<String>) -> Self {
        Self::new(200, body)
    }

    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Connection-level failure: no status line was received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpError {
    message: String,
    retryable: bool,
}

impl HttpError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
        }
    }

    pub fn non_retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }
}

impl Display for HttpError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for HttpError {}

pub type HttpFuture<'a> = Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>>;

/// Transport contract shared by every exchange adapter.
pub trait HttpClient: Send + Sync {
    fn execute<'a>(&'a self, request: HttpRequest) -> HttpFuture<'a>;
}

/// Offline transport replaying queued responses in order.
///
/// Every request is recorded so tests can assert on what was sent. Once the
/// queue is drained, calls fail with a non-retryable [`HttpError`].
#[derive(Debug, Default)]
pub struct ScriptedHttpClient {
    responses: Mutex<VecDeque<Result<HttpResponse, HttpError>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_json(&self, body: impl Into<String>) -> &Self {
        self.push(Ok(HttpResponse::ok_json(body)))
    }

    pub fn push_status(&self, status: u16, body: impl Into<String>) -> &Self {
        self.push(Ok(HttpResponse::new(status, body)))
    }

    pub fn push_failure(&self, error: HttpError) -> &Self {
        self.push(Err(error))
    }

    pub fn push(&self, response: Result<HttpResponse, HttpError>) -> &Self {
        self.responses.lock().push_back(response);
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().len()
    }
}

impl HttpClient for ScriptedHttpClient {
    fn execute<'a>(&'a self, request: HttpRequest) -> HttpFuture<'a> {
        self.requests.lock().push(request);
        let next = self
            .responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(HttpError::non_retryable("no scripted response left")));
        Box::pin(async move { next })
    }
}

/// Production transport backed by reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: Arc<reqwest::Client>,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self {
            client: Arc::new(
                reqwest::Client::builder()
                    .user_agent(concat!("noobit-markets/", env!("CARGO_PKG_VERSION")))
                    .build()
                    .unwrap_or_else(|_| reqwest::Client::new()),
            ),
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client: Arc::new(client),
        }
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient for ReqwestHttpClient {
    fn execute<'a>(&'a self, request: HttpRequest) -> HttpFuture<'a> {
        Box::pin(async move {
            let mut builder = match request.method {
                HttpMethod::Get => self.client.get(&request.url),
                HttpMethod::Post => self.client.post(&request.url),
            };

            for (name, value) in &request.headers {
                builder = builder.header(name, value);
            }

            builder = builder.timeout(std::time::Duration::from_millis(request.timeout_ms));

            if let Some(body) = request.body {
                builder = builder.body(body);
            }

            let response = builder.send().await.map_err(|e| {
                if e.is_timeout() {
                    HttpError::new(format!("request timeout: {e}"))
                } else if e.is_connect() {
                    HttpError::new(format!("connection failed: {e}"))
                } else if e.is_builder() {
                    HttpError::non_retryable(format!("invalid request: {e}"))
                } else {
                    HttpError::new(format!("request failed: {e}"))
                }
            })?;

            let status = response.status().as_u16();
            let headers = response
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|value| (name.as_str().to_owned(), value.to_owned()))
                })
                .collect();
            let body = response
                .text()
                .await
                .map_err(|e| HttpError::new(format!("failed to read response body: {e}")))?;

            Ok(HttpResponse {
                status,
                headers,
                body,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn query_parameters_are_encoded_in_order() {
        let request = HttpRequest::get("https://api.kraken.com/0/public/OHLC")
            .with_query(&params(&[("pair", "XXBTZUSD"), ("interval", "1")]));

        assert_eq!(
            request.url,
            "https://api.kraken.com/0/public/OHLC?pair=XXBTZUSD&interval=1"
        );
    }

    #[test]
    fn form_body_sets_content_type() {
        let request = HttpRequest::post("https://api.kraken.com/0/private/Balance")
            .with_form(&params(&[("nonce", "1"), ("asset", "a b")]));

        assert_eq!(request.body.as_deref(), Some("nonce=1&asset=a%20b"));
        assert_eq!(
            request.headers.get("content-type").map(String::as_str),
            Some("application/x-www-form-urlencoded")
        );
    }

    #[test]
    fn sent_request_masks_credential_headers() {
        let request = HttpRequest::post("https://api.kraken.com/0/private/Balance")
            .with_header("API-Key", "public-key")
            .with_header("API-Sign", "signature")
            .with_header("Accept", "application/json");

        let sent = request.sent();
        assert_eq!(sent.headers.get("api-key").map(String::as_str), Some("<redacted>"));
        assert_eq!(sent.headers.get("api-sign").map(String::as_str), Some("<redacted>"));
        assert_eq!(
            sent.headers.get("accept").map(String::as_str),
            Some("application/json")
        );
    }

    #[tokio::test]
    async fn scripted_client_replays_and_records() {
        let client = ScriptedHttpClient::new();
        client.push_json("{}").push_status(503, "busy");

        let first = client
            .execute(HttpRequest::get("https://example.test/a"))
            .await
            .expect("first response");
        let second = client
            .execute(HttpRequest::get("https://example.test/b"))
            .await
            .expect("second response");
        let drained = client
            .execute(HttpRequest::get("https://example.test/c"))
            .await;

        assert_eq!(first.status, 200);
        assert_eq!(second.status, 503);
        assert!(matches!(drained, Err(ref e) if !e.retryable()));
        assert_eq!(client.call_count(), 3);
        assert_eq!(client.requests()[1].url, "https://example.test/b");
    }
}
