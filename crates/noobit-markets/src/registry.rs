use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::auth::ExchangeAuth;
use crate::config::Settings;
use crate::endpoints::EndpointTable;
use crate::exchange::{ExchangeInterface, Operation};
use crate::exchanges::{BinanceAdapter, FtxAdapter, KrakenAdapter};
use crate::http_client::{HttpClient, ReqwestHttpClient};
use crate::pipeline::ExchangeContext;
use crate::{
    ConfigError, ErrorEnvelope, ExchangeId, NoobitResult, OhlcRequest, OrderBookRequest,
    SpreadRequest, TradesRequest, ValidationError,
};

/// Normalized parameters of one operation, for dispatch by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationRequest {
    Ohlc(OhlcRequest),
    Spread(SpreadRequest),
    Orderbook(OrderBookRequest),
    Symbols,
    Balances,
    Exposure,
    Trades(TradesRequest),
}

impl OperationRequest {
    pub const fn operation(&self) -> Operation {
        match self {
            Self::Ohlc(_) => Operation::Ohlc,
            Self::Spread(_) => Operation::Spread,
            Self::Orderbook(_) => Operation::Orderbook,
            Self::Symbols => Operation::Symbols,
            Self::Balances => Operation::Balances,
            Self::Exposure => Operation::Exposure,
            Self::Trades(_) => Operation::Trades,
        }
    }
}

/// Adapters by exchange.
pub struct ExchangeRegistry {
    adapters: BTreeMap<ExchangeId, Arc<dyn ExchangeInterface>>,
    kraken: Option<Arc<KrakenAdapter>>,
}

impl std::fmt::Debug for ExchangeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeRegistry")
            .field("exchanges", &self.adapters.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ExchangeRegistry {
    pub fn new(adapters: Vec<Arc<dyn ExchangeInterface>>) -> Self {
        let adapters = adapters
            .into_iter()
            .map(|adapter| (adapter.id(), adapter))
            .collect();
        Self {
            adapters,
            kraken: None,
        }
    }

    pub fn builder() -> ExchangeRegistryBuilder {
        ExchangeRegistryBuilder::new()
    }

    /// Production wiring: reqwest transport, environment credentials.
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        Self::builder()
            .with_settings(settings.clone())
            .with_env_credentials(true)
            .build()
    }

    pub fn get(&self, exchange: ExchangeId) -> Option<Arc<dyn ExchangeInterface>> {
        self.adapters.get(&exchange).cloned()
    }

    /// The Kraken adapter when built from settings, for table refreshes.
    pub fn kraken(&self) -> Option<Arc<KrakenAdapter>> {
        self.kraken.clone()
    }

    pub fn exchanges(&self) -> Vec<ExchangeId> {
        self.adapters.keys().copied().collect()
    }

    /// Whether `exchange` offers the operation named `operation` (`"ohlc"`, ...).
    pub fn supports(&self, exchange: ExchangeId, operation: &str) -> Result<bool, ValidationError> {
        let operation = operation.parse::<Operation>()?;
        Ok(self
            .adapters
            .get(&exchange)
            .is_some_and(|adapter| adapter.capabilities().supports(operation)))
    }

    /// Run one operation and return its normalized response as JSON.
    pub async fn invoke(
        &self,
        exchange: ExchangeId,
        request: OperationRequest,
    ) -> NoobitResult<Value> {
        let adapter = self.adapters.get(&exchange).ok_or_else(|| {
            ErrorEnvelope::unsupported(exchange, request.operation())
        })?;

        match request {
            OperationRequest::Ohlc(req) => to_json(adapter.ohlc(req).await?),
            OperationRequest::Spread(req) => to_json(adapter.spread(req).await?),
            OperationRequest::Orderbook(req) => to_json(adapter.orderbook(req).await?),
            OperationRequest::Symbols => to_json(adapter.symbols().await?),
            OperationRequest::Balances => to_json(adapter.balances().await?),
            OperationRequest::Exposure => to_json(adapter.exposure().await?),
            OperationRequest::Trades(req) => to_json(adapter.trades(req).await?),
        }
    }
}

fn to_json<T: Serialize>(response: T) -> NoobitResult<Value> {
    serde_json::to_value(response).map_err(|e| {
        ErrorEnvelope::validation(ValidationError::UnexpectedShape {
            reason: e.to_string(),
        })
    })
}

/// Builder for [`ExchangeRegistry`].
///
/// ```no_run
/// use noobit_markets::{ExchangeRegistry, Settings};
///
/// let settings = Settings::load("noobit.toml")?;
/// let registry = ExchangeRegistry::builder()
///     .with_settings(settings)
///     .with_env_credentials(true)
///     .build()?;
/// # Ok::<(), noobit_markets::ConfigError>(())
/// ```
#[derive(Default)]
pub struct ExchangeRegistryBuilder {
    settings: Settings,
    http: Option<Arc<dyn HttpClient>>,
    env_credentials: bool,
    adapters: Vec<Arc<dyn ExchangeInterface>>,
}

impl ExchangeRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Transport shared by every adapter built from settings.
    pub fn with_http_client(mut self, http: Arc<dyn HttpClient>) -> Self {
        self.http = Some(http);
        self
    }

    /// Also read `NOOBIT_<EXCHANGE>_API_KEY[_n]` credentials from the environment.
    pub fn with_env_credentials(mut self, enabled: bool) -> Self {
        self.env_credentials = enabled;
        self
    }

    /// Register a prebuilt adapter; it replaces the one settings would build.
    pub fn with_adapter(mut self, adapter: Arc<dyn ExchangeInterface>) -> Self {
        self.adapters.push(adapter);
        self
    }

    pub fn build(self) -> Result<ExchangeRegistry, ConfigError> {
        let http = self
            .http
            .unwrap_or_else(|| Arc::new(ReqwestHttpClient::new()));
        let lookup: fn(&str) -> Option<String> = if self.env_credentials {
            |name| std::env::var(name).ok()
        } else {
            |_| None
        };

        let mut registry = ExchangeRegistry::new(Vec::new());
        for exchange in ExchangeId::ALL {
            if !self.settings.exchange(exchange).enabled {
                continue;
            }
            let ctx = context(&self.settings, exchange, Arc::clone(&http), lookup)?;
            let tables = self.settings.exchange(exchange).translation_tables()?;
            let adapter: Arc<dyn ExchangeInterface> = match exchange {
                ExchangeId::Kraken => {
                    let kraken = Arc::new(KrakenAdapter::from_context(ctx, tables));
                    registry.kraken = Some(Arc::clone(&kraken));
                    kraken
                }
                ExchangeId::Binance => Arc::new(BinanceAdapter::from_context(ctx, tables)),
                ExchangeId::Ftx => Arc::new(FtxAdapter::from_context(ctx, tables)),
            };
            registry.adapters.insert(exchange, adapter);
        }

        for adapter in self.adapters {
            if adapter.id() == ExchangeId::Kraken {
                registry.kraken = None;
            }
            registry.adapters.insert(adapter.id(), adapter);
        }

        tracing::debug!(exchanges = ?registry.exchanges(), "exchange registry built");
        Ok(registry)
    }
}

/// Context for one exchange: endpoints, classifier, retry, deadline and auth.
pub fn context(
    settings: &Settings,
    exchange: ExchangeId,
    http: Arc<dyn HttpClient>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<ExchangeContext, ConfigError> {
    let section = settings.exchange(exchange);
    let endpoints = EndpointTable::defaults(exchange)?
        .with_base_urls(section.public_url.as_deref(), section.private_url.as_deref())?;

    let mut ctx = ExchangeContext::new(exchange, http)?
        .with_endpoints(endpoints)?
        .with_classifier(section.classifier(exchange))
        .with_retry(settings.retry.to_config()?)
        .with_timeout_ms(settings.timeout_ms);
    if let Some(deadline) = settings.deadline() {
        ctx = ctx.with_deadline(deadline);
    }

    let credentials = section.credentials(exchange, lookup);
    if !credentials.is_empty() {
        ctx = ctx.with_auth(Arc::new(ExchangeAuth::new(exchange, credentials)?))?;
    }
    Ok(ctx)
}
