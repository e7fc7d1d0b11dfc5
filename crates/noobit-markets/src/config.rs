//! Settings file loading and logging initialization.
//!
//! Settings are read from TOML. Every section is optional:
//!
//! ```toml
//! timeout_ms = 3000
//! deadline_ms = 20000
//!
//! [logging]
//! level = "noobit_markets=debug"
//! format = "json"
//!
//! [retry]
//! budget = 5
//! transient_statuses = [429, 502, 503]
//!
//! [exchanges.kraken]
//! public_url = "https://api.kraken.com/0/public/"
//! credentials = [{ api_key = "...", api_secret = "..." }]
//! errors = { "EAPI:Rate limit exceeded" = { accept = false, sleep_ms = 8000 } }
//!
//! [exchanges.binance.symbols]
//! "BTC-USDT" = "BTCUSDT"
//! ```
//!
//! Credentials may also come from the environment (`.env` is honoured):
//! `NOOBIT_KRAKEN_API_KEY` / `NOOBIT_KRAKEN_API_SECRET`, plus numbered
//! variants (`NOOBIT_KRAKEN_API_KEY_1`, ...) for key rotation.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};

use crate::auth::Credential;
use crate::classification::{ErrorClassifier, ErrorRule};
use crate::mappings::{AssetMap, SymbolMap, TranslationTables};
use crate::retry::{Backoff, RetryConfig};
use crate::{ConfigError, ExchangeId};

const DEFAULT_TIMEOUT_MS: u64 = 3_000;

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, overridden by `RUST_LOG` when set.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: LogFormat::Pretty,
        }
    }
}

impl LoggingConfig {
    /// Install the global tracing subscriber.
    ///
    /// Fails when a subscriber is already installed.
    pub fn try_init(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));

        match self.format {
            LogFormat::Json => fmt().json().with_env_filter(filter).try_init(),
            LogFormat::Pretty => fmt().with_env_filter(filter).try_init(),
        }
    }
}

/// `[retry]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySettings {
    pub enabled: bool,
    /// Total invocations, first call included.
    pub budget: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    pub jitter: bool,
    pub transient_statuses: Vec<u16>,
    pub retry_on_connect: bool,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let config = RetryConfig::default();
        Self {
            enabled: config.enabled,
            budget: config.max_retries + 1,
            backoff_base_ms: 200,
            backoff_max_ms: 3_000,
            jitter: true,
            transient_statuses: config.retry_on_status,
            retry_on_connect: config.retry_on_connect,
        }
    }
}

impl RetrySettings {
    pub fn to_config(&self) -> Result<RetryConfig, ConfigError> {
        if self.budget == 0 {
            return Err(ConfigError::ZeroRetryBudget);
        }
        Ok(RetryConfig {
            enabled: self.enabled,
            max_retries: self.budget - 1,
            backoff: Backoff::Exponential {
                base: Duration::from_millis(self.backoff_base_ms),
                factor: 2.0,
                max: Duration::from_millis(self.backoff_max_ms.max(self.backoff_base_ms)),
                jitter: self.jitter,
            },
            retry_on_status: self.transient_statuses.clone(),
            retry_on_connect: self.retry_on_connect,
        })
    }
}

/// One key pair in the settings file.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CredentialSettings {
    pub api_key: String,
    pub api_secret: String,
}

impl std::fmt::Debug for CredentialSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialSettings")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

/// `[exchanges.<name>]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExchangeSettings {
    pub enabled: bool,
    pub public_url: Option<String>,
    pub private_url: Option<String>,
    pub credentials: Vec<CredentialSettings>,
    /// Error classification overrides keyed by exchange error code.
    pub errors: BTreeMap<String, ErrorRule>,
    /// Normalized symbol to exchange pair name.
    pub symbols: BTreeMap<String, String>,
    /// Normalized asset to exchange asset code.
    pub assets: BTreeMap<String, String>,
}

impl Default for ExchangeSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            public_url: None,
            private_url: None,
            credentials: Vec::new(),
            errors: BTreeMap::new(),
            symbols: BTreeMap::new(),
            assets: BTreeMap::new(),
        }
    }
}

impl ExchangeSettings {
    pub fn classifier(&self, exchange: ExchangeId) -> ErrorClassifier {
        ErrorClassifier::defaults(exchange).with_overrides(&self.errors)
    }

    pub fn translation_tables(&self) -> Result<TranslationTables, ConfigError> {
        Ok(TranslationTables::new(
            SymbolMap::from_pairs(self.symbols.iter().map(|(k, v)| (k.as_str(), v.as_str())))?,
            AssetMap::from_pairs(self.assets.iter().map(|(k, v)| (k.as_str(), v.as_str())))?,
        ))
    }

    /// File credentials followed by those found through `lookup`.
    pub fn credentials(
        &self,
        exchange: ExchangeId,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Vec<Credential> {
        self.credentials
            .iter()
            .map(|c| Credential::new(c.api_key.clone(), c.api_secret.clone()))
            .chain(env_credentials(exchange, lookup))
            .collect()
    }
}

/// Credentials named `<PREFIX>_API_KEY[_n]` / `<PREFIX>_API_SECRET[_n]`.
///
/// Numbered pairs are read from `_1` upward until the first gap.
pub fn env_credentials(
    exchange: ExchangeId,
    lookup: impl Fn(&str) -> Option<String>,
) -> Vec<Credential> {
    let prefix = exchange.env_prefix();
    let pair = |suffix: &str| {
        let key = lookup(&format!("{prefix}_API_KEY{suffix}"))?;
        let secret = lookup(&format!("{prefix}_API_SECRET{suffix}"))?;
        Some(Credential::new(key, secret))
    };

    let mut credentials: Vec<Credential> = pair("").into_iter().collect();
    credentials.extend((1..).map_while(|n| pair(&format!("_{n}"))));
    credentials
}

/// Top-level settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub logging: LoggingConfig,
    pub retry: RetrySettings,
    /// Per-request transport timeout.
    pub timeout_ms: u64,
    /// Bound on a whole invocation, retries included.
    pub deadline_ms: Option<u64>,
    pub exchanges: BTreeMap<ExchangeId, ExchangeSettings>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            retry: RetrySettings::default(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            deadline_ms: None,
            exchanges: BTreeMap::new(),
        }
    }
}

impl Settings {
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let settings: Self = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read a settings file, loading `.env` first.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse_toml(&content)
    }

    /// Settings for one exchange, defaults when the section is absent.
    pub fn exchange(&self, exchange: ExchangeId) -> ExchangeSettings {
        self.exchanges.get(&exchange).cloned().unwrap_or_default()
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.retry.to_config()?;
        for (exchange, section) in &self.exchanges {
            section.translation_tables()?;
            for credential in &section.credentials {
                if credential.api_key.is_empty() || credential.api_secret.is_empty() {
                    return Err(ConfigError::MalformedSecret {
                        exchange: *exchange,
                        reason: String::from("api_key and api_secret must be non-empty"),
                    });
                }
            }
        }
        Ok(())
    }
}
