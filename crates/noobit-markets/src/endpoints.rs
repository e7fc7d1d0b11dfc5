use std::collections::BTreeMap;

use reqwest::Url;

use crate::exchange::{ExchangeId, Operation, Visibility};
use crate::http_client::HttpMethod;
use crate::ConfigError;

const KRAKEN_PUBLIC: &str = "https://api.kraken.com/0/public/";
const KRAKEN_PRIVATE: &str = "https://api.kraken.com/0/private/";
const BINANCE_BASE: &str = "https://api.binance.com/api/v3/";
const FTX_BASE: &str = "https://ftx.com/api/";

const KRAKEN_ROUTES: &[(Operation, HttpMethod, &str)] = &[
    (Operation::Ohlc, HttpMethod::Get, "OHLC"),
    (Operation::Spread, HttpMethod::Get, "Spread"),
    (Operation::Orderbook, HttpMethod::Get, "Depth"),
    (Operation::Symbols, HttpMethod::Get, "AssetPairs"),
    (Operation::Balances, HttpMethod::Post, "Balance"),
    (Operation::Exposure, HttpMethod::Post, "TradeBalance"),
    (Operation::Trades, HttpMethod::Post, "TradesHistory"),
];

const BINANCE_ROUTES: &[(Operation, HttpMethod, &str)] = &[
    (Operation::Ohlc, HttpMethod::Get, "klines"),
    (Operation::Balances, HttpMethod::Get, "account"),
];

const FTX_ROUTES: &[(Operation, HttpMethod, &str)] = &[
    (Operation::Ohlc, HttpMethod::Get, "markets/{market}/candles"),
    (Operation::Balances, HttpMethod::Get, "wallet/balances"),
];

/// One endpoint: method plus a path relative to the visibility's base url.
///
/// Paths may hold `{name}` placeholders filled per call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub visibility: Visibility,
    pub method: HttpMethod,
    pub path: String,
}

/// Static endpoint configuration of one exchange, validated once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointTable {
    exchange: ExchangeId,
    public_base: Url,
    private_base: Url,
    routes: BTreeMap<Operation, Route>,
}

impl EndpointTable {
    pub fn new(
        exchange: ExchangeId,
        public_base: &str,
        private_base: &str,
        routes: impl IntoIterator<Item = (Operation, HttpMethod, String)>,
    ) -> Result<Self, ConfigError> {
        let mut table = BTreeMap::new();
        for (operation, method, path) in routes {
            if path.is_empty() || path.starts_with('/') || path.contains("://") {
                return Err(ConfigError::MalformedEndpointTable {
                    exchange,
                    reason: format!("route '{operation}' must be a relative path, got '{path}'"),
                });
            }
            let route = Route {
                visibility: operation.visibility(),
                method,
                path,
            };
            if table.insert(operation, route).is_some() {
                return Err(ConfigError::MalformedEndpointTable {
                    exchange,
                    reason: format!("route '{operation}' is declared twice"),
                });
            }
        }

        Ok(Self {
            exchange,
            public_base: parse_base_url(public_base)?,
            private_base: parse_base_url(private_base)?,
            routes: table,
        })
    }

    /// Built-in table for an exchange's production API.
    pub fn defaults(exchange: ExchangeId) -> Result<Self, ConfigError> {
        let (public_base, private_base, routes) = match exchange {
            ExchangeId::Kraken => (KRAKEN_PUBLIC, KRAKEN_PRIVATE, KRAKEN_ROUTES),
            ExchangeId::Binance => (BINANCE_BASE, BINANCE_BASE, BINANCE_ROUTES),
            ExchangeId::Ftx => (FTX_BASE, FTX_BASE, FTX_ROUTES),
        };
        Self::new(
            exchange,
            public_base,
            private_base,
            routes
                .iter()
                .map(|(operation, method, path)| (*operation, *method, (*path).to_owned())),
        )
    }

    /// Replace the base urls, e.g. to target a sandbox.
    pub fn with_base_urls(
        mut self,
        public_base: Option<&str>,
        private_base: Option<&str>,
    ) -> Result<Self, ConfigError> {
        if let Some(value) = public_base {
            self.public_base = parse_base_url(value)?;
        }
        if let Some(value) = private_base {
            self.private_base = parse_base_url(value)?;
        }
        Ok(self)
    }

    pub const fn exchange(&self) -> ExchangeId {
        self.exchange
    }

    pub fn route(&self, operation: Operation) -> Option<&Route> {
        self.routes.get(&operation)
    }

    pub fn operations(&self) -> impl Iterator<Item = Operation> + '_ {
        self.routes.keys().copied()
    }

    pub fn base_url(&self, visibility: Visibility) -> &Url {
        match visibility {
            Visibility::Public => &self.public_base,
            Visibility::Private => &self.private_base,
        }
    }

    /// Absolute url of a route whose placeholders are already substituted.
    pub fn url(&self, route: &Route, path: &str) -> Result<Url, ConfigError> {
        self.base_url(route.visibility)
            .join(path)
            .map_err(|e| ConfigError::MalformedEndpointTable {
                exchange: self.exchange,
                reason: format!("cannot join '{path}': {e}"),
            })
    }
}

fn parse_base_url(value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value).map_err(|e| ConfigError::InvalidBaseUrl {
        value: value.to_owned(),
        reason: e.to_string(),
    })?;
    if url.scheme() != "https" {
        return Err(ConfigError::InvalidBaseUrl {
            value: value.to_owned(),
            reason: String::from("scheme must be https"),
        });
    }
    if !url.path().ends_with('/') {
        return Err(ConfigError::InvalidBaseUrl {
            value: value.to_owned(),
            reason: String::from("path must end with '/'"),
        });
    }
    Ok(url)
}
