//! Bidirectional translation between normalized names and exchange codes.
//!
//! Tables are read-only once built. Adapters receive them at construction,
//! typically from a prior `symbols` call via
//! [`SymbolsResponse::translation_tables`].

use std::collections::BTreeMap;

use crate::{Asset, ConfigError, ExchangeId, Symbol, SymbolsResponse, ValidationError};

/// Normalized symbol to exchange pair name (`XBT-USD` <-> `XXBTZUSD`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolMap {
    to_exchange: BTreeMap<Symbol, String>,
    from_exchange: BTreeMap<String, Symbol>,
}

impl SymbolMap {
    pub fn new(
        entries: impl IntoIterator<Item = (Symbol, String)>,
    ) -> Result<Self, ConfigError> {
        let mut map = Self::default();
        for (symbol, pair) in entries {
            if map.to_exchange.contains_key(&symbol) {
                return Err(ConfigError::DuplicateTranslation {
                    value: symbol.to_string(),
                });
            }
            if map.from_exchange.contains_key(&pair) {
                return Err(ConfigError::DuplicateTranslation { value: pair });
            }
            map.from_exchange.insert(pair.clone(), symbol.clone());
            map.to_exchange.insert(symbol, pair);
        }
        Ok(map)
    }

    /// Build from raw `(normalized, exchange)` string pairs.
    pub fn from_pairs<'a>(
        entries: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Self, ConfigError> {
        let parsed = entries
            .into_iter()
            .map(|(symbol, pair)| Ok((Symbol::parse(symbol)?, pair.to_owned())))
            .collect::<Result<Vec<_>, ValidationError>>()?;
        Self::new(parsed)
    }

    pub fn to_exchange(&self, symbol: &Symbol, exchange: ExchangeId) -> Result<&str, ValidationError> {
        self.to_exchange
            .get(symbol)
            .map(String::as_str)
            .ok_or_else(|| ValidationError::UnknownSymbol {
                symbol: symbol.to_string(),
                exchange,
            })
    }

    pub fn from_exchange(&self, pair: &str) -> Result<&Symbol, ValidationError> {
        self.from_exchange
            .get(pair)
            .ok_or_else(|| ValidationError::UnknownPair {
                pair: pair.to_owned(),
            })
    }

    pub fn len(&self) -> usize {
        self.to_exchange.len()
    }

    pub fn is_empty(&self) -> bool {
        self.to_exchange.is_empty()
    }
}

/// Normalized asset to exchange asset code (`XBT` <-> `XXBT`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetMap {
    to_exchange: BTreeMap<Asset, String>,
    from_exchange: BTreeMap<String, Asset>,
}

impl AssetMap {
    pub fn new(entries: impl IntoIterator<Item = (Asset, String)>) -> Result<Self, ConfigError> {
        let mut map = Self::default();
        for (asset, code) in entries {
            if map.to_exchange.contains_key(&asset) {
                return Err(ConfigError::DuplicateTranslation {
                    value: asset.to_string(),
                });
            }
            if map.from_exchange.contains_key(&code) {
                return Err(ConfigError::DuplicateTranslation { value: code });
            }
            map.from_exchange.insert(code.clone(), asset.clone());
            map.to_exchange.insert(asset, code);
        }
        Ok(map)
    }

    pub fn from_pairs<'a>(
        entries: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Self, ConfigError> {
        let parsed = entries
            .into_iter()
            .map(|(asset, code)| Ok((Asset::parse(asset)?, code.to_owned())))
            .collect::<Result<Vec<_>, ValidationError>>()?;
        Self::new(parsed)
    }

    pub fn to_exchange(&self, asset: &Asset) -> Result<&str, ValidationError> {
        self.to_exchange
            .get(asset)
            .map(String::as_str)
            .ok_or_else(|| ValidationError::UnknownAsset {
                value: asset.to_string(),
            })
    }

    pub fn from_exchange(&self, code: &str) -> Result<&Asset, ValidationError> {
        self.from_exchange
            .get(code)
            .ok_or_else(|| ValidationError::UnknownAsset {
                value: code.to_owned(),
            })
    }

    pub fn len(&self) -> usize {
        self.to_exchange.len()
    }

    pub fn is_empty(&self) -> bool {
        self.to_exchange.is_empty()
    }
}

/// Symbol and asset tables injected into an adapter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslationTables {
    pub symbols: SymbolMap,
    pub assets: AssetMap,
}

impl TranslationTables {
    pub fn new(symbols: SymbolMap, assets: AssetMap) -> Self {
        Self { symbols, assets }
    }
}

impl SymbolsResponse {
    /// Derive the translation tables a `symbols` call describes.
    pub fn translation_tables(&self) -> Result<TranslationTables, ConfigError> {
        let symbols = SymbolMap::new(
            self.asset_pairs
                .iter()
                .map(|(symbol, info)| (symbol.clone(), info.exchange_name.clone())),
        )?;
        let assets = AssetMap::new(
            self.assets
                .iter()
                .map(|(asset, code)| (asset.clone(), code.clone())),
        )?;
        Ok(TranslationTables::new(symbols, assets))
    }
}
