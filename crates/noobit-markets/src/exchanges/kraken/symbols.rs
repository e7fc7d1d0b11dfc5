use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::Validate;
use crate::exchange::Operation;
use crate::pipeline::{from_payload, RestOperation};
use crate::{Asset, Symbol, SymbolInfo, SymbolsResponse, ValidationError};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub(crate) struct KrakenAssetPairsRequest {}

impl Validate for KrakenAssetPairsRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub(crate) struct KrakenPairInfo {
    #[serde(default)]
    pub wsname: Option<String>,
    pub base: String,
    pub quote: String,
    pub pair_decimals: u32,
    pub lot_decimals: u32,
    #[serde(default)]
    pub leverage_buy: Vec<u32>,
    #[serde(default)]
    pub ordermin: Option<Decimal>,
}

pub(crate) struct KrakenSymbols;

impl RestOperation for KrakenSymbols {
    const OPERATION: Operation = Operation::Symbols;

    type Request = ();
    type ExchangeRequest = KrakenAssetPairsRequest;
    type ExchangeResponse = BTreeMap<String, KrakenPairInfo>;
    type Response = SymbolsResponse;

    fn map_request(&self, _request: &()) -> Result<KrakenAssetPairsRequest, ValidationError> {
        Ok(KrakenAssetPairsRequest::default())
    }

    fn parse_payload(
        &self,
        _request: &KrakenAssetPairsRequest,
        result: Value,
    ) -> Result<BTreeMap<String, KrakenPairInfo>, ValidationError> {
        from_payload(result)
    }

    fn map_response(
        &self,
        _request: &(),
        _exchange_request: &KrakenAssetPairsRequest,
        response: BTreeMap<String, KrakenPairInfo>,
    ) -> Result<SymbolsResponse, ValidationError> {
        let mut asset_pairs = BTreeMap::new();
        let mut assets = BTreeMap::new();

        // dark pool books (".d") mirror a regular pair
        for (name, info) in response.into_iter().filter(|(name, _)| !name.ends_with(".d")) {
            let Some((base, quote)) = normalized_assets(&info) else {
                tracing::debug!(pair = %name, "skipping pair without a usable wsname");
                continue;
            };

            assets.entry(base.clone()).or_insert_with(|| info.base.clone());
            assets.entry(quote.clone()).or_insert_with(|| info.quote.clone());

            let symbol = Symbol::from_assets(&base, &quote);
            asset_pairs.insert(
                symbol,
                SymbolInfo {
                    exchange_name: name,
                    ws_name: info.wsname.clone().unwrap_or_default(),
                    base,
                    quote,
                    volume_decimals: info.lot_decimals,
                    price_decimals: info.pair_decimals,
                    leverage_available: info.leverage_buy,
                    order_min: info.ordermin.unwrap_or_default(),
                },
            );
        }

        Ok(SymbolsResponse {
            asset_pairs,
            assets,
        })
    }
}

fn normalized_assets(info: &KrakenPairInfo) -> Option<(Asset, Asset)> {
    let (base, quote) = info.wsname.as_deref()?.split_once('/')?;
    Some((Asset::parse(base).ok()?, Asset::parse(quote).ok()?))
}
