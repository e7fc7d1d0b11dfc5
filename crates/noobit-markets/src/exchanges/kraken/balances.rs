use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;

use crate::domain::Validate;
use crate::exchange::Operation;
use crate::mappings::TranslationTables;
use crate::pipeline::{from_payload, RestOperation};
use crate::{Balances, ValidationError};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub(crate) struct KrakenBalanceRequest {}

impl Validate for KrakenBalanceRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

pub(crate) struct KrakenBalances<'a> {
    pub tables: &'a TranslationTables,
}

impl RestOperation for KrakenBalances<'_> {
    const OPERATION: Operation = Operation::Balances;

    type Request = ();
    type ExchangeRequest = KrakenBalanceRequest;
    type ExchangeResponse = BTreeMap<String, Decimal>;
    type Response = Balances;

    fn map_request(&self, _request: &()) -> Result<KrakenBalanceRequest, ValidationError> {
        Ok(KrakenBalanceRequest::default())
    }

    fn parse_payload(
        &self,
        _request: &KrakenBalanceRequest,
        result: Value,
    ) -> Result<BTreeMap<String, Decimal>, ValidationError> {
        from_payload(result)
    }

    fn map_response(
        &self,
        _request: &(),
        _exchange_request: &KrakenBalanceRequest,
        response: BTreeMap<String, Decimal>,
    ) -> Result<Balances, ValidationError> {
        let mut data = BTreeMap::new();
        for (code, amount) in response {
            // staking variants (DOT.S, ETH2.S) have no spot asset
            match self.tables.assets.from_exchange(&code) {
                Ok(asset) => {
                    data.insert(asset.clone(), amount);
                }
                Err(_) => tracing::warn!(code = %code, "skipping balance of untranslated asset"),
            }
        }
        Ok(Balances { data })
    }
}
