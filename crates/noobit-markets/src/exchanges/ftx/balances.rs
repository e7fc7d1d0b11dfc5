use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::Validate;
use crate::exchange::Operation;
use crate::mappings::TranslationTables;
use crate::pipeline::{from_payload, RestOperation};
use crate::{Asset, Balances, ValidationError};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub(crate) struct FtxWalletRequest {}

impl Validate for FtxWalletRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub(crate) struct FtxCoinBalance {
    pub coin: String,
    pub free: Decimal,
    pub total: Decimal,
}

pub(crate) struct FtxBalances<'a> {
    pub tables: &'a TranslationTables,
}

impl RestOperation for FtxBalances<'_> {
    const OPERATION: Operation = Operation::Balances;

    type Request = ();
    type ExchangeRequest = FtxWalletRequest;
    type ExchangeResponse = Vec<FtxCoinBalance>;
    type Response = Balances;

    fn map_request(&self, _request: &()) -> Result<FtxWalletRequest, ValidationError> {
        Ok(FtxWalletRequest::default())
    }

    fn parse_payload(
        &self,
        _request: &FtxWalletRequest,
        result: Value,
    ) -> Result<Vec<FtxCoinBalance>, ValidationError> {
        from_payload(result)
    }

    fn map_response(
        &self,
        _request: &(),
        _exchange_request: &FtxWalletRequest,
        response: Vec<FtxCoinBalance>,
    ) -> Result<Balances, ValidationError> {
        let mut data = BTreeMap::new();
        for balance in response.into_iter().filter(|b| !b.total.is_zero()) {
            let asset = match self.tables.assets.from_exchange(&balance.coin) {
                Ok(asset) => asset.clone(),
                Err(_) => Asset::parse(&balance.coin)?,
            };
            tracing::trace!(%asset, free = %balance.free, total = %balance.total, "ftx balance");
            data.insert(asset, balance.total);
        }
        Ok(Balances { data })
    }
}
