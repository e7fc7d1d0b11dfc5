use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::Validate;
use crate::exchange::Operation;
use crate::mappings::TranslationTables;
use crate::pipeline::{from_payload, RestOperation};
use crate::{Asset, Balances, ValidationError};

const RECV_WINDOW_MS: u32 = 5_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BinanceAccountRequest {
    pub recv_window: u32,
}

impl Validate for BinanceAccountRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.recv_window == 0 || self.recv_window > 60_000 {
            return Err(ValidationError::OutOfRange {
                field: "recvWindow",
                value: i64::from(self.recv_window),
                min: 1,
                max: 60_000,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub(crate) struct BinanceBalance {
    pub asset: String,
    pub free: Decimal,
    pub locked: Decimal,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub(crate) struct BinanceAccount {
    pub balances: Vec<BinanceBalance>,
}

pub(crate) struct BinanceBalances<'a> {
    pub tables: &'a TranslationTables,
}

impl RestOperation for BinanceBalances<'_> {
    const OPERATION: Operation = Operation::Balances;

    type Request = ();
    type ExchangeRequest = BinanceAccountRequest;
    type ExchangeResponse = BinanceAccount;
    type Response = Balances;

    fn map_request(&self, _request: &()) -> Result<BinanceAccountRequest, ValidationError> {
        Ok(BinanceAccountRequest {
            recv_window: RECV_WINDOW_MS,
        })
    }

    fn parse_payload(
        &self,
        _request: &BinanceAccountRequest,
        result: Value,
    ) -> Result<BinanceAccount, ValidationError> {
        from_payload(result)
    }

    fn map_response(
        &self,
        _request: &(),
        _exchange_request: &BinanceAccountRequest,
        response: BinanceAccount,
    ) -> Result<Balances, ValidationError> {
        let mut data = BTreeMap::new();
        // the account endpoint lists every listed coin, most at zero
        for balance in response.balances {
            let total = balance.free + balance.locked;
            if total.is_zero() {
                continue;
            }
            let asset = match self.tables.assets.from_exchange(&balance.asset) {
                Ok(asset) => asset.clone(),
                Err(_) => Asset::parse(&balance.asset)?,
            };
            data.insert(asset, total);
        }
        Ok(Balances { data })
    }
}
