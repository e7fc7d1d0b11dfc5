use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::Validate;
use crate::exchange::Operation;
use crate::pipeline::{from_payload, RestOperation};
use crate::{Exposure, ValidationError};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub(crate) struct KrakenTradeBalanceRequest {}

impl Validate for KrakenTradeBalanceRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

/// TradeBalance result. Position fields are absent without open margin.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub(crate) struct KrakenTradeBalance {
    /// equivalent balance
    pub eb: Decimal,
    /// trade balance
    pub tb: Decimal,
    #[serde(default)]
    pub m: Decimal,
    #[serde(default)]
    pub n: Decimal,
    #[serde(default)]
    pub c: Decimal,
    #[serde(default)]
    pub v: Decimal,
    pub e: Decimal,
    pub mf: Decimal,
    #[serde(default)]
    pub ml: Option<Decimal>,
}

pub(crate) struct KrakenExposure;

impl RestOperation for KrakenExposure {
    const OPERATION: Operation = Operation::Exposure;

    type Request = ();
    type ExchangeRequest = KrakenTradeBalanceRequest;
    type ExchangeResponse = KrakenTradeBalance;
    type Response = Exposure;

    fn map_request(&self, _request: &()) -> Result<KrakenTradeBalanceRequest, ValidationError> {
        Ok(KrakenTradeBalanceRequest::default())
    }

    fn parse_payload(
        &self,
        _request: &KrakenTradeBalanceRequest,
        result: Value,
    ) -> Result<KrakenTradeBalance, ValidationError> {
        from_payload(result)
    }

    fn map_response(
        &self,
        _request: &(),
        _exchange_request: &KrakenTradeBalanceRequest,
        response: KrakenTradeBalance,
    ) -> Result<Exposure, ValidationError> {
        Ok(Exposure {
            total_net_value: response.eb,
            cash_outstanding: response.tb,
            margin_excess: response.mf,
            margin_amt: response.m,
            unrealised_pnl: response.n,
            cost: response.c,
            valuation: response.v,
            equity: response.e,
            margin_ratio: response.ml,
        })
    }
}
