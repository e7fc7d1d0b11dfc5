use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::Validate;
use crate::exchange::Operation;
use crate::mappings::TranslationTables;
use crate::pipeline::{from_payload, RestOperation};
use crate::{
    ExchangeId, OrdType, Side, TradeItem, TradesRequest, TradesResponse, UtcMillis,
    ValidationError,
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub(crate) struct KrakenTradesHistoryRequest {}

impl Validate for KrakenTradesHistoryRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub(crate) struct KrakenTrade {
    pub ordertxid: String,
    pub pair: String,
    pub time: f64,
    #[serde(rename = "type")]
    pub side: Side,
    pub ordertype: OrdType,
    pub price: Decimal,
    pub cost: Decimal,
    pub fee: Decimal,
    pub vol: Decimal,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub(crate) struct KrakenTradesHistory {
    pub trades: BTreeMap<String, KrakenTrade>,
    #[serde(default)]
    pub count: u64,
}

pub(crate) struct KrakenTrades<'a> {
    pub tables: &'a TranslationTables,
}

impl RestOperation for KrakenTrades<'_> {
    const OPERATION: Operation = Operation::Trades;

    type Request = TradesRequest;
    type ExchangeRequest = KrakenTradesHistoryRequest;
    type ExchangeResponse = KrakenTradesHistory;
    type Response = TradesResponse;

    fn map_request(
        &self,
        request: &TradesRequest,
    ) -> Result<KrakenTradesHistoryRequest, ValidationError> {
        if let Some(symbol) = &request.symbol {
            self.tables.symbols.to_exchange(symbol, ExchangeId::Kraken)?;
        }
        Ok(KrakenTradesHistoryRequest::default())
    }

    fn parse_payload(
        &self,
        _request: &KrakenTradesHistoryRequest,
        result: Value,
    ) -> Result<KrakenTradesHistory, ValidationError> {
        from_payload(result)
    }

    fn map_response(
        &self,
        request: &TradesRequest,
        _exchange_request: &KrakenTradesHistoryRequest,
        response: KrakenTradesHistory,
    ) -> Result<TradesResponse, ValidationError> {
        let wanted = request
            .symbol
            .as_ref()
            .map(|symbol| self.tables.symbols.to_exchange(symbol, ExchangeId::Kraken))
            .transpose()?;

        tracing::debug!(count = response.count, "kraken trades history received");

        let mut trades = Vec::with_capacity(response.trades.len());
        for (txid, trade) in response.trades {
            if wanted.is_some_and(|pair| pair != trade.pair) {
                continue;
            }
            // delisted pairs and pairs without a wsname are absent from the table
            let Ok(symbol) = self.tables.symbols.from_exchange(&trade.pair) else {
                tracing::warn!(pair = %trade.pair, txid = %txid, "skipping trade on untranslated pair");
                continue;
            };
            trades.push(TradeItem {
                trd_match_id: txid,
                order_id: trade.ordertxid,
                symbol: symbol.clone(),
                side: trade.side,
                ord_type: trade.ordertype,
                avg_px: trade.price,
                cum_qty: trade.vol,
                gross_trade_amt: trade.cost,
                commission: trade.fee,
                transact_time: UtcMillis::from_fractional_seconds(trade.time)?,
            });
        }

        trades.sort_by_key(|trade| trade.transact_time);
        Ok(TradesResponse { trades })
    }
}
