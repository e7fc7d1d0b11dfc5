use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::Validate;
use crate::{Asset, Symbol, UtcMillis, ValidationError};

// ============================================================
// OHLC
// ============================================================

/// One candle of the normalized OHLC response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OhlcItem {
    pub symbol: Symbol,
    pub utc_time: UtcMillis,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trd_count: Option<u64>,
}

impl OhlcItem {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        symbol: Symbol,
        utc_time: UtcMillis,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
        trd_count: Option<u64>,
    ) -> Result<Self, ValidationError> {
        validate_positive("open", open)?;
        validate_positive("high", high)?;
        validate_positive("low", low)?;
        validate_positive("close", close)?;
        validate_non_negative("volume", volume)?;

        if high < low {
            return Err(ValidationError::InvalidCandleRange);
        }

        Ok(Self {
            symbol,
            utc_time,
            open,
            high,
            low,
            close,
            volume,
            trd_count,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OhlcResponse {
    pub ohlc: Vec<OhlcItem>,
    pub last: UtcMillis,
}

impl Validate for OhlcResponse {
    fn validate(&self) -> Result<(), ValidationError> {
        ensure_ascending("ohlc", self.ohlc.iter().map(|item| item.utc_time))
    }
}

// ============================================================
// SPREAD
// ============================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpreadItem {
    pub symbol: Symbol,
    pub best_bid_price: Decimal,
    pub best_ask_price: Decimal,
    pub utc_time: UtcMillis,
}

impl SpreadItem {
    pub fn new(
        symbol: Symbol,
        best_bid_price: Decimal,
        best_ask_price: Decimal,
        utc_time: UtcMillis,
    ) -> Result<Self, ValidationError> {
        validate_positive("bestBidPrice", best_bid_price)?;
        validate_positive("bestAskPrice", best_ask_price)?;
        if best_bid_price > best_ask_price {
            return Err(ValidationError::CrossedSpread);
        }

        Ok(Self {
            symbol,
            best_bid_price,
            best_ask_price,
            utc_time,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpreadResponse {
    pub spread: Vec<SpreadItem>,
    pub last: UtcMillis,
}

impl Validate for SpreadResponse {
    fn validate(&self) -> Result<(), ValidationError> {
        ensure_ascending("spread", self.spread.iter().map(|item| item.utc_time))
    }
}

// ============================================================
// ORDER BOOK
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: Decimal,
    pub volume: Decimal,
}

impl BookLevel {
    pub fn new(price: Decimal, volume: Decimal) -> Result<Self, ValidationError> {
        validate_positive("price", price)?;
        validate_non_negative("volume", volume)?;
        Ok(Self { price, volume })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderBook {
    pub utc_time: UtcMillis,
    pub symbol: Symbol,
    pub asks: Vec<BookLevel>,
    pub bids: Vec<BookLevel>,
}

impl Validate for OrderBook {
    fn validate(&self) -> Result<(), ValidationError> {
        ensure_ascending("asks", self.asks.iter().map(|level| level.price))?;
        ensure_ascending("bids", self.bids.iter().rev().map(|level| level.price)).map_err(|_| {
            ValidationError::Unsorted {
                field: "bids",
                order: "descending price",
            }
        })
    }
}

// ============================================================
// SYMBOLS
// ============================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolInfo {
    pub exchange_name: String,
    pub ws_name: String,
    pub base: Asset,
    pub quote: Asset,
    pub volume_decimals: u32,
    pub price_decimals: u32,
    pub leverage_available: Vec<u32>,
    pub order_min: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolsResponse {
    pub asset_pairs: BTreeMap<Symbol, SymbolInfo>,
    /// Normalized asset to exchange asset code.
    pub assets: BTreeMap<Asset, String>,
}

impl Validate for SymbolsResponse {
    fn validate(&self) -> Result<(), ValidationError> {
        for (symbol, info) in &self.asset_pairs {
            for asset in [&info.base, &info.quote] {
                if !self.assets.contains_key(asset) {
                    return Err(ValidationError::UnexpectedShape {
                        reason: format!("pair {symbol} references unknown asset {asset}"),
                    });
                }
            }
            validate_non_negative("orderMin", info.order_min)?;
        }
        Ok(())
    }
}

// ============================================================
// BALANCES / EXPOSURE
// ============================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Balances {
    pub data: BTreeMap<Asset, Decimal>,
}

impl Validate for Balances {
    fn validate(&self) -> Result<(), ValidationError> {
        self.data
            .values()
            .try_for_each(|amount| validate_non_negative("balance", *amount))
    }
}

/// Account-wide margin and valuation summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exposure {
    pub total_net_value: Decimal,
    pub cash_outstanding: Decimal,
    pub margin_excess: Decimal,
    pub margin_amt: Decimal,
    #[serde(rename = "unrealisedPnL")]
    pub unrealised_pnl: Decimal,
    pub cost: Decimal,
    pub valuation: Decimal,
    pub equity: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub margin_ratio: Option<Decimal>,
}

impl Validate for Exposure {
    fn validate(&self) -> Result<(), ValidationError> {
        validate_non_negative("marginAmt", self.margin_amt)?;
        validate_non_negative("cost", self.cost)?;
        if let Some(ratio) = self.margin_ratio {
            validate_non_negative("marginRatio", ratio)?;
        }
        Ok(())
    }
}

// ============================================================
// TRADES
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Display for Side {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrdType {
    Market,
    Limit,
    StopLoss,
    TakeProfit,
    StopLossLimit,
    TakeProfitLimit,
    TrailingStop,
    TrailingStopLimit,
    SettlePosition,
    /// Order types this crate does not name yet.
    #[serde(other)]
    Other,
}

/// One fill of the caller's own trade history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeItem {
    #[serde(rename = "trdMatchID")]
    pub trd_match_id: String,
    #[serde(rename = "orderID")]
    pub order_id: String,
    pub symbol: Symbol,
    pub side: Side,
    pub ord_type: OrdType,
    pub avg_px: Decimal,
    pub cum_qty: Decimal,
    pub gross_trade_amt: Decimal,
    pub commission: Decimal,
    pub transact_time: UtcMillis,
}

impl TradeItem {
    pub fn validate_amounts(&self) -> Result<(), ValidationError> {
        validate_positive("avgPx", self.avg_px)?;
        validate_positive("cumQty", self.cum_qty)?;
        validate_non_negative("grossTradeAmt", self.gross_trade_amt)?;
        validate_non_negative("commission", self.commission)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradesResponse {
    pub trades: Vec<TradeItem>,
}

impl Validate for TradesResponse {
    fn validate(&self) -> Result<(), ValidationError> {
        for trade in &self.trades {
            trade.validate_amounts()?;
        }
        ensure_ascending("trades", self.trades.iter().map(|trade| trade.transact_time))
    }
}

fn validate_positive(field: &'static str, value: Decimal) -> Result<(), ValidationError> {
    if value <= Decimal::ZERO {
        return Err(ValidationError::NonPositiveValue { field });
    }
    Ok(())
}

fn validate_non_negative(field: &'static str, value: Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ValidationError::NegativeValue { field });
    }
    Ok(())
}

fn ensure_ascending<T: PartialOrd>(
    field: &'static str,
    values: impl Iterator<Item = T>,
) -> Result<(), ValidationError> {
    let mut previous: Option<T> = None;
    for value in values {
        if previous.as_ref().is_some_and(|prev| *prev > value) {
            return Err(ValidationError::Unsorted {
                field,
                order: "ascending order",
            });
        }
        previous = Some(value);
    }
    Ok(())
}
