mod binance;
mod ftx;
mod kraken;

use std::sync::Arc;

pub use binance::{BinanceAdapter, BinanceWire};
pub use ftx::{FtxAdapter, FtxWire};
pub use kraken::{KrakenAdapter, KrakenWire};

use crate::pipeline::WireFormat;
use crate::ExchangeId;

pub(crate) fn wire_format(exchange: ExchangeId) -> Arc<dyn WireFormat> {
    match exchange {
        ExchangeId::Kraken => Arc::new(KrakenWire),
        ExchangeId::Binance => Arc::new(BinanceWire),
        ExchangeId::Ftx => Arc::new(FtxWire),
    }
}
