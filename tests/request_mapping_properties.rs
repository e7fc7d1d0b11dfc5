//! Property tests: every valid normalized OHLC request maps to an exchange
//! request that passes the exchange-side schema and reaches the transport.

use std::sync::Arc;

use noobit_markets::{
    BinanceAdapter, ErrorKind, ExchangeContext, ExchangeId, ExchangeInterface, FtxAdapter,
    KrakenAdapter, OhlcRequest, RetryConfig, ScriptedHttpClient, Symbol, SymbolMap, Timeframe,
    TranslationTables, UtcMillis,
};
use proptest::prelude::*;

/// Normalized symbol, then the Kraken, Binance and FTX names.
type Row = (&'static str, &'static str, &'static str, &'static str);

const PAIRS: [Row; 3] = [
    ("XBT-USD", "XXBTZUSD", "XBTUSDT", "XBT/USD"),
    ("ETH-USD", "XETHZUSD", "ETHUSDT", "ETH/USD"),
    ("DOT-EUR", "DOTEUR", "DOTEUR", "DOT/EUR"),
];

fn tables(column: impl Fn(&Row) -> &'static str) -> TranslationTables {
    TranslationTables {
        symbols: SymbolMap::from_pairs(PAIRS.iter().map(|row| (row.0, column(row))))
            .expect("valid table"),
        ..TranslationTables::default()
    }
}

fn context(exchange: ExchangeId, http: &Arc<ScriptedHttpClient>) -> ExchangeContext {
    ExchangeContext::new(exchange, http.clone())
        .expect("default context")
        .with_retry(RetryConfig::no_retry())
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime")
}

fn ohlc_request() -> impl Strategy<Value = OhlcRequest> {
    (
        0..PAIRS.len(),
        0..Timeframe::ALL.len(),
        proptest::option::of(1_262_304_000_000_i64..2_524_608_000_000_i64),
    )
        .prop_map(|(pair, timeframe, since)| {
            let request = OhlcRequest::new(
                Symbol::parse(PAIRS[pair].0).expect("valid symbol"),
                Timeframe::ALL[timeframe],
            );
            match since {
                Some(millis) => {
                    request.with_since(UtcMillis::from_millis(millis).expect("in range"))
                }
                None => request,
            }
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn kraken_accepts_every_timeframe(request in ohlc_request()) {
        let http = Arc::new(ScriptedHttpClient::new());
        let pair = tables(|row| row.1)
            .symbols
            .to_exchange(&request.symbol, ExchangeId::Kraken)
            .expect("mapped")
            .to_owned();
        http.push_json(format!(
            r#"{{"error": [], "result": {{"{pair}": [], "last": 1600000000}}}}"#
        ));
        let adapter =
            KrakenAdapter::from_context(context(ExchangeId::Kraken, &http), tables(|row| row.1));

        let result = runtime().block_on(adapter.ohlc(request.clone()));

        prop_assert!(result.is_ok(), "{result:?}");
        let sent = http.requests();
        prop_assert_eq!(sent.len(), 1);
        let expected = format!("?interval={}&pair={pair}", request.timeframe.minutes());
        prop_assert!(sent[0].url.contains(&expected), "{}", sent[0].url);
    }

    #[test]
    fn binance_maps_supported_timeframes_and_rejects_the_rest(request in ohlc_request()) {
        let http = Arc::new(ScriptedHttpClient::new());
        http.push_json("[]");
        let adapter =
            BinanceAdapter::from_context(context(ExchangeId::Binance, &http), tables(|row| row.2));

        let result = runtime().block_on(adapter.ohlc(request.clone()));

        if request.timeframe == Timeframe::FifteenDays {
            let err = result.expect_err("unsupported timeframe");
            prop_assert_eq!(err.kind(), ErrorKind::Validation);
            prop_assert_eq!(http.call_count(), 0);
        } else {
            prop_assert!(result.is_ok(), "{result:?}");
            prop_assert_eq!(http.call_count(), 1);
            prop_assert!(http.requests()[0].url.contains("/api/v3/klines?"));
        }
    }

    #[test]
    fn ftx_maps_supported_timeframes_and_rejects_the_rest(request in ohlc_request()) {
        let http = Arc::new(ScriptedHttpClient::new());
        http.push_json(r#"{"success": true, "result": []}"#);
        let adapter =
            FtxAdapter::from_context(context(ExchangeId::Ftx, &http), tables(|row| row.3));

        let result = runtime().block_on(adapter.ohlc(request.clone()));

        if request.timeframe == Timeframe::ThirtyMinutes {
            let err = result.expect_err("unsupported timeframe");
            prop_assert_eq!(err.kind(), ErrorKind::Validation);
            prop_assert_eq!(http.call_count(), 0);
        } else {
            prop_assert!(result.is_ok(), "{result:?}");
            let sent = http.requests();
            prop_assert_eq!(sent.len(), 1);
            let resolution = format!("?resolution={}", request.timeframe.seconds());
            prop_assert!(sent[0].url.contains(&resolution));
        }
    }
}
