//! Contract tests run against every exchange adapter.
//!
//! Adapters are built from settings the way production code builds them, with
//! a scripted transport in place of the network.

use std::sync::Arc;

use noobit_markets::{
    ErrorKind, ExchangeId, ExchangeRegistry, OhlcRequest, OhlcResponse, Operation,
    OperationRequest, OrderBookRequest, ScriptedHttpClient, Settings, SpreadRequest, Symbol,
    TradesRequest, Visibility,
};

const SETTINGS: &str = r#"
[retry]
budget = 1

[exchanges.kraken]
credentials = [{ api_key = "kraken-key", api_secret = "c2VjcmV0LXNlY3JldA==" }]
symbols = { "XBT-USD" = "XXBTZUSD" }

[exchanges.binance]
credentials = [{ api_key = "binance-key", api_secret = "secret" }]
symbols = { "XBT-USD" = "XBTUSDT" }

[exchanges.ftx]
credentials = [{ api_key = "ftx-key", api_secret = "secret" }]
symbols = { "XBT-USD" = "XBT/USD" }
"#;

fn registry(http: &Arc<ScriptedHttpClient>) -> ExchangeRegistry {
    ExchangeRegistry::builder()
        .with_settings(Settings::parse_toml(SETTINGS).expect("valid settings"))
        .with_http_client(http.clone())
        .build()
        .expect("registry builds")
}

fn symbol() -> Symbol {
    Symbol::parse("XBT-USD").expect("valid symbol")
}

fn request_for(operation: Operation) -> OperationRequest {
    match operation {
        Operation::Ohlc => {
            OperationRequest::Ohlc(OhlcRequest::parse("XBT-USD", "1H").expect("valid request"))
        }
        Operation::Spread => OperationRequest::Spread(SpreadRequest::new(symbol())),
        Operation::Orderbook => OperationRequest::Orderbook(
            OrderBookRequest::new(symbol(), Some(10)).expect("valid request"),
        ),
        Operation::Symbols => OperationRequest::Symbols,
        Operation::Balances => OperationRequest::Balances,
        Operation::Exposure => OperationRequest::Exposure,
        Operation::Trades => OperationRequest::Trades(TradesRequest::all()),
    }
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime")
        .block_on(future)
}

#[test]
fn supported_operations_reach_the_transport_exactly_once() {
    for exchange in ExchangeId::ALL {
        for operation in Operation::ALL {
            let http = Arc::new(ScriptedHttpClient::new());
            http.push_status(400, "{}");
            let registry = registry(&http);
            let adapter = registry.get(exchange).expect("adapter registered");
            if !adapter.capabilities().supports(operation) {
                continue;
            }

            let err = block_on(registry.invoke(exchange, request_for(operation)))
                .expect_err("scripted 400");

            assert_eq!(err.kind(), ErrorKind::Transport, "{exchange} {operation}");
            assert_eq!(err.status(), Some(400), "{exchange} {operation}");
            assert_eq!(http.call_count(), 1, "{exchange} {operation}");

            let sent = err.request().expect("request attached");
            assert!(sent.url.starts_with("https://"), "{exchange} {operation}");
            if operation.visibility() == Visibility::Private {
                let signed = sent
                    .headers
                    .values()
                    .any(|value| value == "<redacted>");
                assert!(signed, "{exchange} {operation}: credentials must be sent");
            }
        }
    }
}

#[test]
fn unsupported_operations_fail_without_network_calls() {
    let mut unsupported = 0;
    for exchange in ExchangeId::ALL {
        for operation in Operation::ALL {
            let http = Arc::new(ScriptedHttpClient::new());
            let registry = registry(&http);
            if registry
                .supports(exchange, operation.as_str())
                .expect("known operation")
            {
                continue;
            }
            unsupported += 1;

            let err = block_on(registry.invoke(exchange, request_for(operation)))
                .expect_err("unsupported");

            assert_eq!(err.kind(), ErrorKind::UnsupportedOperation, "{exchange} {operation}");
            assert!(!err.retryable());
            assert_eq!(http.call_count(), 0, "{exchange} {operation}");
        }
    }
    // binance and ftx each lack spread, orderbook, symbols, exposure and trades
    assert_eq!(unsupported, 10);
}

#[test]
fn kraken_supports_every_operation() {
    let http = Arc::new(ScriptedHttpClient::new());
    let registry = registry(&http);
    let adapter = registry.get(ExchangeId::Kraken).expect("kraken registered");

    assert_eq!(
        adapter.capabilities().supported_operations(),
        vec!["ohlc", "spread", "orderbook", "symbols", "balances", "exposure", "trades"]
    );
}

#[test]
fn ohlc_output_is_identical_across_exchanges() {
    let bodies = [
        (
            ExchangeId::Kraken,
            r#"{"error": [], "result": {"XXBTZUSD": [[1600000000, "100.5", "101", "100", "100.8", "100.6", "2.5", 7]], "last": 1600000000}}"#,
        ),
        (
            ExchangeId::Binance,
            r#"[[1600000000000, "100.5", "101", "100", "100.8", "2.5", 1600003599999, "251.5", 7, "1.2", "120.6", "0"]]"#,
        ),
        (
            ExchangeId::Ftx,
            r#"{"success": true, "result": [{"startTime": "2020-09-13T12:26:40+00:00", "time": 1600000000000.0, "open": 100.5, "high": 101.0, "low": 100.0, "close": 100.8, "volume": 2.5}]}"#,
        ),
    ];

    let responses: Vec<(ExchangeId, OhlcResponse)> = bodies
        .into_iter()
        .map(|(exchange, body)| {
            let http = Arc::new(ScriptedHttpClient::new());
            http.push_json(body);
            let registry = registry(&http);
            let adapter = registry.get(exchange).expect("adapter registered");
            let response = block_on(
                adapter.ohlc(OhlcRequest::parse("XBT-USD", "1H").expect("valid request")),
            )
            .unwrap_or_else(|error| panic!("{exchange} ohlc failed: {error}"));
            (exchange, response)
        })
        .collect();

    let (_, reference) = &responses[0];
    for (exchange, response) in &responses[1..] {
        assert_eq!(response.ohlc.len(), 1, "{exchange}");
        let (expected, actual) = (&reference.ohlc[0], &response.ohlc[0]);
        assert_eq!(actual.symbol, expected.symbol, "{exchange}");
        assert_eq!(actual.utc_time, expected.utc_time, "{exchange}");
        assert_eq!(actual.open, expected.open, "{exchange}");
        assert_eq!(actual.high, expected.high, "{exchange}");
        assert_eq!(actual.low, expected.low, "{exchange}");
        assert_eq!(actual.close, expected.close, "{exchange}");
        assert_eq!(actual.volume, expected.volume, "{exchange}");
    }

    let trade_counts: Vec<Option<u64>> = responses
        .iter()
        .map(|(_, response)| response.ohlc[0].trd_count)
        .collect();
    assert_eq!(trade_counts, vec![Some(7), Some(7), None]);
}
