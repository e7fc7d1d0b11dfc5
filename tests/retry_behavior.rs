//! Behavior tests for the retry and deadline combinators.

use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use noobit_markets::{
    with_deadline, Backoff, ErrorEnvelope, ErrorKind, ErrorPayload, ExchangeContext,
    ExchangeError, ExchangeId, ExchangeInterface, KrakenAdapter, NoobitResult, OhlcRequest,
    Retry, RetryConfig, ScriptedHttpClient, SymbolMap, TranslationTables, ValidationError,
};
use parking_lot::Mutex;

fn budget(n: u32) -> NonZeroU32 {
    NonZeroU32::new(n).expect("non-zero budget")
}

fn zero_backoff(n: u32) -> Retry {
    Retry::new(budget(n)).with_backoff(Backoff::Fixed {
        delay: Duration::ZERO,
    })
}

fn transient_now() -> ErrorEnvelope {
    ErrorEnvelope::exchange(
        ErrorPayload::List(vec![ExchangeError::transient(
            "EAPI:Invalid nonce",
            "",
            Some(Duration::ZERO),
        )]),
        None,
    )
}

// =============================================================================
// Retry: terminal failures
// =============================================================================

#[tokio::test]
async fn when_operation_fails_validation_it_runs_exactly_once() {
    let calls = AtomicU32::new(0);
    let retry = zero_backoff(5);

    let result: NoobitResult<()> = retry
        .run(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ErrorEnvelope::from(ValidationError::EmptySymbol)) }
        })
        .await;

    assert_eq!(result.expect_err("validation").kind(), ErrorKind::Validation);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn when_single_error_has_no_sleep_hint_it_is_not_retried() {
    let calls = AtomicU32::new(0);
    let retry = zero_backoff(5);

    let result: NoobitResult<()> = retry
        .run(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(ErrorEnvelope::exchange(
                    ErrorPayload::Single(ExchangeError::transient("-1000", "unknown", None)),
                    None,
                ))
            }
        })
        .await;

    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn when_several_errors_are_reported_the_failure_is_terminal() {
    let calls = AtomicU32::new(0);
    let retry = zero_backoff(5);

    let result: NoobitResult<()> = retry
        .run(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(ErrorEnvelope::exchange(
                    ErrorPayload::List(vec![
                        ExchangeError::transient("EAPI:Rate limit exceeded", "", Some(Duration::ZERO)),
                        ExchangeError::terminal("EOrder:Insufficient funds", ""),
                    ]),
                    None,
                ))
            }
        })
        .await;

    assert!(!result.expect_err("terminal").retryable());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

// =============================================================================
// Retry: transient failures
// =============================================================================

#[tokio::test]
async fn transient_failures_then_success_take_failures_plus_one_invocations() {
    for failures in 0..4_u32 {
        let calls = AtomicU32::new(0);
        let retry = zero_backoff(5);

        let result = retry
            .run(|| {
                let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if call <= failures {
                        Err(transient_now())
                    } else {
                        Ok(call)
                    }
                }
            })
            .await;

        assert_eq!(result.expect("eventually succeeds"), failures + 1);
        assert_eq!(calls.load(Ordering::SeqCst), failures + 1);
    }
}

#[tokio::test]
async fn persistent_transient_failure_stops_at_the_budget() {
    let calls = AtomicU32::new(0);
    let retry = zero_backoff(3);

    let result: NoobitResult<()> = retry
        .run(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(transient_now()) }
        })
        .await;

    let err = result.expect_err("budget exhausted");
    assert_eq!(err.kind(), ErrorKind::Exchange);
    assert!(err.retryable(), "last error is returned unchanged");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn sink_sees_every_retry_with_the_hinted_sleep() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&events);
    let retry = zero_backoff(4).with_sink(move |event| {
        recorded.lock().push((event.attempt, event.budget, event.sleep));
    });

    let _: NoobitResult<()> = retry.run(|| async { Err(transient_now()) }).await;

    assert_eq!(
        *events.lock(),
        vec![
            (1, 4, Duration::ZERO),
            (2, 4, Duration::ZERO),
            (3, 4, Duration::ZERO),
        ]
    );
}

#[tokio::test]
async fn transient_status_without_hint_uses_backoff() {
    let sleeps = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&sleeps);
    let retry = Retry::new(budget(2))
        .with_backoff(Backoff::Fixed {
            delay: Duration::from_millis(5),
        })
        .with_sink(move |event| recorded.lock().push(event.sleep));

    let _: NoobitResult<()> = retry
        .run(|| async { Err(ErrorEnvelope::http_status(503, None, ErrorPayload::None, true)) })
        .await;

    assert_eq!(*sleeps.lock(), vec![Duration::from_millis(5)]);
}

#[tokio::test]
async fn disabled_retry_config_allows_one_invocation() {
    let calls = AtomicU32::new(0);
    let retry = Retry::from_config(&RetryConfig::no_retry());

    let _: NoobitResult<()> = retry
        .run(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(transient_now()) }
        })
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

// =============================================================================
// Deadline
// =============================================================================

#[tokio::test]
async fn deadline_bounds_the_whole_retry_loop() {
    let retry = Retry::new(budget(10)).with_backoff(Backoff::Fixed {
        delay: Duration::from_secs(5),
    });

    let result: NoobitResult<()> = with_deadline(
        Duration::from_millis(50),
        retry.run(|| async { Err(ErrorEnvelope::connection("reset", true)) }),
    )
    .await;

    let err = result.expect_err("deadline elapses");
    assert_eq!(err.kind(), ErrorKind::Timeout);
}

#[tokio::test]
async fn adapter_deadline_cuts_a_rate_limited_call_short() {
    // Given: Kraken answers a rate limit error whose rule sleeps for seconds
    let http = Arc::new(ScriptedHttpClient::new());
    http.push_json(r#"{"error": ["EAPI:Rate limit exceeded"]}"#);
    http.push_json(r#"{"error": ["EAPI:Rate limit exceeded"]}"#);
    let ctx = ExchangeContext::new(ExchangeId::Kraken, http.clone())
        .expect("default context")
        .with_retry(RetryConfig::exponential(3))
        .with_deadline(Duration::from_millis(50));
    let tables = TranslationTables {
        symbols: SymbolMap::from_pairs([("XBT-USD", "XXBTZUSD")]).expect("valid table"),
        ..TranslationTables::default()
    };
    let adapter = KrakenAdapter::from_context(ctx, tables);

    // When: The caller asks for candles
    let err = adapter
        .ohlc(OhlcRequest::parse("XBT-USD", "1m").expect("valid request"))
        .await
        .expect_err("deadline elapses");

    // Then: Timeout after the first call, no partial result
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert_eq!(http.call_count(), 1);
}
