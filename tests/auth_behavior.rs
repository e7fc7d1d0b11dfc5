//! Behavior tests for request signing and nonce issuance.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;

use noobit_markets::http_client::HttpMethod;
use noobit_markets::{ConfigError, Credential, ExchangeAuth, ExchangeId, NonceGenerator};

const KRAKEN_SECRET: &str =
    "kQH5HW/8p1uGOVjbgWA7FunAmGO8lsSUXNsu3eow76sz84Q18fWxnyRzBHCd3pd5nE9qa99HAZtuZuj6F1huXg==";

fn param<'a>(params: &'a [(String, String)], name: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

fn header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    param(headers, name)
}

// =============================================================================
// Nonces
// =============================================================================

#[test]
fn concurrent_callers_receive_unique_increasing_nonces() {
    // Given: One generator shared by 8 threads
    let generator = Arc::new(NonceGenerator::new());

    // When: Each thread draws 250 nonces
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let generator = Arc::clone(&generator);
            thread::spawn(move || (0..250).map(|_| generator.next()).collect::<Vec<_>>())
        })
        .collect();
    let per_thread: Vec<Vec<u64>> = handles
        .into_iter()
        .map(|handle| handle.join().expect("thread completes"))
        .collect();

    // Then: Every value is unique and each thread saw a strictly increasing run
    let all: BTreeSet<u64> = per_thread.iter().flatten().copied().collect();
    assert_eq!(all.len(), 8 * 250);
    for run in &per_thread {
        assert!(run.windows(2).all(|pair| pair[0] < pair[1]));
    }
}

#[test]
fn concurrent_signing_never_reuses_a_nonce() {
    let auth = Arc::new(
        ExchangeAuth::new(ExchangeId::Kraken, [Credential::new("key", KRAKEN_SECRET)])
            .expect("valid credential"),
    );

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let auth = Arc::clone(&auth);
            thread::spawn(move || {
                (0..100)
                    .map(|_| {
                        let signed = auth
                            .sign(HttpMethod::Post, "/0/private/Balance", Vec::new())
                            .expect("signs");
                        param(&signed.params, "nonce")
                            .and_then(|nonce| nonce.parse::<u64>().ok())
                            .expect("nonce param")
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let nonces: BTreeSet<u64> = handles
        .into_iter()
        .flat_map(|handle| handle.join().expect("thread completes"))
        .collect();
    assert_eq!(nonces.len(), 400);
}

// =============================================================================
// Signing schemes
// =============================================================================

#[test]
fn kraken_signature_is_sent_in_headers_with_sorted_nonce_params() {
    let auth = ExchangeAuth::new(ExchangeId::Kraken, [Credential::new("key", KRAKEN_SECRET)])
        .expect("valid credential");

    let signed = auth
        .sign(
            HttpMethod::Post,
            "/0/private/TradesHistory",
            vec![(String::from("type"), String::from("all"))],
        )
        .expect("signs");

    let names: Vec<&str> = signed.params.iter().map(|(key, _)| key.as_str()).collect();
    assert_eq!(names, vec!["nonce", "type"]);
    assert_eq!(header(&signed.headers, "API-Key"), Some("key"));
    let signature = header(&signed.headers, "API-Sign").expect("signature header");
    assert_eq!(signature.len(), 88, "base64 of a 64 byte digest");
}

#[test]
fn binance_signature_is_the_last_parameter() {
    let auth = ExchangeAuth::new(ExchangeId::Binance, [Credential::new("key", "secret")])
        .expect("valid credential");

    let signed = auth
        .sign(
            HttpMethod::Get,
            "/api/v3/account",
            vec![(String::from("recvWindow"), String::from("5000"))],
        )
        .expect("signs");

    let names: Vec<&str> = signed.params.iter().map(|(key, _)| key.as_str()).collect();
    assert_eq!(names, vec!["recvWindow", "timestamp", "signature"]);
    let signature = param(&signed.params, "signature").expect("signature");
    assert_eq!(signature.len(), 64);
    assert!(signature.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(header(&signed.headers, "X-MBX-APIKEY"), Some("key"));
}

#[test]
fn ftx_signature_travels_in_three_headers() {
    let auth = ExchangeAuth::new(ExchangeId::Ftx, [Credential::new("key", "secret")])
        .expect("valid credential");

    let signed = auth
        .sign(HttpMethod::Get, "/api/wallet/balances", Vec::new())
        .expect("signs");

    assert!(signed.params.is_empty());
    assert_eq!(header(&signed.headers, "FTX-KEY"), Some("key"));
    assert!(header(&signed.headers, "FTX-TS").is_some());
    assert_eq!(header(&signed.headers, "FTX-SIGN").map(str::len), Some(64));
}

// =============================================================================
// Key pool
// =============================================================================

#[test]
fn signing_rotates_keys_round_robin_and_headers_do_not() {
    let auth = ExchangeAuth::new(
        ExchangeId::Binance,
        [Credential::new("first", "s1"), Credential::new("second", "s2")],
    )
    .expect("valid credentials");
    assert_eq!(auth.key_count(), 2);

    let used: Vec<String> = (0..4)
        .map(|_| {
            let signed = auth
                .sign(HttpMethod::Get, "/api/v3/account", Vec::new())
                .expect("signs");
            header(&signed.headers, "X-MBX-APIKEY")
                .expect("key header")
                .to_owned()
        })
        .collect();
    assert_eq!(used, vec!["first", "second", "first", "second"]);

    let before = auth.headers();
    let again = auth.headers();
    assert_eq!(before, again);
    assert_eq!(before[0].1, "first");
}

#[test]
fn empty_pool_is_a_configuration_error() {
    let err = ExchangeAuth::new(ExchangeId::Ftx, Vec::<Credential>::new()).expect_err("no keys");
    assert!(matches!(
        err,
        ConfigError::MissingCredentials {
            exchange: ExchangeId::Ftx
        }
    ));
}

#[test]
fn kraken_secret_must_be_base64() {
    let err = ExchangeAuth::new(ExchangeId::Kraken, [Credential::new("key", "not base64!")])
        .expect_err("bad secret");
    assert!(matches!(err, ConfigError::MalformedSecret { .. }));
}

#[test]
fn credential_debug_hides_the_secret() {
    let rendered = format!("{:?}", Credential::new("visible", "hidden-secret"));
    assert!(rendered.contains("visible"));
    assert!(!rendered.contains("hidden-secret"));
}
