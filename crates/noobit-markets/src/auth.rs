//! Request signing for private endpoints.
//!
//! [`ExchangeAuth`] owns a pool of API keys. Every call to
//! [`ExchangeAuth::sign`] uses the current key, then rotates to the next one.
//! Each key carries its own [`NonceGenerator`], so nonces stay strictly
//! increasing per key no matter how many callers share the pool.

use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use parking_lot::Mutex;
use sha2::{Digest, Sha256, Sha512};

use crate::http_client::{encode_params, HttpMethod};
use crate::{ConfigError, ExchangeId};

type HmacSha256 = Hmac<Sha256>;
type HmacSha512 = Hmac<Sha512>;

/// API key and secret as issued by the exchange.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    api_key: String,
    secret: String,
}

impl Credential {
    pub fn new(api_key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            secret: secret.into(),
        }
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

impl Debug for Credential {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("api_key", &self.api_key)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Strictly increasing millisecond nonces.
///
/// Values track wall-clock milliseconds and bump by one when two callers
/// land on the same millisecond.
#[derive(Debug, Default)]
pub struct NonceGenerator {
    last: AtomicU64,
}

impl NonceGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> u64 {
        let now = now_millis();
        let mut issued = 0;
        // fetch_update retries the closure until the CAS wins
        let _ = self
            .last
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
                issued = now.max(last.saturating_add(1));
                Some(issued)
            });
        issued
    }
}

fn now_millis() -> u64 {
    let nanos = time::OffsetDateTime::now_utc().unix_timestamp_nanos();
    u64::try_from(nanos / 1_000_000).unwrap_or(0)
}

/// Parameters and headers to send for a signed call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    pub params: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
}

struct SigningKey {
    api_key: String,
    secret: Vec<u8>,
    nonce: Arc<NonceGenerator>,
}

struct KeyPool {
    keys: Vec<Arc<SigningKey>>,
    cursor: usize,
}

/// Signing capability injected into private operations.
pub struct ExchangeAuth {
    exchange: ExchangeId,
    pool: Mutex<KeyPool>,
}

impl Debug for ExchangeAuth {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let pool = self.pool.lock();
        f.debug_struct("ExchangeAuth")
            .field("exchange", &self.exchange)
            .field("keys", &pool.keys.len())
            .field("cursor", &pool.cursor)
            .finish()
    }
}

impl ExchangeAuth {
    pub fn new(
        exchange: ExchangeId,
        credentials: impl IntoIterator<Item = Credential>,
    ) -> Result<Self, ConfigError> {
        let keys = credentials
            .into_iter()
            .map(|credential| signing_key(exchange, credential).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;

        if keys.is_empty() {
            return Err(ConfigError::MissingCredentials { exchange });
        }

        Ok(Self {
            exchange,
            pool: Mutex::new(KeyPool { keys, cursor: 0 }),
        })
    }

    pub const fn exchange(&self) -> ExchangeId {
        self.exchange
    }

    pub fn key_count(&self) -> usize {
        self.pool.lock().keys.len()
    }

    /// Public key header of the current credential. Does not sign or rotate.
    pub fn headers(&self) -> Vec<(String, String)> {
        let key = self.current();
        vec![(String::from(key_header(self.exchange)), key.api_key.clone())]
    }

    /// Sign a call with the current key, then rotate to the next key.
    ///
    /// `path` is the absolute url path (`/0/private/Balance`). Returned params
    /// are sorted by name and must be sent in that order.
    pub fn sign(
        &self,
        method: HttpMethod,
        path: &str,
        mut params: Vec<(String, String)>,
    ) -> Result<SignedRequest, ConfigError> {
        let key = self.checkout();
        let nonce = key.nonce.next();
        params.sort_by(|a, b| a.0.cmp(&b.0));

        let signed = match self.exchange {
            ExchangeId::Kraken => {
                params.push((String::from("nonce"), nonce.to_string()));
                params.sort_by(|a, b| a.0.cmp(&b.0));
                let postdata = encode_params(&params);
                let signature = kraken_signature(&key.secret, path, nonce, &postdata)
                    .map_err(|reason| self.malformed(reason))?;
                SignedRequest {
                    params,
                    headers: vec![
                        (String::from("API-Key"), key.api_key.clone()),
                        (String::from("API-Sign"), signature),
                    ],
                }
            }
            ExchangeId::Binance => {
                params.push((String::from("timestamp"), nonce.to_string()));
                let query = encode_params(&params);
                let signature = binance_signature(&key.secret, &query)
                    .map_err(|reason| self.malformed(reason))?;
                params.push((String::from("signature"), signature));
                SignedRequest {
                    params,
                    headers: vec![(String::from("X-MBX-APIKEY"), key.api_key.clone())],
                }
            }
            ExchangeId::Ftx => {
                let target = match (method, params.is_empty()) {
                    (_, true) => String::from(path),
                    (HttpMethod::Get, false) => format!("{path}?{}", encode_params(&params)),
                    (HttpMethod::Post, false) => format!("{path}{}", encode_params(&params)),
                };
                let signature = ftx_signature(&key.secret, nonce, method, &target)
                    .map_err(|reason| self.malformed(reason))?;
                SignedRequest {
                    params,
                    headers: vec![
                        (String::from("FTX-KEY"), key.api_key.clone()),
                        (String::from("FTX-TS"), nonce.to_string()),
                        (String::from("FTX-SIGN"), signature),
                    ],
                }
            }
        };

        tracing::trace!(exchange = %self.exchange, path, "signed private request");
        Ok(signed)
    }

    fn current(&self) -> Arc<SigningKey> {
        let pool = self.pool.lock();
        Arc::clone(&pool.keys[pool.cursor])
    }

    fn checkout(&self) -> Arc<SigningKey> {
        let mut pool = self.pool.lock();
        let key = Arc::clone(&pool.keys[pool.cursor]);
        pool.cursor = (pool.cursor + 1) % pool.keys.len();
        key
    }

    fn malformed(&self, reason: String) -> ConfigError {
        ConfigError::MalformedSecret {
            exchange: self.exchange,
            reason,
        }
    }
}

fn signing_key(exchange: ExchangeId, credential: Credential) -> Result<SigningKey, ConfigError> {
    if credential.api_key.trim().is_empty() || credential.secret.trim().is_empty() {
        return Err(ConfigError::MalformedSecret {
            exchange,
            reason: String::from("api key and secret must not be empty"),
        });
    }

    let secret = match exchange {
        ExchangeId::Kraken => STANDARD.decode(credential.secret.trim()).map_err(|e| {
            ConfigError::MalformedSecret {
                exchange,
                reason: format!("secret is not valid base64: {e}"),
            }
        })?,
        ExchangeId::Binance | ExchangeId::Ftx => credential.secret.into_bytes(),
    };

    Ok(SigningKey {
        api_key: credential.api_key,
        secret,
        nonce: Arc::new(NonceGenerator::new()),
    })
}

const fn key_header(exchange: ExchangeId) -> &'static str {
    match exchange {
        ExchangeId::Kraken => "API-Key",
        ExchangeId::Binance => "X-MBX-APIKEY",
        ExchangeId::Ftx => "FTX-KEY",
    }
}

/// `base64(HMAC-SHA512(secret, path || SHA256(nonce || postdata)))`
pub(crate) fn kraken_signature(
    secret: &[u8],
    path: &str,
    nonce: u64,
    postdata: &str,
) -> Result<String, String> {
    let digest = Sha256::digest(format!("{nonce}{postdata}").as_bytes());
    let mut mac = HmacSha512::new_from_slice(secret).map_err(|e| format!("HMAC error: {e}"))?;
    mac.update(path.as_bytes());
    mac.update(&digest);
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// `hex(HMAC-SHA256(secret, query))`
pub(crate) fn binance_signature(secret: &[u8], query: &str) -> Result<String, String> {
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|e| format!("HMAC error: {e}"))?;
    mac.update(query.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// `hex(HMAC-SHA256(secret, ts || METHOD || target))`
pub(crate) fn ftx_signature(
    secret: &[u8],
    ts: u64,
    method: HttpMethod,
    target: &str,
) -> Result<String, String> {
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|e| format!("HMAC error: {e}"))?;
    mac.update(format!("{ts}{}{target}", method.as_str()).as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const KRAKEN_SECRET: &str =
        "kQH5HW/8p1uGOVjbgWA7FunAmGO8lsSUXNsu3eow76sz84Q18fWxnyRzBHCd3pd5nE9qa99HAZtuZuj6F1huXg==";

    #[test]
    fn kraken_signature_matches_published_vector() {
        let secret = STANDARD.decode(KRAKEN_SECRET).expect("valid base64");
        let signature = kraken_signature(
            &secret,
            "/0/private/AddOrder",
            1_616_492_376_594,
            "nonce=1616492376594&ordertype=limit&pair=XBTUSD&price=37500&type=buy&volume=1.25",
        )
        .expect("must sign");

        assert_eq!(
            signature,
            "4/dpxb3iT4tp/ZCVEwSnEsLxx0bqyhLpdfOpc6fn7OR8+UClSV5n9E6aSS8MPtnRfp32bAb0nmbRn6H8ndwLUQ=="
        );
    }

    #[test]
    fn binance_signature_matches_published_vector() {
        let signature = binance_signature(
            b"NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j",
            "symbol=LTCBTC&side=BUY&type=LIMIT&timeInForce=GTC&quantity=1&price=0.1&recvWindow=5000&timestamp=1499827319559",
        )
        .expect("must sign");

        assert_eq!(
            signature,
            "c8db56825ae71d6d79447849e617115f4a920fa2acdcab2b053c4b2838bd6b71"
        );
    }

    #[test]
    fn empty_pool_is_a_configuration_error() {
        let err = ExchangeAuth::new(ExchangeId::Kraken, Vec::new()).expect_err("must fail");
        assert!(matches!(
            err,
            ConfigError::MissingCredentials {
                exchange: ExchangeId::Kraken
            }
        ));
    }

    #[test]
    fn kraken_secret_must_be_base64() {
        let err = ExchangeAuth::new(
            ExchangeId::Kraken,
            [Credential::new("key", "not base64 !!")],
        )
        .expect_err("must fail");
        assert!(matches!(err, ConfigError::MalformedSecret { .. }));
    }

    #[test]
    fn binance_signature_is_the_last_parameter() {
        let auth = ExchangeAuth::new(ExchangeId::Binance, [Credential::new("key", "secret")])
            .expect("valid auth");

        let signed = auth
            .sign(
                HttpMethod::Get,
                "/api/v3/account",
                vec![(String::from("recvWindow"), String::from("5000"))],
            )
            .expect("must sign");

        let names: Vec<&str> = signed.params.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, vec!["recvWindow", "timestamp", "signature"]);
        assert_eq!(
            signed.headers,
            vec![(String::from("X-MBX-APIKEY"), String::from("key"))]
        );
    }

    #[test]
    fn headers_do_not_rotate() {
        let auth = ExchangeAuth::new(
            ExchangeId::Ftx,
            [Credential::new("first", "a"), Credential::new("second", "b")],
        )
        .expect("valid auth");

        assert_eq!(auth.headers()[0].1, "first");
        assert_eq!(auth.headers()[0].1, "first");
    }

    #[test]
    fn credential_debug_hides_secret() {
        let rendered = format!("{:?}", Credential::new("key", "super-secret"));
        assert!(!rendered.contains("super-secret"));
    }

    #[test]
    fn nonce_is_strictly_increasing() {
        let generator = NonceGenerator::new();
        let first = generator.next();
        let second = generator.next();
        assert!(second > first);
    }
}
