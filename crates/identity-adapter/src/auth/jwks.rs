//! Key Cache: resolves signing keys from the identity provider's JWKS document.
//!
//! Keys are cached per key id. A miss fetches the JWKS document, converts the
//! matching entry into verification material and stores it.
//!
//! # Cache policy
//!
//! - An entry is served for `ttl` after it was fetched, then treated as a miss.
//! - [`KeyCache::invalidate`] evicts unconditionally. [`KeyCache::invalidate_stale`]
//!   evicts only entries older than `min_refresh_interval`; the verifier calls it
//!   after a signature failure so a rotated key under the same id is picked up
//!   without letting forged tokens force a fetch per request.
//! - The key ids present in the last fetched document are remembered. For
//!   `min_refresh_interval` after a fetch, an id absent from it fails with
//!   `KeyNotFound` without another fetch.
//!
//! # Single flight
//!
//! At most one fetch per key id is in flight. The fetch runs as its own task,
//! so it completes even if every caller waiting on it is cancelled, and it
//! removes its own in-flight entry when done. Concurrent callers for the same
//! id share the task's result. The fetched key is stored before the entry is
//! removed, so a caller arriving after the fetch finished always finds it in
//! the cache.
//!
//! Lookups that hit the cache take only a read lock on the key map. The
//! in-flight table is a plain mutex held for map operations only, never across
//! an await.

use crate::observability::metrics::{record_jwks_fetch, record_key_lookup};
use async_trait::async_trait;
use common::error::AuthError;
use futures::future::{BoxFuture, FutureExt, Shared};
use jsonwebtoken::{Algorithm, DecodingKey};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tracing::instrument;

/// Default cache TTL in seconds (5 minutes).
pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 300;

/// Default minimum refresh interval in seconds.
pub const DEFAULT_MIN_REFRESH_SECONDS: u64 = 10;

/// JSON Web Key as published in a JWKS document.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    /// Key type ("RSA", "EC" or "OKP").
    pub kty: String,

    /// Key ID - used to select the correct key for verification.
    pub kid: String,

    /// Algorithm the key is restricted to, if any.
    #[serde(default)]
    pub alg: Option<String>,

    /// Key use ("sig" for signing keys).
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,

    /// RSA modulus (base64url).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA public exponent (base64url).
    #[serde(default)]
    pub e: Option<String>,

    /// Curve name for EC and OKP keys.
    #[serde(default)]
    pub crv: Option<String>,

    /// EC x coordinate or OKP public key (base64url).
    #[serde(default)]
    pub x: Option<String>,

    /// EC y coordinate (base64url).
    #[serde(default)]
    pub y: Option<String>,
}

/// JWKS document.
#[derive(Debug, Clone, Deserialize)]
pub struct JwksDocument {
    /// List of JSON Web Keys.
    pub keys: Vec<Jwk>,
}

/// Family of asymmetric keys; a key only verifies algorithms of its family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFamily {
    Rsa,
    Ec,
    Okp,
}

impl KeyFamily {
    /// Family an algorithm belongs to. `None` for symmetric algorithms.
    pub fn of(alg: Algorithm) -> Option<Self> {
        match alg {
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512 => Some(KeyFamily::Rsa),
            Algorithm::ES256 | Algorithm::ES384 => Some(KeyFamily::Ec),
            Algorithm::EdDSA => Some(KeyFamily::Okp),
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => None,
        }
    }
}

/// Public-key material resolved for one key id.
///
/// Shared read-only between concurrent verifications and replaced, never
/// mutated, on refresh.
#[derive(Clone)]
pub struct SigningKey {
    kid: String,
    family: KeyFamily,
    alg: Option<Algorithm>,
    decoding_key: DecodingKey,
    fetched_at: Instant,
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("kid", &self.kid)
            .field("family", &self.family)
            .field("alg", &self.alg)
            .field("fetched_at", &self.fetched_at)
            .finish_non_exhaustive()
    }
}

impl SigningKey {
    /// Convert a JWK into usable verification material.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::KeyNotFound` if the JWK is not a usable signing key.
    pub fn from_jwk(jwk: &Jwk) -> Result<Self, AuthError> {
        let unusable = |reason: &str| {
            tracing::warn!(target: "adapter.auth.jwks", kid = %jwk.kid, kty = %jwk.kty, reason, "Unusable JWK");
            AuthError::KeyNotFound
        };

        if let Some(key_use) = &jwk.key_use {
            if key_use != "sig" {
                return Err(unusable("key use is not sig"));
            }
        }

        let alg = match &jwk.alg {
            Some(alg) => Some(Algorithm::from_str(alg).map_err(|_| unusable("unknown alg"))?),
            None => None,
        };

        let (family, decoding_key) = match jwk.kty.as_str() {
            "RSA" => {
                let n = jwk.n.as_deref().ok_or_else(|| unusable("missing n"))?;
                let e = jwk.e.as_deref().ok_or_else(|| unusable("missing e"))?;
                let key = DecodingKey::from_rsa_components(n, e)
                    .map_err(|_| unusable("invalid RSA components"))?;
                (KeyFamily::Rsa, key)
            }
            "EC" => {
                let x = jwk.x.as_deref().ok_or_else(|| unusable("missing x"))?;
                let y = jwk.y.as_deref().ok_or_else(|| unusable("missing y"))?;
                let key = DecodingKey::from_ec_components(x, y)
                    .map_err(|_| unusable("invalid EC components"))?;
                (KeyFamily::Ec, key)
            }
            "OKP" => {
                if jwk.crv.as_deref().is_some_and(|crv| crv != "Ed25519") {
                    return Err(unusable("unsupported OKP curve"));
                }
                let x = jwk.x.as_deref().ok_or_else(|| unusable("missing x"))?;
                let key = DecodingKey::from_ed_components(x)
                    .map_err(|_| unusable("invalid OKP public key"))?;
                (KeyFamily::Okp, key)
            }
            _ => return Err(unusable("unsupported key type")),
        };

        if let Some(alg) = alg {
            if KeyFamily::of(alg) != Some(family) {
                return Err(unusable("alg does not match key type"));
            }
        }

        Ok(Self {
            kid: jwk.kid.clone(),
            family,
            alg,
            decoding_key,
            fetched_at: Instant::now(),
        })
    }

    /// Key ID.
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Verification material.
    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }

    /// Whether a token declaring `alg` may be verified with this key.
    pub fn accepts(&self, alg: Algorithm) -> bool {
        match self.alg {
            Some(declared) => declared == alg,
            None => KeyFamily::of(alg) == Some(self.family),
        }
    }

    /// Time since the key was fetched.
    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }
}

/// Source of JWKS documents.
#[async_trait]
pub trait JwksSource: Send + Sync {
    /// Fetch the current key set.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::CommunicationFailure` if the document cannot be obtained.
    async fn fetch(&self) -> Result<JwksDocument, AuthError>;
}

/// JWKS source backed by the identity provider's HTTP endpoint.
pub struct HttpJwksSource {
    jwks_url: String,
    http_client: reqwest::Client,
}

impl HttpJwksSource {
    /// Create a source with a bounded per-fetch timeout.
    ///
    /// # Errors
    ///
    /// Returns the builder error if the HTTP client cannot be constructed.
    pub fn new(jwks_url: String, fetch_timeout: Duration) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder()
            .timeout(fetch_timeout)
            .connect_timeout(fetch_timeout)
            .build()?;

        Ok(Self {
            jwks_url,
            http_client,
        })
    }
}

#[async_trait]
impl JwksSource for HttpJwksSource {
    #[instrument(skip(self))]
    async fn fetch(&self) -> Result<JwksDocument, AuthError> {
        tracing::debug!(target: "adapter.auth.jwks", url = %self.jwks_url, "Fetching JWKS");

        let response = self
            .http_client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(target: "adapter.auth.jwks", error = %e, "Failed to fetch JWKS");
                AuthError::CommunicationFailure("JWKS endpoint unreachable".to_string())
            })?;

        if !response.status().is_success() {
            tracing::error!(
                target: "adapter.auth.jwks",
                status = %response.status(),
                "JWKS endpoint returned error"
            );
            return Err(AuthError::CommunicationFailure(format!(
                "JWKS endpoint returned {}",
                response.status().as_u16()
            )));
        }

        response.json::<JwksDocument>().await.map_err(|e| {
            tracing::error!(target: "adapter.auth.jwks", error = %e, "Failed to parse JWKS response");
            AuthError::CommunicationFailure("JWKS document could not be parsed".to_string())
        })
    }
}

type KeyFetch = Shared<BoxFuture<'static, Result<Arc<SigningKey>, AuthError>>>;

/// Key ids seen in the most recent JWKS document.
struct DocumentSnapshot {
    fetched_at: Instant,
    kids: HashSet<String>,
}

/// State written by fetch tasks, which outlive any single caller.
#[derive(Default)]
struct CacheState {
    keys: RwLock<HashMap<String, Arc<SigningKey>>>,
    last_document: Mutex<Option<DocumentSnapshot>>,
    in_flight: Mutex<HashMap<String, KeyFetch>>,
}

impl CacheState {
    fn fresh_key(&self, kid: &str, ttl: Duration) -> Option<Arc<SigningKey>> {
        let keys = self.keys.read().unwrap_or_else(PoisonError::into_inner);
        keys.get(kid).filter(|key| key.age() < ttl).cloned()
    }

    /// Drop the in-flight entry for `kid`.
    fn release(&self, kid: &str) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(kid);
    }

    /// True if a document fetched within `window` did not list `kid`.
    fn recently_absent(&self, kid: &str, window: Duration) -> bool {
        let last = self
            .last_document
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        last.as_ref()
            .is_some_and(|doc| doc.fetched_at.elapsed() < window && !doc.kids.contains(kid))
    }
}

/// Thread-safe cache of signing keys with single-flight fetch on miss.
pub struct KeyCache {
    source: Arc<dyn JwksSource>,
    state: Arc<CacheState>,
    ttl: Duration,
    min_refresh_interval: Duration,
}

impl KeyCache {
    /// Create a cache with the default TTL and refresh interval.
    pub fn new(source: Arc<dyn JwksSource>) -> Self {
        Self::with_policy(
            source,
            Duration::from_secs(DEFAULT_CACHE_TTL_SECONDS),
            Duration::from_secs(DEFAULT_MIN_REFRESH_SECONDS),
        )
    }

    /// Create a cache with a custom policy.
    ///
    /// # Arguments
    ///
    /// * `source` - Where JWKS documents come from
    /// * `ttl` - How long a fetched key is served from cache
    /// * `min_refresh_interval` - Minimum spacing for failure-driven refetches
    pub fn with_policy(
        source: Arc<dyn JwksSource>,
        ttl: Duration,
        min_refresh_interval: Duration,
    ) -> Self {
        Self {
            source,
            state: Arc::new(CacheState::default()),
            ttl,
            min_refresh_interval,
        }
    }

    /// Get the signing key for a key id.
    ///
    /// Served from cache when fresh; otherwise joins or starts the single
    /// in-flight fetch for this id.
    ///
    /// # Errors
    ///
    /// - `AuthError::KeyNotFound` if the JWKS does not contain a usable key for `kid`
    /// - `AuthError::CommunicationFailure` if the JWKS cannot be fetched
    #[instrument(skip(self), fields(kid = %kid))]
    pub async fn get_key(&self, kid: &str) -> Result<Arc<SigningKey>, AuthError> {
        if let Some(key) = self.state.fresh_key(kid, self.ttl) {
            tracing::debug!(target: "adapter.auth.jwks", kid = %kid, "JWKS cache hit");
            record_key_lookup("hit");
            return Ok(key);
        }

        let fetch = {
            let mut in_flight = self
                .state
                .in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner);

            // A fetch that finished since the first check has already stored its key
            if let Some(key) = self.state.fresh_key(kid, self.ttl) {
                record_key_lookup("hit");
                return Ok(key);
            }

            if let Some(fetch) = in_flight.get(kid) {
                tracing::debug!(target: "adapter.auth.jwks", kid = %kid, "Joining in-flight JWKS fetch");
                record_key_lookup("joined");
                fetch.clone()
            } else {
                if self.state.recently_absent(kid, self.min_refresh_interval) {
                    tracing::debug!(target: "adapter.auth.jwks", kid = %kid, "Key absent from recent JWKS");
                    record_key_lookup("absent");
                    return Err(AuthError::KeyNotFound);
                }

                record_key_lookup("miss");
                // The task cannot remove its entry before this insert: it needs
                // the lock held here.
                let fetch = spawn_fetch(
                    Arc::clone(&self.source),
                    Arc::clone(&self.state),
                    kid.to_string(),
                );
                in_flight.insert(kid.to_string(), fetch.clone());
                fetch
            }
        };

        fetch.await
    }

    /// Evict a key unconditionally.
    pub fn invalidate(&self, kid: &str) {
        let mut keys = self.state.keys.write().unwrap_or_else(PoisonError::into_inner);
        if keys.remove(kid).is_some() {
            tracing::info!(target: "adapter.auth.jwks", kid = %kid, "Signing key invalidated");
        }
    }

    /// Evict a key only if it is older than the minimum refresh interval.
    ///
    /// Returns true if the key was evicted.
    pub fn invalidate_stale(&self, kid: &str) -> bool {
        let mut keys = self.state.keys.write().unwrap_or_else(PoisonError::into_inner);
        let stale = keys
            .get(kid)
            .is_some_and(|key| key.age() >= self.min_refresh_interval);
        if stale {
            keys.remove(kid);
            tracing::info!(target: "adapter.auth.jwks", kid = %kid, "Stale signing key invalidated");
        }
        stale
    }

    /// Number of keys currently cached (fresh or not).
    pub fn len(&self) -> usize {
        self.state
            .keys
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the cache holds no keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Run [`fetch_key`] as a detached task that clears its in-flight entry on
/// completion, and return a shareable handle to its result.
fn spawn_fetch(source: Arc<dyn JwksSource>, state: Arc<CacheState>, kid: String) -> KeyFetch {
    let task_state = Arc::clone(&state);
    let task_kid = kid.clone();
    let task = tokio::spawn(async move {
        let result = fetch_key(source, Arc::clone(&task_state), task_kid.clone()).await;
        task_state.release(&task_kid);
        result
    });

    async move {
        task.await.unwrap_or_else(|e| {
            tracing::error!(target: "adapter.auth.jwks", error = %e, "JWKS fetch task failed");
            // The task never reached its own release
            state.release(&kid);
            Err(AuthError::CommunicationFailure(
                "JWKS fetch task failed".to_string(),
            ))
        })
    }
    .boxed()
    .shared()
}

/// Fetch the JWKS, remember its key ids and store the key for `kid`.
async fn fetch_key(
    source: Arc<dyn JwksSource>,
    state: Arc<CacheState>,
    kid: String,
) -> Result<Arc<SigningKey>, AuthError> {
    let start = Instant::now();
    let fetched = source.fetch().await;
    record_jwks_fetch(if fetched.is_ok() { "success" } else { "error" }, start.elapsed());
    let document = fetched?;

    {
        let mut last = state
            .last_document
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *last = Some(DocumentSnapshot {
            fetched_at: Instant::now(),
            kids: document.keys.iter().map(|key| key.kid.clone()).collect(),
        });
    }

    tracing::info!(
        target: "adapter.auth.jwks",
        key_count = document.keys.len(),
        "JWKS fetched"
    );

    let jwk = document
        .keys
        .iter()
        .find(|key| key.kid == kid)
        .ok_or_else(|| {
            tracing::warn!(target: "adapter.auth.jwks", kid = %kid, "Key not found in JWKS after refresh");
            AuthError::KeyNotFound
        })?;

    let key = Arc::new(SigningKey::from_jwk(jwk)?);

    state
        .keys
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(kid, Arc::clone(&key));

    Ok(key)
}
