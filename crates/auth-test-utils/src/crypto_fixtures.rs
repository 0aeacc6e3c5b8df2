//! Deterministic cryptographic fixtures for testing
//!
//! Provides reproducible Ed25519 keypairs, a fixed RSA key and helpers to
//! publish them as JWKs. All fixtures are deterministic based on seed values.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use ring::signature::{Ed25519KeyPair, KeyPair};
use thiserror::Error;

/// RSA-2048 private key (PKCS#1 PEM) generated for tests only.
const RSA_TEST_KEY_PEM: &str = include_str!("../fixtures/rsa_test_key.pem");

/// Base64url modulus of [`RSA_TEST_KEY_PEM`].
const RSA_TEST_MODULUS: &str = "nd_yh3nZvSAtdZJZJCklpG0r0eu_wmPQiO3MQqVpxTwo75NsvUvmGgX331zG_DOWOur0PEhNxpdrNs6gK9p7RMs6GwPZWRGmW5WL2JtXdkFQHWRRve1tEjoa9S6WA4wtTwxV_Yy6ikL5Etp6THNEcsWHi9cm5vQu7QjCqwUYumedoEMPHQvacyh6XcaJQgrVWD0kKUnlZ_Ih-IdAjXNdcc_8ak2cLL4WMi1FgiplqCQdaBkoMfsGFu8vjBaTmkrb3461V2QcBzuAxrj6FXb3e-lLllR7bdot9WXNekQQJ2WyX1tFwEXTWVdF8W4VWlj3f798TUXJwsv-HFWsaKdnaQ";

/// Base64url public exponent of [`RSA_TEST_KEY_PEM`] (65537).
const RSA_TEST_EXPONENT: &str = "AQAB";

/// Test fixture error type
#[derive(Error, Debug)]
pub enum FixtureError {
    #[error("Cryptographic operation failed: {0}")]
    Crypto(String),
}

/// Deterministic Ed25519 keypair that signs tokens under a fixed key id.
///
/// # Example
/// ```rust,ignore
/// let keypair = TestKeypair::new(1, "test-key-01");
/// let token = keypair.sign_token(&TestTokenBuilder::new().with_roles(&["Partners"]).build());
/// let jwks = jwks_json(vec![keypair.jwk_json()]);
/// ```
pub struct TestKeypair {
    kid: String,
    public_key_bytes: Vec<u8>,
    private_key_pkcs8: Vec<u8>,
}

impl TestKeypair {
    /// Build the keypair for `seed`. The same seed always yields the same key.
    ///
    /// # Panics
    ///
    /// Panics if ring rejects the derived seed.
    pub fn new(seed: u8, kid: &str) -> Self {
        let seed_bytes = seed_bytes(seed);
        let key_pair =
            Ed25519KeyPair::from_seed_unchecked(&seed_bytes).expect("Failed to create test keypair");

        Self {
            kid: kid.to_string(),
            public_key_bytes: key_pair.public_key().as_ref().to_vec(),
            private_key_pkcs8: build_pkcs8_from_seed(&seed_bytes),
        }
    }

    /// Key id placed in signed token headers.
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Sign `claims` with EdDSA under this keypair's kid.
    pub fn sign_token(&self, claims: &serde_json::Value) -> String {
        self.sign_token_as(&self.kid, claims)
    }

    /// Sign `claims` with this key but advertise a different kid.
    pub fn sign_token_as(&self, kid: &str, claims: &serde_json::Value) -> String {
        let encoding_key = EncodingKey::from_ed_der(&self.private_key_pkcs8);
        let mut header = Header::new(Algorithm::EdDSA);
        header.typ = Some("JWT".to_string());
        header.kid = Some(kid.to_string());

        encode(&header, claims, &encoding_key).expect("Failed to sign token")
    }

    /// The public key as an OKP JWK.
    pub fn jwk_json(&self) -> serde_json::Value {
        serde_json::json!({
            "kty": "OKP",
            "kid": self.kid,
            "crv": "Ed25519",
            "x": URL_SAFE_NO_PAD.encode(&self.public_key_bytes),
            "alg": "EdDSA",
            "use": "sig"
        })
    }
}

/// The fixed RSA test key as an RS256 JWK under `kid`.
pub fn rsa_test_jwk(kid: &str) -> serde_json::Value {
    serde_json::json!({
        "kty": "RSA",
        "kid": kid,
        "alg": "RS256",
        "use": "sig",
        "n": RSA_TEST_MODULUS,
        "e": RSA_TEST_EXPONENT
    })
}

/// Sign `claims` with RS256 using the fixed RSA test key.
///
/// # Panics
///
/// Panics if the embedded PEM cannot be parsed.
pub fn sign_rsa_token(kid: &str, claims: &serde_json::Value) -> String {
    let encoding_key =
        EncodingKey::from_rsa_pem(RSA_TEST_KEY_PEM.as_bytes()).expect("Invalid RSA test key");
    let mut header = Header::new(Algorithm::RS256);
    header.typ = Some("JWT".to_string());
    header.kid = Some(kid.to_string());

    encode(&header, claims, &encoding_key).expect("Failed to sign RS256 token")
}

/// Sign `claims` with HS256 using `secret`. Used to exercise algorithm confusion.
pub fn sign_hmac_token(kid: &str, secret: &[u8], claims: &serde_json::Value) -> String {
    let mut header = Header::new(Algorithm::HS256);
    header.typ = Some("JWT".to_string());
    header.kid = Some(kid.to_string());

    encode(&header, claims, &EncodingKey::from_secret(secret)).expect("Failed to sign HS256 token")
}

/// Build an unsigned token with a raw header and claims and an empty signature.
pub fn unsigned_token(header: &serde_json::Value, claims: &serde_json::Value) -> String {
    let header_b64 = URL_SAFE_NO_PAD.encode(header.to_string().as_bytes());
    let claims_b64 = URL_SAFE_NO_PAD.encode(claims.to_string().as_bytes());
    format!("{header_b64}.{claims_b64}.")
}

/// Wrap JWKs in a JWKS document.
pub fn jwks_json(keys: Vec<serde_json::Value>) -> serde_json::Value {
    serde_json::json!({ "keys": keys })
}

/// Generate a deterministic Ed25519 signing key for testing.
///
/// # Returns
/// * `Ok((public_key_bytes, private_key_pkcs8))`
pub fn test_signing_key(seed: u8) -> Result<(Vec<u8>, Vec<u8>), FixtureError> {
    let seed_bytes = seed_bytes(seed);
    let key_pair = Ed25519KeyPair::from_seed_unchecked(&seed_bytes)
        .map_err(|e| FixtureError::Crypto(format!("Failed to generate test keypair: {:?}", e)))?;

    Ok((
        key_pair.public_key().as_ref().to_vec(),
        build_pkcs8_from_seed(&seed_bytes),
    ))
}

fn seed_bytes(seed: u8) -> [u8; 32] {
    let mut seed_bytes = [0u8; 32];
    seed_bytes[0] = seed;
    for (i, byte) in seed_bytes.iter_mut().enumerate().skip(1) {
        *byte = seed.wrapping_mul(i as u8).wrapping_add(i as u8);
    }
    seed_bytes
}

/// Build PKCS#8 v1 document from Ed25519 seed
///
/// This is a test-only utility. Production code must use ring::rand::SystemRandom.
fn build_pkcs8_from_seed(seed: &[u8; 32]) -> Vec<u8> {
    let mut pkcs8 = Vec::new();

    // Outer SEQUENCE tag
    pkcs8.push(0x30);
    pkcs8.push(0x2e); // Length: 46 bytes

    // Version: INTEGER 0
    pkcs8.extend_from_slice(&[0x02, 0x01, 0x00]);

    // Algorithm Identifier: SEQUENCE
    pkcs8.push(0x30);
    pkcs8.push(0x05); // Length: 5 bytes
                      // OID for Ed25519: 1.3.101.112
    pkcs8.extend_from_slice(&[0x06, 0x03, 0x2b, 0x65, 0x70]);

    // Private Key: OCTET STRING
    pkcs8.push(0x04);
    pkcs8.push(0x22); // Length: 34 bytes
                      // Inner OCTET STRING with seed
    pkcs8.push(0x04);
    pkcs8.push(0x20); // Length: 32 bytes
    pkcs8.extend_from_slice(seed);

    pkcs8
}
