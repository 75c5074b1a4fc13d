//! Cryptographic fixtures for testing
//!
//! Provides signing keypairs that sign JWTs and publish themselves as JWKs,
//! one per supported key family:
//!
//! - Ed25519 (`EdDSA`), derived from a seed and fully deterministic
//! - P-256 (`ES256`), freshly generated by `ring`
//! - RSA 2048 (`RS256`), a key checked in under `fixtures/`

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use ring::rand::SystemRandom;
use ring::signature::{
    EcdsaKeyPair, Ed25519KeyPair, KeyPair, ECDSA_P256_SHA256_FIXED_SIGNING,
};
use serde_json::{json, Value};

/// PKCS#1 RSA private key used by [`TestKeypair::rs256`]. Test-only.
const RSA_TEST_KEY_PEM: &str = include_str!("../fixtures/rsa_test_key.pem");

/// Base64url modulus of [`RSA_TEST_KEY_PEM`].
const RSA_TEST_KEY_N: &str = "j0HuyHZvxC-r-QriqL34a6wqKytgVtbWFmWII6H_sLD274ShSBxtbg6hJY2rdM1pQMrTXpjcbHkvczj5GLe39ui8YnIolzo36paJF08Pt4-dZ5uu49WcxzWdgPuuRs0gCcMFVB02ZIE4WnaeMBi-07pB_5LqGRY6ps_FtbdywBEFPYeitYHZa176qHgzG1HOopUz1x51jKvpYVPSdCFv2ORBg7-O79_fzQAVqDatxpFVCTkhmEaDXVBFdLukkst6tgb1V7T20ppFhQsljdquSEZiDoUu4UngYXdIGhPm5bUnKwiOjOV_0v-N5kNecbVY8dg0FEakcrDb6WMaXwTPLQ";

/// Base64url public exponent (65537) of [`RSA_TEST_KEY_PEM`].
const RSA_TEST_KEY_E: &str = "AQAB";

#[derive(Debug, Clone)]
enum PrivateKey {
    /// PKCS#8 Ed25519 key.
    Ed25519(Vec<u8>),
    /// PKCS#8 P-256 key.
    EcdsaP256(Vec<u8>),
    /// PEM-encoded RSA key.
    Rsa(&'static str),
}

/// Signing key with a key ID, published to the mock provider as a JWK.
#[derive(Debug, Clone)]
pub struct TestKeypair {
    /// Key ID placed in the JWT header and the JWK.
    pub kid: String,
    algorithm: Algorithm,
    private_key: PrivateKey,
    public_jwk: Value,
}

impl TestKeypair {
    /// Create an Ed25519 keypair; the same seed always produces the same key.
    pub fn new(seed: u8, kid: &str) -> Self {
        let seed_bytes = seed_bytes(seed);

        let key_pair = Ed25519KeyPair::from_seed_unchecked(&seed_bytes)
            .expect("Failed to create test keypair");

        Self {
            kid: kid.to_string(),
            algorithm: Algorithm::EdDSA,
            private_key: PrivateKey::Ed25519(build_pkcs8_from_seed(&seed_bytes)),
            public_jwk: json!({
                "kty": "OKP",
                "crv": "Ed25519",
                "x": URL_SAFE_NO_PAD.encode(key_pair.public_key().as_ref()),
                "alg": "EdDSA",
            }),
        }
    }

    /// Generate a fresh P-256 keypair for `ES256`.
    pub fn es256(kid: &str) -> Self {
        let rng = SystemRandom::new();
        let pkcs8 = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, &rng)
            .expect("Failed to generate P-256 key");
        let key_pair =
            EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, pkcs8.as_ref(), &rng)
                .expect("Failed to parse P-256 key");

        // Uncompressed SEC1 point: 0x04 || X || Y
        let point = key_pair.public_key().as_ref();
        assert_eq!(point.len(), 65, "Unexpected P-256 public key length");
        let (x, y) = point[1..].split_at(32);

        Self {
            kid: kid.to_string(),
            algorithm: Algorithm::ES256,
            private_key: PrivateKey::EcdsaP256(pkcs8.as_ref().to_vec()),
            public_jwk: json!({
                "kty": "EC",
                "crv": "P-256",
                "x": URL_SAFE_NO_PAD.encode(x),
                "y": URL_SAFE_NO_PAD.encode(y),
                "alg": "ES256",
            }),
        }
    }

    /// The checked-in RSA 2048 keypair for `RS256`.
    pub fn rs256(kid: &str) -> Self {
        Self {
            kid: kid.to_string(),
            algorithm: Algorithm::RS256,
            private_key: PrivateKey::Rsa(RSA_TEST_KEY_PEM),
            public_jwk: json!({
                "kty": "RSA",
                "n": RSA_TEST_KEY_N,
                "e": RSA_TEST_KEY_E,
                "alg": "RS256",
            }),
        }
    }

    /// Algorithm this key signs with.
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Sign claims with a header for this key's algorithm and `kid`.
    pub fn sign(&self, claims: &Value) -> String {
        let mut header = Header::new(self.algorithm);
        header.typ = Some("JWT".to_string());
        header.kid = Some(self.kid.clone());
        self.sign_with_header(&header, claims)
    }

    /// Sign claims with a caller-supplied header.
    ///
    /// The header's `alg` must belong to this key's family.
    pub fn sign_with_header(&self, header: &Header, claims: &Value) -> String {
        let encoding_key = match &self.private_key {
            PrivateKey::Ed25519(pkcs8) => EncodingKey::from_ed_der(pkcs8),
            PrivateKey::EcdsaP256(pkcs8) => EncodingKey::from_ec_der(pkcs8),
            PrivateKey::Rsa(pem) => {
                EncodingKey::from_rsa_pem(pem.as_bytes()).expect("Failed to load RSA test key")
            }
        };
        encode(header, claims, &encoding_key).expect("Failed to sign token")
    }

    /// Public key as a signing JWK carrying this key's `kid`.
    pub fn jwk_json(&self) -> Value {
        let mut jwk = self.public_jwk.clone();
        jwk["kid"] = json!(self.kid);
        jwk["use"] = json!("sig");
        jwk
    }
}

/// Build a JWT with an arbitrary header and a bogus signature.
///
/// For tokens no real key could produce, such as `alg: none`.
pub fn forge_token(header: &Value, claims: &Value) -> String {
    format!(
        "{}.{}.{}",
        URL_SAFE_NO_PAD.encode(header.to_string()),
        URL_SAFE_NO_PAD.encode(claims.to_string()),
        URL_SAFE_NO_PAD.encode(b"not-a-signature")
    )
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
/// ring does not export PKCS#8 for a seeded keypair, so the DER is assembled
/// by hand. Test-only.
fn build_pkcs8_from_seed(seed: &[u8; 32]) -> Vec<u8> {
    // SEQUENCE { version INTEGER 0, AlgorithmIdentifier, privateKey OCTET STRING }
    let mut pkcs8 = Vec::new();

    // Outer SEQUENCE tag
    pkcs8.push(0x30);
    pkcs8.push(0x2e); // Length: 46 bytes

    // Version: INTEGER 0
    pkcs8.extend_from_slice(&[0x02, 0x01, 0x00]);

    // Algorithm Identifier: SEQUENCE { OID 1.3.101.112 }
    pkcs8.extend_from_slice(&[0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70]);

    // Private Key: OCTET STRING wrapping OCTET STRING with the 32-byte seed
    pkcs8.extend_from_slice(&[0x04, 0x22, 0x04, 0x20]);
    pkcs8.extend_from_slice(seed);

    pkcs8
}
