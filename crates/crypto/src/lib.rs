//! MuscleMap Cryptographic Operations
//!
//! SHA-256, HMAC-SHA256, Ed25519 signatures, and encoding utilities for
//! end-to-end encryption and data integrity.
//!
//! Compiled to WebAssembly for universal runtime support.

use base64::{engine::general_purpose, Engine as _};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use hmac::{Hmac, Mac};
use musclemap_core::{constant_time_eq, KernelError, KernelResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use wasm_bindgen::prelude::*;

type HmacSha256 = Hmac<Sha256>;

/// Source of cryptographically secure random bytes, abstracted so tests
/// can inject a deterministic stream instead of drawing from the OS.
pub trait SecureRandom {
    fn fill(&mut self, buf: &mut [u8]) -> KernelResult<()>;
}

/// Production CSPRNG: the OS entropy source via `getrandom`.
pub struct OsRandom;

impl SecureRandom for OsRandom {
    fn fill(&mut self, buf: &mut [u8]) -> KernelResult<()> {
        getrandom::getrandom(buf)
            .map_err(|e| KernelError::internal(format!("OS entropy source failed: {e}")))
    }
}

/// Deterministic byte stream for property tests — cycles through a fixed
/// seed rather than drawing real entropy.
#[cfg(test)]
pub struct DeterministicRandom {
    stream: Vec<u8>,
    pos: usize,
}

#[cfg(test)]
impl DeterministicRandom {
    pub fn new(seed: u8) -> Self {
        DeterministicRandom {
            stream: (0..=255u8).map(|i| i.wrapping_add(seed)).collect(),
            pos: 0,
        }
    }
}

#[cfg(test)]
impl SecureRandom for DeterministicRandom {
    fn fill(&mut self, buf: &mut [u8]) -> KernelResult<()> {
        for b in buf.iter_mut() {
            *b = self.stream[self.pos % self.stream.len()];
            self.pos += 1;
        }
        Ok(())
    }
}

/// Result of a hash operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[wasm_bindgen(getter_with_clone)]
pub struct HashResult {
    pub hex: String,
    pub base64: String,
    #[wasm_bindgen(skip)]
    pub bytes: Vec<u8>,
}

#[wasm_bindgen]
impl HashResult {
    #[wasm_bindgen(getter)]
    pub fn bytes(&self) -> Vec<u8> {
        self.bytes.clone()
    }
}

fn hash_result_from(bytes: Vec<u8>) -> HashResult {
    HashResult {
        hex: hex::encode(&bytes),
        base64: general_purpose::STANDARD.encode(&bytes),
        bytes,
    }
}

/// Ed25519 key pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[wasm_bindgen(getter_with_clone)]
pub struct KeyPair {
    pub public_key: String,
    pub private_key: String,
    pub fingerprint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[wasm_bindgen(getter_with_clone)]
pub struct SignatureResult {
    pub signature: String,
    pub signature_hex: String,
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[wasm_bindgen(getter_with_clone)]
pub struct VerifyResult {
    pub valid: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[wasm_bindgen(getter_with_clone)]
pub struct HmacResult {
    pub hex: String,
    pub base64: String,
    pub success: bool,
}

// ============================================================================
// SHA-256
// ============================================================================

#[wasm_bindgen]
pub fn sha256_hash(data: &str) -> HashResult {
    sha256_hash_bytes(data.as_bytes())
}

#[wasm_bindgen]
pub fn sha256_hash_bytes(data: &[u8]) -> HashResult {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hash_result_from(hasher.finalize().to_vec())
}

#[wasm_bindgen]
pub fn sha256_hex(data: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_bytes());
    hex::encode(hasher.finalize())
}

#[wasm_bindgen]
pub fn sha256_batch(data_array: Vec<String>) -> Vec<String> {
    data_array.iter().map(|s| sha256_hex(s)).collect()
}

// ============================================================================
// HMAC-SHA256
// ============================================================================

#[wasm_bindgen]
pub fn hmac_sha256(key: &str, message: &str) -> HmacResult {
    match HmacSha256::new_from_slice(key.as_bytes()) {
        Ok(mut mac) => {
            mac.update(message.as_bytes());
            let bytes = mac.finalize().into_bytes().to_vec();
            HmacResult {
                hex: hex::encode(&bytes),
                base64: general_purpose::STANDARD.encode(&bytes),
                success: true,
            }
        }
        Err(_) => HmacResult {
            hex: String::new(),
            base64: String::new(),
            success: false,
        },
    }
}

/// Verify an HMAC-SHA256 in constant time. A malformed `expected_hex`
/// (odd length, non-hex characters) is rejected up front — it carries no
/// secret-dependent timing signal to protect.
#[wasm_bindgen]
pub fn hmac_verify(key: &str, message: &str, expected_hex: &str) -> bool {
    let computed = hmac_sha256(key, message);
    if !computed.success {
        return false;
    }
    let Ok(expected_bytes) = hex::decode(expected_hex) else {
        return false;
    };
    let Ok(computed_bytes) = hex::decode(&computed.hex) else {
        return false;
    };
    constant_time_eq(&computed_bytes, &expected_bytes)
}

// ============================================================================
// Ed25519
// ============================================================================

fn generate_keypair_with(rng: &mut impl SecureRandom) -> KernelResult<KeyPair> {
    let mut seed = [0u8; 32];
    rng.fill(&mut seed)?;

    let signing_key = SigningKey::from_bytes(&seed);
    let verifying_key = signing_key.verifying_key();

    let public_bytes = verifying_key.to_bytes();
    let private_bytes = signing_key.to_bytes();

    let fingerprint = hex::encode(Sha256::digest(public_bytes));

    Ok(KeyPair {
        public_key: general_purpose::STANDARD.encode(public_bytes),
        private_key: general_purpose::STANDARD.encode(private_bytes),
        fingerprint,
    })
}

/// Generate a new Ed25519 key pair from OS entropy. Fails loudly
/// (`InternalError`) rather than falling back to a non-cryptographic PRNG.
#[wasm_bindgen]
pub fn generate_keypair() -> Result<KeyPair, JsValue> {
    generate_keypair_with(&mut OsRandom).map_err(Into::into)
}

#[wasm_bindgen]
pub fn sign_message(private_key_base64: &str, message: &str) -> SignatureResult {
    let fail = || SignatureResult {
        signature: String::new(),
        signature_hex: String::new(),
        success: false,
    };

    let Ok(private_bytes) = general_purpose::STANDARD.decode(private_key_base64) else {
        return fail();
    };
    let Ok(private_array): Result<[u8; 32], _> = private_bytes.try_into() else {
        return fail();
    };

    let signing_key = SigningKey::from_bytes(&private_array);
    let signature = signing_key.sign(message.as_bytes());
    let sig_bytes = signature.to_bytes();

    SignatureResult {
        signature: general_purpose::STANDARD.encode(sig_bytes),
        signature_hex: hex::encode(sig_bytes),
        success: true,
    }
}

/// Verify an Ed25519 signature. `error` explains a decode or verification
/// failure without leaking secret material.
#[wasm_bindgen]
pub fn verify_signature(public_key_base64: &str, message: &str, signature_base64: &str) -> VerifyResult {
    let public_bytes = match general_purpose::STANDARD.decode(public_key_base64) {
        Ok(bytes) => bytes,
        Err(e) => {
            return VerifyResult {
                valid: false,
                error: Some(format!("invalid public key encoding: {e}")),
            }
        }
    };

    let Ok(public_array): Result<[u8; 32], _> = public_bytes.try_into() else {
        return VerifyResult {
            valid: false,
            error: Some("public key must be 32 bytes".to_string()),
        };
    };

    let verifying_key = match VerifyingKey::from_bytes(&public_array) {
        Ok(key) => key,
        Err(e) => {
            return VerifyResult {
                valid: false,
                error: Some(format!("invalid public key: {e}")),
            }
        }
    };

    let sig_bytes = match general_purpose::STANDARD.decode(signature_base64) {
        Ok(bytes) => bytes,
        Err(e) => {
            return VerifyResult {
                valid: false,
                error: Some(format!("invalid signature encoding: {e}")),
            }
        }
    };

    let Ok(sig_array): Result<[u8; 64], _> = sig_bytes.try_into() else {
        return VerifyResult {
            valid: false,
            error: Some("signature must be 64 bytes".to_string()),
        };
    };

    let signature = Signature::from_bytes(&sig_array);

    match verifying_key.verify(message.as_bytes(), &signature) {
        Ok(()) => VerifyResult { valid: true, error: None },
        Err(_) => VerifyResult {
            valid: false,
            error: Some("signature verification failed".to_string()),
        },
    }
}

/// Hex SHA-256 of the raw public key bytes, decoded from `public_key_base64`.
/// Returns an empty string if the input isn't valid base64.
#[wasm_bindgen]
pub fn get_key_fingerprint(public_key_base64: &str) -> String {
    match general_purpose::STANDARD.decode(public_key_base64) {
        Ok(bytes) => hex::encode(Sha256::digest(bytes)),
        Err(_) => String::new(),
    }
}

// ============================================================================
// Base64
// ============================================================================

#[wasm_bindgen]
pub fn base64_encode(data: &[u8]) -> String {
    general_purpose::STANDARD.encode(data)
}

#[wasm_bindgen]
pub fn base64_encode_string(data: &str) -> String {
    general_purpose::STANDARD.encode(data.as_bytes())
}

#[wasm_bindgen]
pub fn base64_decode(encoded: &str) -> Vec<u8> {
    general_purpose::STANDARD.decode(encoded).unwrap_or_default()
}

#[wasm_bindgen]
pub fn base64_decode_string(encoded: &str) -> String {
    general_purpose::STANDARD
        .decode(encoded)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_default()
}

#[wasm_bindgen]
pub fn base64_encode_url(data: &[u8]) -> String {
    general_purpose::URL_SAFE_NO_PAD.encode(data)
}

#[wasm_bindgen]
pub fn base64_decode_url(encoded: &str) -> Vec<u8> {
    general_purpose::URL_SAFE_NO_PAD.decode(encoded).unwrap_or_default()
}

// ============================================================================
// Hex
// ============================================================================

#[wasm_bindgen]
pub fn hex_encode(data: &[u8]) -> String {
    hex::encode(data)
}

#[wasm_bindgen]
pub fn hex_decode(encoded: &str) -> Vec<u8> {
    hex::decode(encoded).unwrap_or_default()
}

// ============================================================================
// CSPRNG and derived utilities
// ============================================================================

fn random_bytes_with(rng: &mut impl SecureRandom, length: usize) -> KernelResult<Vec<u8>> {
    let mut bytes = vec![0u8; length];
    rng.fill(&mut bytes)?;
    Ok(bytes)
}

/// Random bytes from the OS entropy source. Fails loudly (`InternalError`)
/// rather than silently falling back to a non-cryptographic PRNG.
#[wasm_bindgen]
pub fn random_bytes(length: usize) -> Result<Vec<u8>, JsValue> {
    random_bytes_with(&mut OsRandom, length).map_err(Into::into)
}

#[wasm_bindgen]
pub fn random_hex_token(byte_length: usize) -> Result<String, JsValue> {
    Ok(hex::encode(random_bytes(byte_length)?))
}

#[wasm_bindgen]
pub fn random_base64_token(byte_length: usize) -> Result<String, JsValue> {
    Ok(general_purpose::URL_SAFE_NO_PAD.encode(random_bytes(byte_length)?))
}

/// Constant-time string comparison, linear in `max(len(a), len(b))`.
#[wasm_bindgen]
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    constant_time_eq(a.as_bytes(), b.as_bytes())
}

/// Iterated SHA-256 key derivation: `k_0 = sha256(password || salt)`,
/// `k_{i+1} = sha256(k_i || salt)`, returns `k_iterations` as lowercase
/// hex. Weaker than PBKDF2/Argon2 — intended only for internal,
/// low-stakes derivations, not password storage.
#[wasm_bindgen]
pub fn derive_key_simple(password: &str, salt: &str, iterations: u32) -> String {
    let mut key = sha256_hex(&format!("{password}{salt}"));
    for _ in 0..iterations {
        key = sha256_hex(&format!("{key}{salt}"));
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hash() {
        let result = sha256_hash("hello");
        assert_eq!(
            result.hex,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert_eq!(result.bytes.len(), 32);
    }

    #[test]
    fn test_sha256_worked_example() {
        // spec.md §8.h
        assert_eq!(
            sha256_hex("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"[..64]
        );
    }

    #[test]
    fn test_sha256_batch() {
        let results = sha256_batch(vec!["hello".to_string(), "world".to_string()]);
        assert_eq!(results.len(), 2);
        assert_eq!(
            results[0],
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_hmac_sha256_and_verify() {
        let result = hmac_sha256("secret", "message");
        assert!(result.success);
        assert!(hmac_verify("secret", "message", &result.hex));
        assert!(!hmac_verify("wrong", "message", &result.hex));
        assert!(!hmac_verify("secret", "wrong", &result.hex));
    }

    #[test]
    fn test_hmac_verify_rejects_malformed_hex() {
        assert!(!hmac_verify("secret", "message", "not-hex!!"));
    }

    #[test]
    fn test_keypair_generation_deterministic() {
        let keypair = generate_keypair_with(&mut DeterministicRandom::new(7)).unwrap();
        assert!(!keypair.public_key.is_empty());
        assert!(!keypair.private_key.is_empty());
        assert_eq!(keypair.fingerprint.len(), 64);

        // same seed -> same keypair
        let keypair2 = generate_keypair_with(&mut DeterministicRandom::new(7)).unwrap();
        assert_eq!(keypair.public_key, keypair2.public_key);
    }

    #[test]
    fn test_fingerprint_hashes_raw_bytes_not_base64_text() {
        let keypair = generate_keypair_with(&mut DeterministicRandom::new(11)).unwrap();
        assert_eq!(keypair.fingerprint, get_key_fingerprint(&keypair.public_key));

        let raw = general_purpose::STANDARD.decode(&keypair.public_key).unwrap();
        assert_eq!(keypair.fingerprint, hex::encode(Sha256::digest(raw)));
        // must NOT equal the sha256 of the base64 text itself
        assert_ne!(keypair.fingerprint, sha256_hex(&keypair.public_key));
    }

    #[test]
    fn test_sign_verify_roundtrip() {
        let keypair = generate_keypair_with(&mut DeterministicRandom::new(3)).unwrap();
        let message = "Hello, World!";

        let signature = sign_message(&keypair.private_key, message);
        assert!(signature.success);

        let verify = verify_signature(&keypair.public_key, message, &signature.signature);
        assert!(verify.valid);
        assert!(verify.error.is_none());
    }

    #[test]
    fn test_verify_signature_rejects_tampered_message() {
        let keypair = generate_keypair_with(&mut DeterministicRandom::new(3)).unwrap();
        let signature = sign_message(&keypair.private_key, "original");
        let verify = verify_signature(&keypair.public_key, "modified", &signature.signature);
        assert!(!verify.valid);
        assert!(verify.error.is_some());
    }

    #[test]
    fn test_base64_roundtrip() {
        let original = "Hello, World!";
        let encoded = base64_encode_string(original);
        assert_eq!(base64_decode_string(&encoded), original);
    }

    #[test]
    fn test_base64_url_roundtrip() {
        let data = vec![0u8, 255, 128, 64, 32];
        let encoded = base64_encode_url(&data);
        assert_eq!(base64_decode_url(&encoded), data);
    }

    #[test]
    fn test_base64_decode_invalid_is_empty() {
        assert!(base64_decode("not valid base64!!!").is_empty());
    }

    #[test]
    fn test_hex_roundtrip() {
        let data = vec![0u8, 255, 128, 64, 32, 16, 8, 4, 2, 1];
        let encoded = hex_encode(&data);
        assert_eq!(hex_decode(&encoded), data);
    }

    #[test]
    fn test_hex_decode_odd_length_is_empty() {
        assert!(hex_decode("abc").is_empty());
    }

    #[test]
    fn test_hex_decode_mixed_case() {
        assert_eq!(hex_decode("DeAdBeEf"), vec![0xde, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn test_random_bytes_deterministic_stream_differs_by_seed() {
        let a = random_bytes_with(&mut DeterministicRandom::new(1), 16).unwrap();
        let b = random_bytes_with(&mut DeterministicRandom::new(2), 16).unwrap();
        assert_ne!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("hello", "hello"));
        assert!(!constant_time_compare("hello", "world"));
        assert!(!constant_time_compare("hello", "hello!"));
    }

    #[test]
    fn test_derive_key_simple() {
        let key1 = derive_key_simple("password", "salt", 1000);
        let key2 = derive_key_simple("password", "salt", 1000);
        let key3 = derive_key_simple("password", "different", 1000);

        assert_eq!(key1, key2);
        assert_ne!(key1, key3);
        assert_eq!(key1.len(), 64);
    }
}
