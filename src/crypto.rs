//! Cryptographic helpers shared by the key registry and the webhook dispatcher.
//!
//! - Secret generation (32 random bytes, hex encoded)
//! - SHA-256 hashing of API key secrets
//! - HMAC-SHA256 signing and constant-time verification of webhook payloads

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Prefix of the `X-Webhook-Signature` header value.
pub const SIGNATURE_PREFIX: &str = "sha256=";

/// Generate a cryptographically secure random secret.
///
/// # Output
///
/// 64 hex characters (32 random bytes, 256 bits of entropy)
pub fn generate_secret() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

/// One-way hash of an API key secret, as stored by the registry.
pub fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

fn keyed_mac(secret: &str) -> HmacSha256 {
    HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC key length is valid")
}

/// Generate HMAC-SHA256 signature for a webhook payload.
///
/// # Format
///
/// `sha256=<hex_encoded_hmac>`
pub fn sign_payload(secret: &str, payload: &[u8]) -> String {
    let mut mac = keyed_mac(secret);
    mac.update(payload);
    format!(
        "{SIGNATURE_PREFIX}{}",
        hex::encode(mac.finalize().into_bytes())
    )
}

/// Verify a `sha256=<hex>` signature over the raw received payload.
///
/// The comparison is constant-time. A missing prefix, invalid hex, or a digest
/// of the wrong length is a rejection, never an error.
pub fn verify_signature(secret: &str, payload: &[u8], signature: &str) -> bool {
    let Some(hex_signature) = signature.strip_prefix(SIGNATURE_PREFIX) else {
        return false;
    };
    let Ok(presented) = hex::decode(hex_signature) else {
        return false;
    };

    let mut mac = keyed_mac(secret);
    mac.update(payload);
    mac.verify_slice(&presented).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secrets_are_256_bit_and_unique() {
        let a = generate_secret();
        let b = generate_secret();

        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn hash_is_deterministic_sha256_hex() {
        let hash = hash_secret("ak_test");
        assert_eq!(hash, hash_secret("ak_test"));
        assert_eq!(hash.len(), 64);
        assert_ne!(hash, hash_secret("ak_test2"));
    }

    #[test]
    fn known_hmac_vector() {
        // RFC 4231 test case 2
        let signature = sign_payload("Jefe", b"what do ya want for nothing?");
        assert_eq!(
            signature,
            "sha256=5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn verifies_own_signature() {
        let payload = br#"{"event":"task.created"}"#;
        let signature = sign_payload("secret", payload);
        assert!(verify_signature("secret", payload, &signature));
        assert!(!verify_signature("other-secret", payload, &signature));
    }

    #[test]
    fn single_flipped_byte_fails_verification() {
        let payload = br#"{"event":"process.completed","data":{"id":1}}"#.to_vec();
        let signature = sign_payload("secret", &payload);

        let mut tampered = payload.clone();
        tampered[10] ^= 0x01;

        assert!(signature.starts_with(SIGNATURE_PREFIX));
        assert!(!verify_signature("secret", &tampered, &signature));
    }

    #[test]
    fn malformed_signatures_are_rejected() {
        let payload = b"body";
        let signature = sign_payload("secret", payload);
        let hex_part = signature.trim_start_matches(SIGNATURE_PREFIX);

        assert!(!verify_signature("secret", payload, hex_part));
        assert!(!verify_signature("secret", payload, "sha256=zz"));
        assert!(!verify_signature("secret", payload, &signature[..signature.len() - 2]));
        assert!(!verify_signature("secret", payload, &format!("{signature}00")));
        assert!(!verify_signature("secret", payload, ""));
    }

    #[test]
    fn keys_of_any_length_sign_and_verify() {
        let payload = b"body";
        let long_key = "k".repeat(200);

        for key in ["", "k", long_key.as_str()] {
            let signature = sign_payload(key, payload);
            assert!(verify_signature(key, payload, &signature));
        }
    }
}
