//! Cryptographic utilities for action tokens.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Number of random bytes behind every action token (256 bits of entropy).
pub const TOKEN_RANDOM_BYTES: usize = 32;

/// Computes SHA-256 hash of the input and returns it as a hex string.
///
/// Action tokens are stored by this digest only, so a leaked table cannot be
/// replayed against the verification endpoints.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Generates an unguessable URL-safe token (base64url, no padding).
pub fn generate_url_safe_token() -> String {
    let mut bytes = [0u8; TOKEN_RANDOM_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex() {
        let hash = sha256_hex("test");
        assert_eq!(hash.len(), 64);
        assert_eq!(
            hash,
            "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
        );
    }

    #[test]
    fn test_sha256_hex_deterministic() {
        assert_eq!(sha256_hex("same_input"), sha256_hex("same_input"));
        assert_ne!(sha256_hex("input1"), sha256_hex("input2"));
    }

    #[test]
    fn test_generate_url_safe_token_length() {
        // 32 bytes encode to 43 base64 characters without padding
        let token = generate_url_safe_token();
        assert_eq!(token.len(), 43);
        assert_eq!(URL_SAFE_NO_PAD.decode(&token).unwrap().len(), 32);
    }

    #[test]
    fn test_generate_url_safe_token_alphabet() {
        let token = generate_url_safe_token();
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_generate_url_safe_token_uniqueness() {
        assert_ne!(generate_url_safe_token(), generate_url_safe_token());
    }
}
