//! Enrollment tokens.
//!
//! Tokens are single-use shared secrets handed to a device out-of-band.
//! They are generated from 32 bytes of OS entropy and rendered as URL-safe
//! base64 so they survive copy/paste and QR encoding.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Number of random bytes in a generated token.
const TOKEN_ENTROPY_BYTES: usize = 32;

/// Generate a fresh enrollment token.
#[must_use]
pub fn generate_token() -> String {
    let mut random = [0u8; TOKEN_ENTROPY_BYTES];
    OsRng.fill_bytes(&mut random);
    URL_SAFE_NO_PAD.encode(random)
}

/// Compare a presented token with the expected one in constant time.
///
/// Both sides are hashed first so that neither the contents nor the length
/// of the expected token influence timing.
#[must_use]
pub fn token_matches(expected: &str, presented: &str) -> bool {
    let expected = Sha256::digest(expected.as_bytes());
    let presented = Sha256::digest(presented.as_bytes());
    expected.as_slice().ct_eq(presented.as_slice()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_token_format() {
        let token = generate_token();
        // 32 bytes -> 43 chars of unpadded base64
        assert_eq!(token.len(), 43);
        assert!(URL_SAFE_NO_PAD.decode(&token).is_ok());
    }

    #[test]
    fn test_generated_tokens_unique() {
        assert_ne!(generate_token(), generate_token());
    }

    #[test]
    fn test_token_matches() {
        assert!(token_matches("abc123", "abc123"));
        assert!(!token_matches("abc123", "abc124"));
        assert!(!token_matches("abc123", "abc1234"));
        assert!(!token_matches("abc123", ""));
    }
}
