use base64::engine::general_purpose;
use base64::Engine as _;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Digest;
use sha2::Sha256;

/// Number of random bytes in an opaque token.
pub const OPAQUE_TOKEN_BYTES: usize = 32;

/// Generate an opaque, unguessable token string.
///
/// 256 bits from the OS CSPRNG, base64url without padding (43 characters).
/// Used for refresh tokens and for secrets nobody is meant to know.
pub fn generate_opaque_token() -> String {
    let mut bytes = [0u8; OPAQUE_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);

    general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Digest an opaque token for storage and lookup.
///
/// Hex-encoded SHA-256 (64 characters). Only the digest is persisted, so a
/// copy of the store does not hand out usable tokens.
pub fn hash_opaque_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_token_shape() {
        let token = generate_opaque_token();

        assert_eq!(token.len(), 43);
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_hash_is_stable_hex_digest() {
        let token = generate_opaque_token();
        let digest = hash_opaque_token(&token);

        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(digest, hash_opaque_token(&token));
        assert_ne!(digest, hash_opaque_token(&generate_opaque_token()));
        assert_eq!(
            hash_opaque_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_tokens_are_unique() {
        let tokens: HashSet<String> = (0..1000).map(|_| generate_opaque_token()).collect();
        assert_eq!(tokens.len(), 1000);
    }
}
