// src/core/handler/pipeline/auth.rs

//! Shared-secret verification for the first frame of a connection.

use sha2::{Digest, Sha256};

/// Compares the presented key against the configured secret.
///
/// Both sides are hashed first, so the byte-wise comparison runs over
/// fixed-length digests and its duration does not depend on which byte of
/// the secret differs.
pub fn verify_api_key(expected: &str, presented: &str) -> bool {
    let expected = Sha256::digest(expected.as_bytes());
    let presented = Sha256::digest(presented.as_bytes());
    let mut diff = 0u8;
    for (a, b) in expected.iter().zip(presented.iter()) {
        diff |= a ^ b;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::verify_api_key;

    #[test]
    fn accepts_exact_match_only() {
        assert!(verify_api_key("s3cret", "s3cret"));
        assert!(!verify_api_key("s3cret", "s3cret "));
        assert!(!verify_api_key("s3cret", ""));
        assert!(!verify_api_key("s3cret", "S3CRET"));
    }
}
