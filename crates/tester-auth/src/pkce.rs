//! PKCE (RFC 7636) verifier/challenge pair and the random OAuth `state` value.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Only S256 is ever sent.
pub const CHALLENGE_METHOD: &str = "S256";

fn random_token(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Opaque value correlating an authorization request with its redirect.
pub fn generate_state() -> String {
    random_token(24)
}

/// Code verifier kept in memory for the lifetime of one sign-in attempt.
#[derive(Clone)]
pub struct PkceVerifier {
    verifier: String,
}

impl PkceVerifier {
    /// 32 random bytes encode to a 43 character verifier, the RFC minimum.
    pub fn generate() -> Self {
        Self {
            verifier: random_token(32),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.verifier
    }

    /// `BASE64URL(SHA256(verifier))`
    pub fn challenge(&self) -> String {
        let digest = Sha256::digest(self.verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(digest)
    }
}

impl std::fmt::Debug for PkceVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PkceVerifier(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verifier_length_within_rfc_bounds() {
        let verifier = PkceVerifier::generate();
        assert!(verifier.as_str().len() >= 43);
        assert!(verifier.as_str().len() <= 128);
        assert!(verifier
            .as_str()
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_challenge_matches_rfc_example() {
        // RFC 7636 appendix B
        let verifier = PkceVerifier {
            verifier: "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk".to_string(),
        };
        assert_eq!(
            verifier.challenge(),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn test_generated_values_differ() {
        assert_ne!(generate_state(), generate_state());
        assert_ne!(
            PkceVerifier::generate().as_str(),
            PkceVerifier::generate().as_str()
        );
    }
}
