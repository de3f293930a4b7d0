//! PKCE (Proof Key for Code Exchange) support for OAuth 2.0.
//!
//! Implements the RFC 7636 `S256` method for binding the authorization request
//! to the token exchange.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use sha2::{Digest, Sha256};

use super::random::{random_token, VERIFIER_LENGTH};

/// The only challenge method this crate emits.
pub const CHALLENGE_METHOD: &str = "S256";

/// PKCE code verifier (random string).
#[derive(Debug, Clone)]
pub struct PkceVerifier(String);

impl PkceVerifier {
    /// Generate a new random PKCE verifier of 64 alphanumeric characters.
    pub fn generate() -> Self {
        Self(random_token(VERIFIER_LENGTH))
    }

    /// Create a PKCE verifier from an existing string.
    pub fn from_string(verifier: String) -> Self {
        Self(verifier)
    }

    /// Get the verifier string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Generate the corresponding code challenge.
    pub fn challenge(&self) -> PkceChallenge {
        PkceChallenge::from_verifier(self)
    }
}

/// PKCE code challenge (SHA256 hash of verifier).
#[derive(Debug, Clone)]
pub struct PkceChallenge(String);

impl PkceChallenge {
    /// Create a code challenge from a verifier.
    ///
    /// `BASE64URL-NOPAD(SHA256(verifier))`
    pub fn from_verifier(verifier: &PkceVerifier) -> Self {
        Self(code_challenge(verifier.as_str()))
    }

    /// Get the challenge string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// S256 code challenge for a raw verifier string.
pub fn code_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}
