//! Random identifiers for `state` and PKCE verifiers.

use rand::distributions::{Alphanumeric, DistString};

/// Length of the CSRF `state` parameter.
pub const STATE_LENGTH: usize = 24;

/// Length of a PKCE code verifier (~381 bits of entropy).
pub const VERIFIER_LENGTH: usize = 64;

/// Generate a random alphanumeric token from the thread-local CSPRNG.
pub fn random_token(length: usize) -> String {
    Alphanumeric.sample_string(&mut rand::thread_rng(), length)
}

/// Generate a fresh CSRF `state` value.
pub fn generate_state() -> String {
    random_token(STATE_LENGTH)
}
