//! OAuth 2.0 Authorization Code flow against the provider.
//!
//! - [`authorization`]: start a login or registration, register pending state
//! - [`callback`]: validate state, exchange the code, persist tokens
//! - [`logout`]: clear tokens and build the provider logout URL
//! - [`pkce`] / [`random`]: verifier, challenge and state generation
//! - [`token`]: the token endpoint request and the persisted token set

pub mod authorization;
pub mod callback;
pub mod logout;
pub mod pkce;
pub mod random;
pub mod token;

pub use authorization::{AuthorizationParams, AuthorizationRequest, FlowKind};
pub use callback::{CallbackOutcome, CallbackParams};
pub use token::{IdTokenClaims, TokenSet};
