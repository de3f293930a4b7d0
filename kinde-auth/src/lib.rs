//! # kinde-auth
//!
//! Server-side OAuth 2.0 / OIDC Authorization Code flow against Kinde:
//! - Transient key-value storage for pending authorizations and token sets
//! - CSRF `state` generation and PKCE (S256) verifier/challenge pairs
//! - Authorization URL building, callback handling and token exchange
//! - Logout and the "is authenticated" query surface
//!
//! ## Architecture
//!
//! Every operation is stateless per request: it takes an immutable
//! [`config::AuthSettings`] and a [`store::TransientStore`] handle, and all
//! persisted state lives in the store. The `web` crate only maps results to
//! HTTP responses.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kinde_auth::{
//!     config::AuthSettings,
//!     oauth::{authorization, callback, logout},
//!     session,
//!     store::MemoryStore,
//! };
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod oauth;
pub mod session;
pub mod store;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use error::{Error, ErrorKind};
