//! Error types for the `kinde-auth` crate.
//!
//! A root `Error` struct holds an error kind tree and an optional source for
//! error chaining. The `web` crate maps the kinds to HTTP status codes and
//! fixed public messages; the `source` is for logs only.

use std::error::Error as StdError;
use std::fmt;

/// Top-level error type for kinde-auth crate.
/// Holds error kind and optional source for error chaining.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

/// Major categories of errors in kinde-auth.
#[derive(Debug, PartialEq)]
pub enum ErrorKind {
    /// Required settings (issuer URL, client id, redirect URI, ...) are missing.
    Config,
    Storage(StorageErrorKind),
    Request(RequestErrorKind),
    OAuth(OAuthErrorKind),
}

/// Errors from the transient state store.
#[derive(Debug, PartialEq)]
pub enum StorageErrorKind {
    /// No backing store is provisioned for this deployment.
    Unavailable,
    /// A put/get/delete against the backing store failed.
    Operation,
    /// A stored value could not be encoded or decoded.
    Serialization,
}

/// Errors caused by the inbound request itself.
#[derive(Debug, PartialEq)]
pub enum RequestErrorKind {
    MissingParameters,
    UnknownEndpoint,
}

/// Errors from the OAuth flow.
#[derive(Debug, PartialEq)]
pub enum OAuthErrorKind {
    /// The provider redirected back with an `error` parameter.
    /// Holds the provider's error (and description, if any) verbatim.
    Provider(String),
    /// The `state` is unknown, consumed or expired.
    InvalidState,
    /// PKCE is enabled but no verifier was registered for the `state`.
    MissingCodeVerifier,
    /// The token endpoint was unreachable, timed out, or answered non-2xx / non-JSON.
    TokenExchangeFailed,
    /// The token endpoint answered JSON without an `access_token`.
    MalformedTokenResponse,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.error_kind {
            ErrorKind::Config => write!(f, "Configuration error"),
            ErrorKind::Storage(kind) => write!(f, "Storage error: {:?}", kind),
            ErrorKind::Request(kind) => write!(f, "Request error: {:?}", kind),
            ErrorKind::OAuth(kind) => write!(f, "OAuth error: {:?}", kind),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

// Every reqwest failure on the token endpoint surfaces as a failed exchange;
// the KV backend maps its own failures to storage errors explicitly.
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::OAuth(OAuthErrorKind::TokenExchangeFailed),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::Storage(StorageErrorKind::Serialization),
        }
    }
}

/// Helper function to create configuration errors.
pub fn config_error(message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Config,
    }
}

/// Helper function to create storage errors.
pub fn storage_error(kind: StorageErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Storage(kind),
    }
}

/// Helper function to create request errors.
pub fn request_error(kind: RequestErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Request(kind),
    }
}

/// Helper function to create OAuth errors.
pub fn oauth_error(kind: OAuthErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::OAuth(kind),
    }
}
