use std::error::Error as StdError;

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use log::*;
use serde_json::json;

use kinde_auth::error::{
    Error as AuthError, ErrorKind, OAuthErrorKind, RequestErrorKind, StorageErrorKind,
};

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug)]
pub struct Error(AuthError);

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        &self.0.error_kind
    }

    /// Status code and public message for this error. Nothing from the
    /// error's `source` ever reaches the client.
    fn status_and_message(&self) -> (StatusCode, String) {
        match self.kind() {
            ErrorKind::Config => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Authentication is not configured".to_string(),
            ),
            ErrorKind::Storage(storage_error_kind) => match storage_error_kind {
                StorageErrorKind::Unavailable => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Storage unavailable".to_string(),
                ),
                StorageErrorKind::Operation | StorageErrorKind::Serialization => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Storage operation failed".to_string(),
                ),
            },
            ErrorKind::Request(request_error_kind) => match request_error_kind {
                RequestErrorKind::MissingParameters => (
                    StatusCode::BAD_REQUEST,
                    "Missing code or state parameter".to_string(),
                ),
                RequestErrorKind::UnknownEndpoint => {
                    (StatusCode::NOT_FOUND, "Unknown auth endpoint".to_string())
                }
            },
            ErrorKind::OAuth(oauth_error_kind) => match oauth_error_kind {
                OAuthErrorKind::Provider(message) => (StatusCode::BAD_REQUEST, message.clone()),
                OAuthErrorKind::InvalidState => (
                    StatusCode::UNAUTHORIZED,
                    "Invalid or expired state".to_string(),
                ),
                OAuthErrorKind::MissingCodeVerifier => (
                    StatusCode::UNAUTHORIZED,
                    "Missing code verifier".to_string(),
                ),
                OAuthErrorKind::TokenExchangeFailed => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Token exchange failed".to_string(),
                ),
                OAuthErrorKind::MalformedTokenResponse => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Malformed token response".to_string(),
                ),
            },
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&self.0)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> core::result::Result<(), std::fmt::Error> {
        write!(fmt, "{}", self.0)
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        if status.is_server_error() {
            error!("Auth request failed: {:?}", self.0);
        } else {
            debug!("Auth request rejected: {}", self.0);
        }

        (
            status,
            [(header::CACHE_CONTROL, "no-store")],
            Json(json!({ "error": message })),
        )
            .into_response()
    }
}

impl<E> From<E> for Error
where
    E: Into<AuthError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
