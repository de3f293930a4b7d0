//! HTTP client used for server-to-server calls to the identity provider.

use std::time::Duration;

use crate::error::{Error, ErrorKind, OAuthErrorKind};

/// Default bound on a single token-endpoint call.
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// HTTP client configuration.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Request timeout. A call that exceeds it fails the token exchange.
    pub timeout: Duration,
    /// User agent string.
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: format!("kinde-auth/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpClientConfig {
    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the configured HTTP client.
    ///
    /// Requests are never retried: authorization codes are single-use.
    pub fn build(self) -> Result<reqwest::Client, Error> {
        reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(self.timeout)
            .user_agent(self.user_agent)
            .build()
            .map_err(|e| Error {
                source: Some(Box::new(e)),
                error_kind: ErrorKind::OAuth(OAuthErrorKind::TokenExchangeFailed),
            })
    }
}
