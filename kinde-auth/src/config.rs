//! Immutable provider settings handed to every flow operation.

use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::error::{config_error, Error};

pub const DEFAULT_SCOPE: &str = "openid profile email offline";
pub const DEFAULT_POST_LOGIN_REDIRECT: &str = "/dashboard";
pub const DEFAULT_POST_LOGOUT_REDIRECT: &str = "/";

/// How the persisted token set is keyed in the transient store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenScoping {
    /// One `tokens` entry shared by every caller of this deployment.
    Shared,
    /// One `tokens:<session>` entry per browser session cookie.
    PerSession,
}

/// Settings for one request context.
///
/// Built once per request by a [`SettingsSource`] and never mutated by the flow.
/// Required values are kept optional here so that a missing one can be reported
/// as a configuration error by the operation that needs it.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub issuer_url: Option<String>,
    pub client_id: Option<String>,
    /// Absent for PKCE-only clients.
    pub client_secret: Option<SecretString>,
    pub redirect_uri: Option<String>,
    pub scope: String,
    pub audience: Option<String>,
    pub post_login_redirect_url: String,
    pub post_logout_redirect_url: String,
    pub pkce_enabled: bool,
    pub token_scoping: TokenScoping,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            issuer_url: None,
            client_id: None,
            client_secret: None,
            redirect_uri: None,
            scope: DEFAULT_SCOPE.to_string(),
            audience: None,
            post_login_redirect_url: DEFAULT_POST_LOGIN_REDIRECT.to_string(),
            post_logout_redirect_url: DEFAULT_POST_LOGOUT_REDIRECT.to_string(),
            pkce_enabled: false,
            token_scoping: TokenScoping::Shared,
        }
    }
}

/// Anything that can produce [`AuthSettings`] (CLI/env config, test fixtures).
pub trait SettingsSource {
    fn auth_settings(&self) -> AuthSettings;
}

impl SettingsSource for AuthSettings {
    fn auth_settings(&self) -> AuthSettings {
        self.clone()
    }
}

impl AuthSettings {
    /// Parsed issuer base URL, or a configuration error.
    pub fn issuer(&self) -> Result<Url, Error> {
        let raw = non_empty(self.issuer_url.as_deref())
            .ok_or_else(|| config_error("Issuer URL is not configured"))?;
        Url::parse(raw).map_err(|e| Error {
            source: Some(Box::new(e)),
            error_kind: crate::error::ErrorKind::Config,
        })
    }

    pub fn require_client_id(&self) -> Result<&str, Error> {
        non_empty(self.client_id.as_deref())
            .ok_or_else(|| config_error("Client ID is not configured"))
    }

    pub fn require_redirect_uri(&self) -> Result<&str, Error> {
        non_empty(self.redirect_uri.as_deref())
            .ok_or_else(|| config_error("Redirect URI is not configured"))
    }

    pub fn require_client_secret(&self) -> Result<&str, Error> {
        self.client_secret
            .as_ref()
            .map(|s| s.expose_secret().as_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| config_error("Client secret is not configured"))
    }

    /// `<issuer>/<path>`, keeping any path prefix the issuer URL already carries.
    pub fn endpoint(&self, path: &str) -> Result<Url, Error> {
        let issuer = self.issuer()?;
        let base = issuer.as_str().trim_end_matches('/');
        Url::parse(&format!("{}/{}", base, path.trim_start_matches('/'))).map_err(|e| Error {
            source: Some(Box::new(e)),
            error_kind: crate::error::ErrorKind::Config,
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
