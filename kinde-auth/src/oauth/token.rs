//! Token set persisted after a successful exchange, and the exchange itself.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use log::*;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{oauth_error, Error, ErrorKind, OAuthErrorKind};

/// Lifetime assumed when the token endpoint omits `expires_in`.
pub const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// Longest slice of an upstream error body written to the log.
const MAX_LOGGED_BODY: usize = 512;

/// OAuth tokens with metadata, as stored under the `tokens` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub id_token: Option<String>,
    /// Lifetime of the access token in seconds, as reported at issue time.
    pub expires_in: i64,
    /// Issue time in epoch milliseconds.
    #[serde(rename = "timestamp")]
    pub issued_at_ms: i64,
}

impl TokenSet {
    pub fn has_access_token(&self) -> bool {
        !self.access_token.trim().is_empty()
    }

    /// Claims from the ID token payload.
    ///
    /// The signature is NOT verified; use for display only.
    pub fn id_token_claims(&self) -> Option<IdTokenClaims> {
        let payload = self.id_token.as_deref()?.split('.').nth(1)?;
        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .ok()?;
        serde_json::from_slice(&bytes).ok()
    }
}

/// Profile claims carried by a Kinde ID token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdTokenClaims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

/// OAuth token response from the provider.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// How the client proves itself at the token endpoint. Exactly one is sent.
pub enum ClientCredential<'a> {
    /// Confidential client flow.
    Secret(&'a str),
    /// PKCE flow.
    Verifier(&'a str),
}

/// Request to exchange authorization code for tokens
#[derive(Serialize)]
struct TokenExchangeRequest<'a> {
    grant_type: &'static str,
    code: &'a str,
    redirect_uri: &'a str,
    client_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_secret: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code_verifier: Option<&'a str>,
}

/// Exchange authorization code for tokens at `token_url`.
///
/// Transport failures, timeouts, non-2xx statuses and non-JSON bodies are
/// `TokenExchangeFailed`; JSON without an `access_token` is
/// `MalformedTokenResponse`. Upstream bodies are logged, never returned.
pub async fn exchange_code(
    client: &reqwest::Client,
    token_url: Url,
    client_id: &str,
    redirect_uri: &str,
    code: &str,
    credential: ClientCredential<'_>,
) -> Result<TokenSet, Error> {
    let (client_secret, code_verifier) = match credential {
        ClientCredential::Secret(secret) => (Some(secret), None),
        ClientCredential::Verifier(verifier) => (None, Some(verifier)),
    };

    let request = TokenExchangeRequest {
        grant_type: "authorization_code",
        code,
        redirect_uri,
        client_id,
        client_secret,
        code_verifier,
    };

    debug!(
        "Exchanging authorization code for tokens (pkce: {})",
        code_verifier.is_some()
    );

    let response = client
        .post(token_url)
        .header(reqwest::header::ACCEPT, "application/json")
        .form(&request)
        .send()
        .await
        .map_err(|e| {
            warn!("Token endpoint request failed (timeout: {}): {:?}", e.is_timeout(), e);
            Error::from(e)
        })?;

    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        warn!(
            "Token endpoint returned {}: {}",
            status,
            truncate(&body, MAX_LOGGED_BODY)
        );
        return Err(oauth_error(
            OAuthErrorKind::TokenExchangeFailed,
            &format!("Token endpoint returned {}", status),
        ));
    }

    let json: serde_json::Value = serde_json::from_str(&body).map_err(|e| {
        warn!("Token endpoint returned a non-JSON body: {:?}", e);
        Error {
            source: Some(Box::new(e)),
            error_kind: ErrorKind::OAuth(OAuthErrorKind::TokenExchangeFailed),
        }
    })?;

    let tokens: TokenResponse = serde_json::from_value(json).map_err(|e| Error {
        source: Some(Box::new(e)),
        error_kind: ErrorKind::OAuth(OAuthErrorKind::MalformedTokenResponse),
    })?;

    let access_token = tokens
        .access_token
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            warn!("Token endpoint response carried no access_token");
            oauth_error(
                OAuthErrorKind::MalformedTokenResponse,
                "Token response is missing access_token",
            )
        })?;

    info!("Successfully exchanged authorization code for tokens");

    Ok(TokenSet {
        access_token,
        refresh_token: tokens.refresh_token,
        id_token: tokens.id_token,
        expires_in: tokens.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS),
        issued_at_ms: Utc::now().timestamp_millis(),
    })
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
