//! OAuth callback handling: state verification, code exchange, token persistence.

use log::*;
use serde::Deserialize;

use super::authorization::{state_prefix, PendingState};
use super::random::random_token;
use super::token::{exchange_code, ClientCredential};
use crate::config::{AuthSettings, TokenScoping};
use crate::error::{oauth_error, request_error, Error, ErrorKind, OAuthErrorKind, RequestErrorKind};
use crate::store::{keys, StoredValue, TransientStore};

/// Provider path of the token endpoint, relative to the issuer.
pub const TOKEN_PATH: &str = "oauth2/token";

/// Length of session ids minted for per-session token scoping.
pub const SESSION_ID_LENGTH: usize = 32;

/// Query parameters of the provider's redirect back to the application.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Result of a completed callback.
#[derive(Debug, Clone, PartialEq)]
pub struct CallbackOutcome {
    /// Where to send the user agent.
    pub redirect_to: String,
    /// Session the tokens were stored under, when tokens are scoped per session.
    pub session_id: Option<String>,
}

/// Complete an authorization: verify `state`, exchange `code`, store the tokens.
///
/// The pending entries for `state` are deleted before the exchange, so a state
/// can be redeemed at most once whatever the exchange outcome. If the state
/// marker itself cannot be deleted the callback fails with a storage error.
pub async fn complete(
    settings: &AuthSettings,
    store: &dyn TransientStore,
    http_client: &reqwest::Client,
    params: CallbackParams,
) -> Result<CallbackOutcome, Error> {
    if let Some(provider_error) = params.error.as_deref().filter(|e| !e.is_empty()) {
        let message = match params.error_description.as_deref().filter(|d| !d.is_empty()) {
            Some(description) => format!("{}: {}", provider_error, description),
            None => provider_error.to_string(),
        };
        warn!("Provider returned an error to the callback: {}", message);
        return Err(oauth_error(
            OAuthErrorKind::Provider(message),
            "Provider returned an error",
        ));
    }

    let (code, state) = match (non_empty(&params.code), non_empty(&params.state)) {
        (Some(code), Some(state)) => (code, state),
        _ => {
            return Err(request_error(
                RequestErrorKind::MissingParameters,
                "Callback requires code and state",
            ))
        }
    };

    let token_url = settings.endpoint(TOKEN_PATH)?;
    let client_id = settings.require_client_id()?;
    let redirect_uri = settings.require_redirect_uri()?;
    if !settings.pkce_enabled {
        settings.require_client_secret()?;
    }

    let pending = lookup_pending_state(store, state).await?;
    let redirect_to = lookup_redirect(settings, store, state).await;
    let verifier = lookup_verifier(store, state).await;

    consume_pending(store, state).await?;

    let credential = match (settings.pkce_enabled, verifier.as_deref()) {
        (true, Some(verifier)) => ClientCredential::Verifier(verifier),
        (true, None) => {
            warn!(
                "No PKCE code verifier registered for state {}",
                state_prefix(state)
            );
            return Err(oauth_error(
                OAuthErrorKind::MissingCodeVerifier,
                "PKCE is enabled but no code verifier was found",
            ));
        }
        (false, _) => ClientCredential::Secret(settings.require_client_secret()?),
    };

    let tokens = exchange_code(
        http_client,
        token_url,
        client_id,
        redirect_uri,
        code,
        credential,
    )
    .await
    .inspect_err(|e| {
        warn!(
            "Token exchange failed for state {}: {}",
            state_prefix(state),
            e
        )
    })?;

    let session_id = match settings.token_scoping {
        TokenScoping::Shared => None,
        TokenScoping::PerSession => Some(
            pending
                .and_then(|p| p.session_id)
                .unwrap_or_else(|| random_token(SESSION_ID_LENGTH)),
        ),
    };

    store
        .put(
            &keys::tokens(session_id.as_deref()),
            StoredValue::record(&tokens)?,
            None,
        )
        .await
        .inspect_err(|e| error!("Failed to persist token set: {}", e))?;

    info!(
        "Completed authorization for state {}; redirecting",
        state_prefix(state)
    );

    Ok(CallbackOutcome {
        redirect_to,
        session_id,
    })
}

/// Resolve `state:<id>`. Absent, expired, or unreadable all mean invalid state.
///
/// Returns the pending record when the marker is one; a bare marker string
/// (written by older deployments) is accepted as present without metadata.
async fn lookup_pending_state(
    store: &dyn TransientStore,
    state: &str,
) -> Result<Option<PendingState>, Error> {
    let marker = match store.get(&keys::state(state)).await {
        Ok(Some(marker)) => marker,
        Ok(None) => {
            warn!(
                "Unknown or expired state {} presented to callback; possible replay or CSRF attempt",
                state_prefix(state)
            );
            return Err(oauth_error(
                OAuthErrorKind::InvalidState,
                "State not found or expired",
            ));
        }
        Err(e) => {
            error!(
                "State lookup failed for {}, treating as invalid: {}",
                state_prefix(state),
                e
            );
            return Err(Error {
                source: Some(Box::new(e)),
                error_kind: ErrorKind::OAuth(OAuthErrorKind::InvalidState),
            });
        }
    };

    Ok(match marker {
        StoredValue::Record(_) => marker.into_record::<PendingState>().ok(),
        StoredValue::Text(_) => None,
    })
}

async fn lookup_redirect(settings: &AuthSettings, store: &dyn TransientStore, state: &str) -> String {
    match store.get(&keys::redirect(state)).await {
        Ok(Some(StoredValue::Text(redirect))) if !redirect.trim().is_empty() => redirect,
        Ok(_) => settings.post_login_redirect_url.clone(),
        Err(e) => {
            warn!("Redirect lookup failed, using default: {}", e);
            settings.post_login_redirect_url.clone()
        }
    }
}

async fn lookup_verifier(store: &dyn TransientStore, state: &str) -> Option<String> {
    match store.get(&keys::code_verifier(state)).await {
        Ok(Some(StoredValue::Text(verifier))) if !verifier.is_empty() => Some(verifier),
        Ok(_) => None,
        Err(e) => {
            warn!("Code verifier lookup failed: {}", e);
            None
        }
    }
}

/// Delete every pending entry for `state`. Failures are logged; the TTL
/// still bounds how long a leftover entry lives.
async fn consume_pending(store: &dyn TransientStore, state: &str) -> Result<(), Error> {
    // The marker must be gone before the exchange, or the state stays redeemable.
    store.delete(&keys::state(state)).await.inspect_err(|e| {
        error!(
            "Failed to consume state {}; aborting callback: {}",
            state_prefix(state),
            e
        )
    })?;

    for key in [keys::redirect(state), keys::code_verifier(state)] {
        if let Err(e) = store.delete(&key).await {
            error!(
                "Failed to delete pending key for state {}: {}",
                state_prefix(state),
                e
            );
        }
    }
    Ok(())
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
