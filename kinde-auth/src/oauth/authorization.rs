//! Authorization request building: registers pending state and produces the
//! provider redirect URL.

use chrono::Utc;
use log::*;
use serde::{Deserialize, Serialize};
use url::Url;

use super::pkce::{PkceVerifier, CHALLENGE_METHOD};
use super::random::generate_state;
use crate::config::AuthSettings;
use crate::error::Error;
use crate::store::{keys, StoredValue, TransientStore, PENDING_TTL_SECS};

/// Provider path of the authorization endpoint, relative to the issuer.
pub const AUTHORIZE_PATH: &str = "oauth2/auth";

/// Which hosted page the provider should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowKind {
    Login,
    Register,
}

impl FlowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowKind::Login => "login",
            FlowKind::Register => "register",
        }
    }
}

/// Caller-controlled inputs of an authorization request.
#[derive(Debug, Clone)]
pub struct AuthorizationParams {
    pub flow: FlowKind,
    pub org_code: Option<String>,
    /// Overrides the configured post-login redirect when it is a safe target.
    pub post_login_redirect: Option<String>,
    /// Existing browser session to bind the resulting tokens to.
    pub session_id: Option<String>,
}

impl AuthorizationParams {
    pub fn new(flow: FlowKind) -> Self {
        Self {
            flow,
            org_code: None,
            post_login_redirect: None,
            session_id: None,
        }
    }
}

/// Marker stored under `state:<id>` while an authorization is in flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingState {
    pub flow: FlowKind,
    pub created_at_ms: i64,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Authorization request with URL and state management data.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    /// Authorization URL to redirect the user to.
    pub url: String,
    /// CSRF state parameter for validation.
    pub state: String,
    /// Where the user lands after the callback completes.
    pub post_login_redirect: String,
    /// Whether a PKCE verifier was registered for this state.
    pub pkce: bool,
}

/// Start a login or registration flow.
///
/// Writes `code_verifier:<state>` (PKCE only), `redirect:<state>` and finally
/// `state:<state>`, all with the pending TTL. If any write fails, the entries
/// already written are removed and a storage error is returned, so a `state`
/// never exists without its redirect.
pub async fn start(
    settings: &AuthSettings,
    store: &dyn TransientStore,
    params: AuthorizationParams,
) -> Result<AuthorizationRequest, Error> {
    let mut url = settings.endpoint(AUTHORIZE_PATH)?;
    let client_id = settings.require_client_id()?;
    let redirect_uri = settings.require_redirect_uri()?;

    let state = generate_state();
    let post_login_redirect =
        resolve_post_login_redirect(settings, params.post_login_redirect.as_deref());
    let verifier = settings.pkce_enabled.then(PkceVerifier::generate);

    let pending = PendingState {
        flow: params.flow,
        created_at_ms: Utc::now().timestamp_millis(),
        session_id: params.session_id.clone(),
    };

    let mut writes = Vec::with_capacity(3);
    if let Some(verifier) = &verifier {
        writes.push((
            keys::code_verifier(&state),
            StoredValue::text(verifier.as_str()),
        ));
    }
    writes.push((keys::redirect(&state), StoredValue::text(&post_login_redirect)));
    writes.push((keys::state(&state), StoredValue::record(&pending)?));

    let mut written: Vec<String> = Vec::with_capacity(writes.len());
    for (key, value) in writes {
        if let Err(e) = store.put(&key, value, Some(PENDING_TTL_SECS)).await {
            error!(
                "Failed to register pending {} state {}: {}",
                params.flow.as_str(),
                state_prefix(&state),
                e
            );
            for key in &written {
                if let Err(cleanup) = store.delete(key).await {
                    warn!("Failed to remove partially registered key: {}", cleanup);
                }
            }
            return Err(e);
        }
        written.push(key);
    }

    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("client_id", client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", &settings.scope)
            .append_pair("state", &state);
        if let Some(verifier) = &verifier {
            query
                .append_pair("code_challenge", verifier.challenge().as_str())
                .append_pair("code_challenge_method", CHALLENGE_METHOD);
        }
        if let Some(org_code) = params.org_code.as_deref().filter(|c| !c.is_empty()) {
            query.append_pair("org_code", org_code);
        }
        if let Some(audience) = settings.audience.as_deref().filter(|a| !a.is_empty()) {
            query.append_pair("audience", audience);
        }
        if params.flow == FlowKind::Register {
            query.append_pair("prompt", "create");
        }
    }

    info!(
        "Registered pending {} state {} (pkce: {})",
        params.flow.as_str(),
        state_prefix(&state),
        verifier.is_some()
    );

    Ok(AuthorizationRequest {
        url: url.into(),
        state,
        post_login_redirect,
        pkce: verifier.is_some(),
    })
}

/// Pick the post-login target: the caller's override when it stays on this
/// application, otherwise the configured default.
///
/// Accepted overrides are same-origin paths (`/x`, not `//x`) and absolute
/// URLs on the redirect URI's origin.
pub fn resolve_post_login_redirect(settings: &AuthSettings, requested: Option<&str>) -> String {
    let requested = match requested.map(str::trim).filter(|r| !r.is_empty()) {
        Some(requested) => requested,
        None => return settings.post_login_redirect_url.clone(),
    };

    // Browsers drop tabs and newlines while parsing, so `/\t/host` becomes `//host`.
    if requested
        .chars()
        .any(|c| c.is_control() || c.is_whitespace())
    {
        warn!("Ignoring post_login_redirect_url override containing control characters");
        return settings.post_login_redirect_url.clone();
    }

    if requested.starts_with('/') && !requested.starts_with("//") && !requested.contains('\\') {
        return requested.to_string();
    }

    let app_origin = settings
        .redirect_uri
        .as_deref()
        .and_then(|uri| Url::parse(uri).ok())
        .map(|uri| uri.origin());
    let requested_url = Url::parse(requested).ok();

    match (app_origin, requested_url) {
        (Some(app), Some(url)) if url.origin() == app && app.is_tuple() => url.into(),
        _ => {
            warn!("Ignoring off-site post_login_redirect_url override");
            settings.post_login_redirect_url.clone()
        }
    }
}

/// First characters of a state id, enough to correlate log lines.
pub(crate) fn state_prefix(state: &str) -> &str {
    state.get(..6).unwrap_or(state)
}
