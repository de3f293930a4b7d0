//! Controller for the multiplexed auth entry point.
//!
//! One route receives every `<base>/<endpoint>` request and dispatches on the
//! last path segment: `login`, `register`, `kinde_callback` or `logout`.
//!
//! Note: these endpoints are reached through browser redirects, so they
//! neither require a session nor accept custom headers.

use crate::{AppState, Error};

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use kinde_auth::config::{AuthSettings, TokenScoping};
use kinde_auth::error::{request_error, storage_error, RequestErrorKind, StorageErrorKind};
use kinde_auth::oauth::{
    authorization, callback, logout, AuthorizationParams, CallbackParams, FlowKind,
};
use kinde_auth::session::{new_session_id, SESSION_COOKIE};
use kinde_auth::store::TransientStore;
use log::*;
use serde::Deserialize;

/// Query parameters accepted by any auth endpoint; each endpoint reads its own.
#[derive(Debug, Default, Deserialize)]
pub struct AuthQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
    pub org_code: Option<String>,
    pub post_login_redirect_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum AuthEndpoint {
    Login,
    Register,
    Callback,
    Logout,
}

impl AuthEndpoint {
    fn from_path(path: &str) -> Option<Self> {
        match path.trim_end_matches('/').rsplit('/').next()? {
            "login" => Some(AuthEndpoint::Login),
            "register" => Some(AuthEndpoint::Register),
            "kinde_callback" => Some(AuthEndpoint::Callback),
            "logout" => Some(AuthEndpoint::Logout),
            _ => None,
        }
    }
}

/// GET /api/auth/{endpoint}
///
/// Starts a login or registration, completes the provider callback, or logs out.
#[utoipa::path(
    get,
    path = "/api/auth/{endpoint}",
    params(
        ("endpoint" = String, Path, description = "One of login, register, kinde_callback, logout"),
        ("org_code" = Option<String>, Query, description = "Organization to sign in to (login/register)"),
        ("post_login_redirect_url" = Option<String>, Query, description = "Same-origin landing page after login"),
        ("code" = Option<String>, Query, description = "Authorization code (kinde_callback)"),
        ("state" = Option<String>, Query, description = "CSRF state (kinde_callback)"),
        ("error" = Option<String>, Query, description = "Provider error (kinde_callback)"),
        ("error_description" = Option<String>, Query, description = "Provider error detail (kinde_callback)"),
    ),
    responses(
        (status = 302, description = "Redirect to the provider or back to the application"),
        (status = 400, description = "Provider error or missing code/state"),
        (status = 401, description = "Invalid or expired state, or missing PKCE code verifier"),
        (status = 404, description = "Unknown auth endpoint"),
        (status = 500, description = "Configuration, storage or token exchange failure"),
    )
)]
pub async fn auth(
    State(app_state): State<AppState>,
    Path(endpoint): Path<String>,
    Query(query): Query<AuthQuery>,
    jar: CookieJar,
) -> Result<Response, Error> {
    let auth_endpoint = AuthEndpoint::from_path(&endpoint).ok_or_else(|| {
        debug!("Unknown auth endpoint requested: {}", endpoint);
        request_error(RequestErrorKind::UnknownEndpoint, "Unknown auth endpoint")
    })?;

    let store = app_state.store().ok_or_else(|| {
        error!("Auth request received but no transient store is configured");
        storage_error(
            StorageErrorKind::Unavailable,
            "No transient store configured",
        )
    })?;

    let settings = app_state.auth_settings();
    let secure = app_state.config.is_production();

    match auth_endpoint {
        AuthEndpoint::Login => start(&settings, store, FlowKind::Login, query, jar, secure).await,
        AuthEndpoint::Register => {
            start(&settings, store, FlowKind::Register, query, jar, secure).await
        }
        AuthEndpoint::Callback => complete(&app_state, &settings, store, query, jar, secure).await,
        AuthEndpoint::Logout => end(&settings, store, jar).await,
    }
}

async fn start(
    settings: &AuthSettings,
    store: &dyn TransientStore,
    flow: FlowKind,
    query: AuthQuery,
    jar: CookieJar,
    secure: bool,
) -> Result<Response, Error> {
    let session_id = match settings.token_scoping {
        TokenScoping::Shared => None,
        TokenScoping::PerSession => {
            Some(session_cookie_value(&jar).unwrap_or_else(new_session_id))
        }
    };

    let params = AuthorizationParams {
        flow,
        org_code: query.org_code,
        post_login_redirect: query.post_login_redirect_url,
        session_id: session_id.clone(),
    };
    let request = authorization::start(settings, store, params).await?;

    let jar = match session_id {
        Some(id) => jar.add(session_cookie(id, secure)),
        None => jar,
    };
    Ok(found(jar, request.url))
}

async fn complete(
    app_state: &AppState,
    settings: &AuthSettings,
    store: &dyn TransientStore,
    query: AuthQuery,
    jar: CookieJar,
    secure: bool,
) -> Result<Response, Error> {
    let params = CallbackParams {
        code: query.code,
        state: query.state,
        error: query.error,
        error_description: query.error_description,
    };
    let outcome = callback::complete(settings, store, &app_state.http_client, params).await?;

    let jar = match outcome.session_id {
        Some(id) => jar.add(session_cookie(id, secure)),
        None => jar,
    };
    Ok(found(jar, outcome.redirect_to))
}

async fn end(
    settings: &AuthSettings,
    store: &dyn TransientStore,
    jar: CookieJar,
) -> Result<Response, Error> {
    let session_id = session_cookie_value(&jar);
    let url = logout::logout(settings, store, session_id.as_deref()).await;

    let jar = match settings.token_scoping {
        TokenScoping::PerSession => jar.remove(Cookie::build(SESSION_COOKIE).path("/")),
        TokenScoping::Shared => jar,
    };
    Ok(found(jar, url))
}

/// Session id from the request cookie, if it looks like one we minted.
pub(crate) fn session_cookie_value(jar: &CookieJar) -> Option<String> {
    jar.get(SESSION_COOKIE)
        .map(|cookie| cookie.value())
        .filter(|value| !value.is_empty() && value.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(str::to_string)
}

fn session_cookie(id: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, id))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
}

/// 302 with `Cache-Control: no-store`.
fn found(jar: CookieJar, location: String) -> Response {
    (
        StatusCode::FOUND,
        jar,
        [
            (header::LOCATION, location),
            (header::CACHE_CONTROL, "no-store".to_string()),
        ],
    )
        .into_response()
}
