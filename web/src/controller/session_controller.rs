use crate::controller::auth_controller::session_cookie_value;
use crate::AppState;

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use kinde_auth::session::{self, AuthenticationState};

/// GET whether the caller holds a token set, plus its unverified profile
#[utoipa::path(
    get,
    path = "/api/auth/session",
    responses(
        (status = 200, description = "{\"authenticated\": bool, \"user\": {...} | null}"),
    )
)]
pub async fn session(State(app_state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    let session_id = session_cookie_value(&jar);
    let state = match app_state.store() {
        Some(store) => {
            session::current_state(&app_state.auth_settings(), store, session_id.as_deref()).await
        }
        None => AuthenticationState {
            authenticated: false,
            user: None,
        },
    };

    ([(header::CACHE_CONTROL, "no-store")], Json(state))
}
