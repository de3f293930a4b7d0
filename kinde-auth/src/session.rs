//! Read-only authentication queries for page-load collaborators.
//!
//! "Authenticated" means a token set with a non-empty access token exists.
//! Nothing here refreshes tokens or checks expiry or signatures.

use log::*;
use serde::Serialize;

use crate::config::{AuthSettings, TokenScoping};
use crate::error::Error;
use crate::oauth::callback::SESSION_ID_LENGTH;
use crate::oauth::random::random_token;
use crate::oauth::token::{IdTokenClaims, TokenSet};
use crate::store::{keys, TransientStore};

/// Cookie carrying the opaque session id when tokens are scoped per session.
pub const SESSION_COOKIE: &str = "kinde_session";

/// Mint an opaque session id for a browser that has none yet.
pub fn new_session_id() -> String {
    random_token(SESSION_ID_LENGTH)
}

/// Store key holding the token set for this caller, if any can apply.
///
/// Shared scoping always uses `tokens`; per-session scoping needs a session id.
pub fn token_key(settings: &AuthSettings, session_id: Option<&str>) -> Option<String> {
    match settings.token_scoping {
        TokenScoping::Shared => Some(keys::tokens(None)),
        TokenScoping::PerSession => session_id
            .filter(|id| !id.is_empty())
            .map(|id| keys::tokens(Some(id))),
    }
}

/// Load the persisted token set.
///
/// `Ok(None)` when absent or unreadable as a token set; `Err` only when the
/// store itself failed.
pub async fn load_tokens(
    settings: &AuthSettings,
    store: &dyn TransientStore,
    session_id: Option<&str>,
) -> Result<Option<TokenSet>, Error> {
    let key = match token_key(settings, session_id) {
        Some(key) => key,
        None => return Ok(None),
    };

    let value = match store.get(&key).await? {
        Some(value) => value,
        None => return Ok(None),
    };

    match value.into_record::<TokenSet>() {
        Ok(tokens) => Ok(Some(tokens)),
        Err(e) => {
            warn!("Stored token set is malformed, ignoring: {}", e);
            Ok(None)
        }
    }
}

/// True when a token set with a non-empty access token exists.
///
/// Store failures count as "not authenticated".
pub async fn is_authenticated(
    settings: &AuthSettings,
    store: &dyn TransientStore,
    session_id: Option<&str>,
) -> bool {
    match load_tokens(settings, store, session_id).await {
        Ok(tokens) => tokens.map(|t| t.has_access_token()).unwrap_or(false),
        Err(e) => {
            error!("Error checking authentication: {}", e);
            false
        }
    }
}

/// What page-load collaborators get to see about the current caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthenticationState {
    pub authenticated: bool,
    pub user: Option<IdTokenClaims>,
}

/// Authentication flag plus unverified profile claims from the ID token.
pub async fn current_state(
    settings: &AuthSettings,
    store: &dyn TransientStore,
    session_id: Option<&str>,
) -> AuthenticationState {
    let tokens = match load_tokens(settings, store, session_id).await {
        Ok(tokens) => tokens.filter(TokenSet::has_access_token),
        Err(e) => {
            error!("Error checking authentication: {}", e);
            None
        }
    };

    AuthenticationState {
        authenticated: tokens.is_some(),
        user: tokens.and_then(|t| t.id_token_claims()),
    }
}

/// Unverified profile of the signed-in user, for display only.
pub async fn current_user(
    settings: &AuthSettings,
    store: &dyn TransientStore,
    session_id: Option<&str>,
) -> Option<IdTokenClaims> {
    current_state(settings, store, session_id).await.user
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, StoredValue};
    use crate::test_support::{settings, FailingStore};
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    use serde_json::json;

    async fn put_tokens(store: &MemoryStore, key: &str, tokens: serde_json::Value) {
        store
            .put(key, StoredValue::Record(tokens), None)
            .await
            .unwrap();
    }

    fn full_tokens(access_token: &str) -> serde_json::Value {
        json!({
            "access_token": access_token,
            "refresh_token": null,
            "id_token": null,
            "expires_in": 3600,
            "timestamp": 1_700_000_000_000i64
        })
    }

    #[tokio::test]
    async fn test_not_authenticated_without_tokens() {
        let store = MemoryStore::new();
        assert!(!is_authenticated(&settings(), &store, None).await);
    }

    #[tokio::test]
    async fn test_authenticated_with_access_token() {
        let store = MemoryStore::new();
        put_tokens(&store, "tokens", full_tokens("at")).await;
        assert!(is_authenticated(&settings(), &store, None).await);
    }

    #[tokio::test]
    async fn test_empty_or_missing_access_token() {
        let store = MemoryStore::new();
        put_tokens(&store, "tokens", full_tokens("")).await;
        assert!(!is_authenticated(&settings(), &store, None).await);

        put_tokens(&store, "tokens", json!({"refresh_token": "rt"})).await;
        assert!(!is_authenticated(&settings(), &store, None).await);

        store
            .put("tokens", StoredValue::text("garbage"), None)
            .await
            .unwrap();
        assert!(!is_authenticated(&settings(), &store, None).await);
    }

    #[tokio::test]
    async fn test_store_failure_is_not_authenticated() {
        let store = FailingStore::failing_gets();
        assert!(!is_authenticated(&settings(), &store, None).await);
        assert!(load_tokens(&settings(), &store, None).await.is_err());
    }

    #[tokio::test]
    async fn test_per_session_requires_session_id() {
        let store = MemoryStore::new();
        put_tokens(&store, "tokens", full_tokens("shared")).await;
        put_tokens(&store, "tokens:s1", full_tokens("mine")).await;
        let settings = AuthSettings {
            token_scoping: TokenScoping::PerSession,
            ..settings()
        };

        assert!(!is_authenticated(&settings, &store, None).await);
        assert!(!is_authenticated(&settings, &store, Some("other")).await);
        let tokens = load_tokens(&settings, &store, Some("s1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(tokens.access_token, "mine");
    }

    #[tokio::test]
    async fn test_current_state_includes_profile() {
        let store = MemoryStore::new();
        let payload = URL_SAFE_NO_PAD.encode(r#"{"sub":"kp_1","email":"ada@example.com"}"#);
        let mut tokens = full_tokens("at");
        tokens["id_token"] = json!(format!("e30.{}.sig", payload));
        put_tokens(&store, "tokens", tokens).await;

        let state = current_state(&settings(), &store, None).await;
        assert!(state.authenticated);
        assert_eq!(
            current_user(&settings(), &store, None).await,
            state.user.clone()
        );
        let user = state.user.unwrap();
        assert_eq!(user.sub, "kp_1");
        assert_eq!(user.email.as_deref(), Some("ada@example.com"));
    }

    #[test]
    fn test_new_session_ids_are_opaque() {
        let a = new_session_id();
        assert_eq!(a.len(), SESSION_ID_LENGTH);
        assert_ne!(a, new_session_id());
    }

    #[tokio::test]
    async fn test_current_state_anonymous() {
        let store = MemoryStore::new();
        assert_eq!(
            current_state(&settings(), &store, None).await,
            AuthenticationState {
                authenticated: false,
                user: None
            }
        );
    }
}
