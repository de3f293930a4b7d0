use crate::controller::{auth_controller, health_check_controller, session_controller};
use crate::AppState;
use axum::{routing::get, Router};

use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;

// This is the global definition of our OpenAPI spec. To be a part
// of the rendered spec, a path and schema must be listed here.
#[derive(OpenApi)]
#[openapi(
        info(
            title = "Kinde Auth API"
        ),
        paths(
            auth_controller::auth,
            session_controller::session,
            health_check_controller::health_check,
        ),
        tags(
            (name = "kinde_auth", description = "Kinde OAuth 2.0 Authorization Code flow")
        )
    )]
struct ApiDoc;

pub fn define_routes(app_state: AppState) -> Router {
    Router::new()
        .merge(auth_routes(app_state))
        .merge(health_routes())
        .merge(RapiDoc::with_openapi("/api-docs/openapi2.json", ApiDoc::openapi()).path("/rapidoc"))
}

/// `<base>/session` plus the multiplexed `<base>/{*endpoint}` entry.
fn auth_routes(app_state: AppState) -> Router {
    let base = base_path(&app_state.config.auth_base_path);
    Router::new()
        .route(&format!("{base}/session"), get(session_controller::session))
        .route(&format!("{base}/{{*endpoint}}"), get(auth_controller::auth))
        .with_state(app_state)
}

fn health_routes() -> Router {
    Router::new().route("/health", get(health_check_controller::health_check))
}

/// `/api/auth/` and `api/auth` both become `/api/auth`; `/` becomes the empty prefix.
fn base_path(configured: &str) -> String {
    let trimmed = configured.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use axum::response::Response;
    use clap::Parser;
    use mockito::{Matcher, Server};
    use serde_json::{json, Value};
    use service::config::Config;
    use std::collections::HashMap;
    use tower::ServiceExt;
    use url::Url;

    const REDIRECT_URL: &str = "http://localhost:4000/api/auth/kinde_callback";

    fn config(issuer: &str, extra: &[&str]) -> Config {
        let mut argv = vec![
            "kinde_auth_rs",
            "--kinde-issuer-url",
            issuer,
            "--kinde-client-id",
            "client-id",
            "--kinde-client-secret",
            "client-secret",
            "--kinde-redirect-url",
            REDIRECT_URL,
            "--auth-storage",
            "memory",
        ];
        argv.extend_from_slice(extra);
        Config::parse_from(argv)
    }

    fn app(config: Config) -> Router {
        define_routes(AppState::from_config(config).unwrap())
    }

    async fn get(app: &Router, uri: &str, cookie: Option<&str>) -> Response {
        let mut request = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        app.clone()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn location(response: &Response) -> String {
        response
            .headers()
            .get(header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string()
    }

    fn cache_control(response: &Response) -> &str {
        response
            .headers()
            .get(header::CACHE_CONTROL)
            .unwrap()
            .to_str()
            .unwrap()
    }

    fn query_of(url: &str) -> HashMap<String, String> {
        Url::parse(url).unwrap().query_pairs().into_owned().collect()
    }

    /// `name=value` of the session cookie set by `response`, if any.
    fn session_cookie(response: &Response) -> Option<String> {
        response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with("kinde_session="))
            .and_then(|v| v.split(';').next())
            .map(str::to_string)
    }

    async fn token_endpoint(server: &mut Server, status: usize, expected_calls: usize) -> mockito::Mock {
        server
            .mock("POST", "/oauth2/token")
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "access_token": "access-123",
                    "refresh_token": "refresh-456",
                    "expires_in": 86400
                })
                .to_string(),
            )
            .expect(expected_calls)
            .create_async()
            .await
    }

    #[test]
    fn test_base_path_normalization() {
        assert_eq!(base_path("/api/auth"), "/api/auth");
        assert_eq!(base_path("/api/auth/"), "/api/auth");
        assert_eq!(base_path("api/auth"), "/api/auth");
        assert_eq!(base_path("/"), "");
    }

    #[tokio::test]
    async fn test_health() {
        let app = app(config("https://acme.kinde.com", &[]));
        let response = get(&app, "/health", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"healthy");
    }

    #[tokio::test]
    async fn test_unknown_auth_endpoint_is_404() {
        let app = app(config("https://acme.kinde.com", &[]));
        let response = get(&app, "/api/auth/whoami", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(cache_control(&response), "no-store");
        assert_eq!(
            json_body(response).await,
            json!({"error": "Unknown auth endpoint"})
        );
    }

    #[tokio::test]
    async fn test_storage_unavailable_short_circuits() {
        let app = app(config("https://acme.kinde.com", &[]).set_auth_storage(None));
        for endpoint in ["login", "register", "kinde_callback?code=c&state=s", "logout"] {
            let response = get(&app, &format!("/api/auth/{endpoint}"), None).await;
            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(
                json_body(response).await,
                json!({"error": "Storage unavailable"})
            );
        }
    }

    #[tokio::test]
    async fn test_login_redirects_to_provider() {
        let app = app(config("https://acme.kinde.com", &[]));
        let response = get(&app, "/api/auth/login?org_code=org_1", None).await;

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(cache_control(&response), "no-store");
        let location = location(&response);
        assert!(location.starts_with("https://acme.kinde.com/oauth2/auth?"));
        let query = query_of(&location);
        assert_eq!(query["org_code"], "org_1");
        assert_eq!(query["redirect_uri"], REDIRECT_URL);
        assert!(session_cookie(&response).is_none());
    }

    #[tokio::test]
    async fn test_register_prompts_create() {
        let app = app(config("https://acme.kinde.com", &[]));
        let response = get(&app, "/api/auth/register", None).await;
        assert_eq!(query_of(&location(&response))["prompt"], "create");
    }

    #[tokio::test]
    async fn test_missing_configuration_is_500() {
        let app = app(Config::parse_from([
            "kinde_auth_rs",
            "--auth-storage",
            "memory",
        ]));
        let response = get(&app, "/api/auth/login", None).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            json_body(response).await,
            json!({"error": "Authentication is not configured"})
        );
    }

    #[tokio::test]
    async fn test_full_login_callback_logout_sequence() {
        let mut server = Server::new_async().await;
        let token_mock = token_endpoint(&mut server, 200, 1).await;
        let app = app(config(&server.url(), &[]));

        let login = get(&app, "/api/auth/login?post_login_redirect_url=/reports", None).await;
        let state = query_of(&location(&login))["state"].clone();

        let session = json_body(get(&app, "/api/auth/session", None).await).await;
        assert_eq!(session["authenticated"], json!(false));

        let callback = get(
            &app,
            &format!("/api/auth/kinde_callback?code=abc&state={state}"),
            None,
        )
        .await;
        assert_eq!(callback.status(), StatusCode::FOUND);
        assert_eq!(location(&callback), "/reports");
        assert_eq!(cache_control(&callback), "no-store");
        token_mock.assert_async().await;

        let session = json_body(get(&app, "/api/auth/session", None).await).await;
        assert_eq!(session["authenticated"], json!(true));

        let logout = get(&app, "/api/auth/logout", None).await;
        assert_eq!(logout.status(), StatusCode::FOUND);
        assert_eq!(
            location(&logout),
            format!("{}/logout?redirect=%2F", server.url())
        );

        let session = json_body(get(&app, "/api/auth/session", None).await).await;
        assert_eq!(session, json!({"authenticated": false, "user": null}));
    }

    #[tokio::test]
    async fn test_redirect_override_with_tab_lands_on_default() {
        let mut server = Server::new_async().await;
        let token_mock = token_endpoint(&mut server, 200, 1).await;
        let app = app(config(&server.url(), &[]));

        let login = get(
            &app,
            "/api/auth/login?post_login_redirect_url=%2F%09%2Fevil.example%2Fphish",
            None,
        )
        .await;
        let state = query_of(&location(&login))["state"].clone();

        let callback = get(
            &app,
            &format!("/api/auth/kinde_callback?code=abc&state={state}"),
            None,
        )
        .await;
        assert_eq!(callback.status(), StatusCode::FOUND);
        assert_eq!(location(&callback), "/dashboard");
        token_mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_callback_with_unregistered_state_is_401() {
        let mut server = Server::new_async().await;
        let token_mock = token_endpoint(&mut server, 200, 0).await;
        let app = app(config(&server.url(), &[]));

        let response = get(&app, "/api/auth/kinde_callback?code=abc&state=forged", None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            json_body(response).await,
            json!({"error": "Invalid or expired state"})
        );
        token_mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_upstream_failure_consumes_state() {
        let mut server = Server::new_async().await;
        let token_mock = token_endpoint(&mut server, 400, 1).await;
        let app = app(config(&server.url(), &[]));

        let login = get(&app, "/api/auth/login", None).await;
        let state = query_of(&location(&login))["state"].clone();
        let uri = format!("/api/auth/kinde_callback?code=abc&state={state}");

        let first = get(&app, &uri, None).await;
        assert_eq!(first.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            json_body(first).await,
            json!({"error": "Token exchange failed"})
        );

        let retry = get(&app, &uri, None).await;
        assert_eq!(retry.status(), StatusCode::UNAUTHORIZED);
        token_mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_callback_provider_error_and_missing_params() {
        let app = app(config("https://acme.kinde.com", &[]));

        let response = get(
            &app,
            "/api/auth/kinde_callback?error=access_denied&error_description=User%20cancelled",
            None,
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await,
            json!({"error": "access_denied: User cancelled"})
        );

        let response = get(&app, "/api/auth/kinde_callback?state=only", None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_pkce_callback_sends_verifier_not_secret() {
        let mut server = Server::new_async().await;
        let token_mock = server
            .mock("POST", "/oauth2/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
                Matcher::Regex("code_verifier=[A-Za-z0-9]{64}".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"pkce-token"}"#)
            .expect(1)
            .create_async()
            .await;
        let app = app(config(&server.url(), &["--kinde-pkce-enabled"]));

        let login = get(&app, "/api/auth/login", None).await;
        let query = query_of(&location(&login));
        assert_eq!(query["code_challenge_method"], "S256");

        let callback = get(
            &app,
            &format!("/api/auth/kinde_callback?code=abc&state={}", query["state"]),
            None,
        )
        .await;
        assert_eq!(callback.status(), StatusCode::FOUND);
        token_mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_session_scoped_tokens_follow_cookie() {
        let mut server = Server::new_async().await;
        let _token_mock = token_endpoint(&mut server, 200, 1).await;
        let app = app(config(&server.url(), &["--session-scoped-tokens"]));

        let login = get(&app, "/api/auth/login", None).await;
        let cookie = session_cookie(&login).unwrap();
        let state = query_of(&location(&login))["state"].clone();

        let callback = get(
            &app,
            &format!("/api/auth/kinde_callback?code=abc&state={state}"),
            Some(&cookie),
        )
        .await;
        assert_eq!(callback.status(), StatusCode::FOUND);
        assert_eq!(session_cookie(&callback).as_deref(), Some(cookie.as_str()));

        let mine = json_body(get(&app, "/api/auth/session", Some(&cookie)).await).await;
        assert_eq!(mine["authenticated"], json!(true));
        let anonymous = json_body(get(&app, "/api/auth/session", None).await).await;
        assert_eq!(anonymous["authenticated"], json!(false));

        get(&app, "/api/auth/logout", Some(&cookie)).await;
        let after = json_body(get(&app, "/api/auth/session", Some(&cookie)).await).await;
        assert_eq!(after["authenticated"], json!(false));
    }
}
