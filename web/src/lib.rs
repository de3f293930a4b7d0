use axum::http::HeaderValue;
use log::*;
use service::config::Config;
use std::io;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

pub use error::{Error, Result};
pub use service::AppState;

mod controller;
mod error;
pub mod router;

/// Bind the configured interface and serve the router until the process exits.
pub async fn init_server(app_state: AppState) -> io::Result<()> {
    let interface = app_state
        .config
        .interface
        .clone()
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let addr = format!("{}:{}", interface, app_state.config.port);

    info!(
        "Starting server on {} (auth endpoints under {})",
        addr, app_state.config.auth_base_path
    );

    let cors = cors_layer(&app_state.config);
    let app = router::define_routes(app_state).layer(cors);

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}
