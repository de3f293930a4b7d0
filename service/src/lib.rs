use config::{Config, StorageBackend};
use kinde_auth::config::{AuthSettings, SettingsSource};
use kinde_auth::error::{config_error, Error};
use kinde_auth::http::HttpClientConfig;
use kinde_auth::store::{KvStore, MemoryStore, TransientStore};
use log::*;
use std::sync::Arc;
use tokio::time::Duration;

pub mod config;
pub mod logging;

/// Build the transient store selected by `auth_storage`.
///
/// `Ok(None)` when no backend is configured: the server still starts and the
/// auth endpoints answer "storage unavailable".
pub fn init_store(config: &Config) -> Result<Option<Arc<dyn TransientStore>>, Error> {
    let backend = match &config.auth_storage {
        Some(backend) => backend,
        None => {
            warn!("No auth storage configured; auth endpoints will report storage unavailable");
            return Ok(None);
        }
    };

    info!("Auth storage backend: {}", backend);

    let store: Arc<dyn TransientStore> = match backend {
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
        StorageBackend::Kv => {
            let url = config
                .kv_api_url()
                .ok_or_else(|| config_error("KV_API_URL is required when AUTH_STORAGE=kv"))?;
            let token = config
                .kv_api_token()
                .ok_or_else(|| config_error("KV_API_TOKEN is required when AUTH_STORAGE=kv"))?;
            Arc::new(KvStore::new(
                &url,
                token,
                &config.kv_key_prefix,
                Duration::from_secs(config.token_exchange_timeout_secs),
            )?)
        }
    };

    Ok(Some(store))
}

// Service-level state containing only infrastructure concerns
// Needs to implement Clone to be able to be passed into Router as State
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    store: Option<Arc<dyn TransientStore>>,
    pub http_client: reqwest::Client,
}

impl AppState {
    pub fn new(
        app_config: Config,
        store: Option<Arc<dyn TransientStore>>,
        http_client: reqwest::Client,
    ) -> Self {
        Self {
            config: app_config,
            store,
            http_client,
        }
    }

    /// Build the store and token-endpoint client from `config`.
    pub fn from_config(app_config: Config) -> Result<Self, Error> {
        let store = init_store(&app_config)?;
        let http_client = HttpClientConfig::default()
            .with_timeout(Duration::from_secs(app_config.token_exchange_timeout_secs))
            .build()?;
        Ok(Self::new(app_config, store, http_client))
    }

    /// The configured transient store, or `None` when storage is unavailable.
    pub fn store(&self) -> Option<&dyn TransientStore> {
        self.store.as_deref()
    }

    /// Fresh immutable settings for one request.
    pub fn auth_settings(&self) -> AuthSettings {
        self.config.auth_settings()
    }
}
