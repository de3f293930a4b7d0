use clap::builder::TypedValueParser as _;
use clap::Parser;
use dotenvy::dotenv;
use kinde_auth::config::{
    AuthSettings, SettingsSource, TokenScoping, DEFAULT_POST_LOGIN_REDIRECT,
    DEFAULT_POST_LOGOUT_REDIRECT, DEFAULT_SCOPE,
};
use kinde_auth::http::DEFAULT_TIMEOUT_SECS;
use kinde_auth::store::DEFAULT_KEY_PREFIX;
use log::LevelFilter;
use secrecy::SecretString;
use std::fmt;
use std::str::FromStr;

/// Default mount point of the auth entry route.
pub const DEFAULT_AUTH_BASE_PATH: &str = "/api/auth";

#[derive(Clone, Debug, PartialEq)]
pub enum RustEnv {
    Development,
    Production,
    Staging,
}

#[derive(Debug, PartialEq, Eq)]
pub struct RustEnvParseError;

impl FromStr for RustEnv {
    type Err = RustEnvParseError;
    fn from_str(level: &str) -> Result<RustEnv, Self::Err> {
        match level.to_lowercase().as_str() {
            "development" => Ok(RustEnv::Development),
            "production" => Ok(RustEnv::Production),
            "staging" => Ok(RustEnv::Staging),
            _ => Err(RustEnvParseError),
        }
    }
}

impl fmt::Display for RustEnv {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RustEnv::Development => write!(f, "development"),
            RustEnv::Production => write!(f, "production"),
            RustEnv::Staging => write!(f, "staging"),
        }
    }
}

/// Which transient store backs the auth flow.
#[derive(Clone, Debug, PartialEq)]
pub enum StorageBackend {
    /// In-process map; entries vanish on restart.
    Memory,
    /// Remote KV namespace over its REST API.
    Kv,
}

#[derive(Debug, PartialEq, Eq)]
pub struct StorageBackendParseError;

impl FromStr for StorageBackend {
    type Err = StorageBackendParseError;
    fn from_str(backend: &str) -> Result<StorageBackend, Self::Err> {
        match backend.to_lowercase().as_str() {
            "memory" => Ok(StorageBackend::Memory),
            "kv" => Ok(StorageBackend::Kv),
            _ => Err(StorageBackendParseError),
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StorageBackend::Memory => write!(f, "memory"),
            StorageBackend::Kv => write!(f, "kv"),
        }
    }
}

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// A list of full CORS origin URLs that allowed to receive server responses.
    #[arg(
        long,
        env,
        value_delimiter = ',',
        use_value_delimiter = true,
        default_value = "http://localhost:3000,https://localhost:3000"
    )]
    pub allowed_origins: Vec<String>,

    /// Path the auth endpoints (login, register, kinde_callback, logout) are mounted under.
    #[arg(long, env, default_value = DEFAULT_AUTH_BASE_PATH)]
    pub auth_base_path: String,

    /// Base URL of the Kinde tenant, e.g. https://acme.kinde.com
    #[arg(long, env)]
    kinde_issuer_url: Option<String>,

    /// OAuth client id registered with Kinde.
    #[arg(long, env)]
    kinde_client_id: Option<String>,

    /// OAuth client secret. Leave unset for PKCE-only clients.
    #[arg(long, env, hide_env_values = true)]
    kinde_client_secret: Option<String>,

    /// Callback URL registered with Kinde, e.g. http://localhost:4000/api/auth/kinde_callback
    #[arg(long, env)]
    kinde_redirect_url: Option<String>,

    /// Where the user lands after a successful login when the request names no target.
    #[arg(long, env, default_value = DEFAULT_POST_LOGIN_REDIRECT)]
    pub kinde_post_login_redirect_url: String,

    /// Where Kinde sends the user after logout.
    #[arg(long, env, default_value = DEFAULT_POST_LOGOUT_REDIRECT)]
    pub kinde_post_logout_redirect_url: String,

    /// Space-separated OAuth scopes to request.
    #[arg(long, env, default_value = DEFAULT_SCOPE)]
    pub kinde_scope: String,

    /// Optional API audience to request access tokens for.
    #[arg(long, env)]
    kinde_audience: Option<String>,

    /// Use PKCE (S256) instead of the client secret at the token endpoint.
    #[arg(long, env, default_value_t = false)]
    pub kinde_pkce_enabled: bool,

    /// Timeout in seconds for the server-to-server token exchange
    #[arg(long, env, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub token_exchange_timeout_secs: u64,

    /// Transient store backend. Without one every auth endpoint answers "storage unavailable".
    #[arg(
        long,
        env,
        value_parser = clap::builder::PossibleValuesParser::new(["memory", "kv", "MEMORY", "KV"])
            .map(|s| s.parse::<StorageBackend>().unwrap()),
    )]
    pub auth_storage: Option<StorageBackend>,

    /// KV namespace REST URL (required when auth_storage=kv)
    #[arg(long, env)]
    kv_api_url: Option<String>,

    /// Bearer token for the KV REST API
    #[arg(long, env, hide_env_values = true)]
    kv_api_token: Option<String>,

    /// Prefix applied to every key written to the KV namespace
    #[arg(long, env, default_value = DEFAULT_KEY_PREFIX)]
    pub kv_key_prefix: String,

    /// Key token sets by a per-browser session cookie instead of one shared entry.
    #[arg(long, env, default_value_t = false)]
    pub session_scoped_tokens: bool,

    /// The host interface to listen for incoming connections
    #[arg(short, long, env, default_value = "127.0.0.1")]
    pub interface: Option<String>,

    /// The host TCP port to listen for incoming connections
    #[arg(short, long, env, default_value_t = 4000)]
    pub port: u16,

    /// Set the log level verbosity threshold (level) to control what gets displayed on console output
    #[arg(
        short,
        long,
        env,
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .map(|s| s.parse::<LevelFilter>().unwrap()),
        )]
    pub log_level_filter: LevelFilter,

    /// Set the Rust runtime environment to use.
    #[arg(
    short,
    long,
    env,
    default_value_t = RustEnv::Development,
    value_parser = clap::builder::PossibleValuesParser::new([
        "DEVELOPMENT", "PRODUCTION", "STAGING",
        "development", "production", "staging"
    ])
        .map(|s| s.parse::<RustEnv>().unwrap()),
    )]
    pub runtime_env: RustEnv,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        // Load .env file first
        dotenv().ok();
        // Then parse the command line parameters and flags
        Config::parse()
    }

    pub fn kinde_issuer_url(&self) -> Option<String> {
        self.kinde_issuer_url.clone()
    }

    pub fn kinde_client_id(&self) -> Option<String> {
        self.kinde_client_id.clone()
    }

    /// Returns the client secret wrapped so it cannot leak through `Debug`.
    pub fn kinde_client_secret(&self) -> Option<SecretString> {
        self.kinde_client_secret
            .clone()
            .filter(|s| !s.is_empty())
            .map(SecretString::new)
    }

    pub fn kinde_redirect_url(&self) -> Option<String> {
        self.kinde_redirect_url.clone()
    }

    pub fn kinde_audience(&self) -> Option<String> {
        self.kinde_audience.clone()
    }

    pub fn kv_api_url(&self) -> Option<String> {
        self.kv_api_url.clone()
    }

    pub fn kv_api_token(&self) -> Option<SecretString> {
        self.kv_api_token.clone().map(SecretString::new)
    }

    pub fn set_auth_storage(mut self, backend: Option<StorageBackend>) -> Self {
        self.auth_storage = backend;
        self
    }

    pub fn runtime_env(&self) -> RustEnv {
        self.runtime_env.clone()
    }

    pub fn is_production(&self) -> bool {
        self.runtime_env() == RustEnv::Production
    }
}

impl SettingsSource for Config {
    fn auth_settings(&self) -> AuthSettings {
        AuthSettings {
            issuer_url: self.kinde_issuer_url(),
            client_id: self.kinde_client_id(),
            client_secret: self.kinde_client_secret(),
            redirect_uri: self.kinde_redirect_url(),
            scope: self.kinde_scope.clone(),
            audience: self.kinde_audience(),
            post_login_redirect_url: self.kinde_post_login_redirect_url.clone(),
            post_logout_redirect_url: self.kinde_post_logout_redirect_url.clone(),
            pkce_enabled: self.kinde_pkce_enabled,
            token_scoping: if self.session_scoped_tokens {
                TokenScoping::PerSession
            } else {
                TokenScoping::Shared
            },
        }
    }
}
