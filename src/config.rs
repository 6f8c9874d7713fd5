//! Configuration loading and constants.
//!
//! Loads application configuration from a TOML file, overlays the deployment
//! environment (`MONGODB_URI`, `NRF_CLOUD_API_KEY`, ...) and validates the
//! result. `AppConfig` is the root configuration struct containing all settings.

use const_format::formatcp;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

// =============================================================================
// HTTP Response Headers
// =============================================================================

/// Ingestion responses reflect a write and must never be served from a cache
pub const CACHE_CONTROL_NO_STORE: &str = "no-store";

/// Header carrying the request correlation ID (inbound and outbound)
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Plaintext body returned by the liveness endpoint
pub const LIVENESS_MESSAGE: &str = "Thingy:91 Receiver is Live!";

/// User-Agent sent to the nRF Cloud API
pub const USER_AGENT: &str = formatcp!("thingy-relay/{}", env!("CARGO_PKG_VERSION"));

// =============================================================================
// MongoDB Constants
// =============================================================================

/// Fail fast if the database is down
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Database used when neither the URI nor the config names one
pub const DEFAULT_DATABASE: &str = "test";

/// Collection holding location records
pub const DEFAULT_COLLECTION: &str = "locationlogs";

// =============================================================================
// nRF Cloud Polling Constants
// =============================================================================

/// nRF Cloud REST API root
pub const DEFAULT_NRF_CLOUD_BASE_URL: &str = "https://api.nrfcloud.com/v1";

/// Trailing window queried by each poll (5 minutes)
pub const DEFAULT_POLL_WINDOW_SECS: u64 = 300;

/// Upper bound on pages followed via `pageNextToken` in a single poll
pub const DEFAULT_POLL_MAX_PAGES: usize = 10;

// =============================================================================
// Default Paths and Strings
// =============================================================================

/// Default configuration file path
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Default log filter when RUST_LOG is not set
pub const DEFAULT_LOG_FILTER: &str = "thingy_relay=debug,tower_http=info";

/// Default log format (text or json)
pub const DEFAULT_LOG_FORMAT: &str = "text";

// =============================================================================
// Environment Variables
// =============================================================================

pub const ENV_MONGODB_URI: &str = "MONGODB_URI";
pub const ENV_NRF_CLOUD_API_KEY: &str = "NRF_CLOUD_API_KEY";
pub const ENV_WEBHOOK_TOKEN: &str = "WEBHOOK_TOKEN";
pub const ENV_PORT: &str = "PORT";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// HTTP server configuration
    #[serde(default)]
    pub http: HttpServerConfig,
    /// Document store connection
    #[serde(default)]
    pub mongodb: MongoConfig,
    /// nRF Cloud REST API access
    #[serde(default)]
    pub nrf_cloud: NrfCloudConfig,
    /// Polling window and paging limits
    #[serde(default)]
    pub poll: PollConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpServerConfig {
    #[serde(default = "HttpServerConfig::default_host")]
    pub host: String,
    #[serde(default = "HttpServerConfig::default_port")]
    pub port: u16,
    /// Static bearer token required on `/webhook` when set
    pub webhook_token: Option<String>,
    /// TLS configuration
    #[serde(default)]
    pub tls: TlsConfig,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            webhook_token: None,
            tls: TlsConfig::default(),
        }
    }
}

impl HttpServerConfig {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_port() -> u16 {
        3000
    }
}

/// How the listener terminates TLS
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TlsMode {
    /// Plain HTTP, TLS terminated by a proxy in front of the relay
    #[default]
    None,
    /// PEM certificate and key loaded from disk
    Manual,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TlsConfig {
    #[serde(default)]
    pub mode: TlsMode,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

/// MongoDB connection settings
#[derive(Debug, Clone, Deserialize)]
pub struct MongoConfig {
    /// Connection string, normally supplied through `MONGODB_URI`
    pub uri: Option<String>,
    /// Database name used when the URI does not carry one
    pub database: Option<String>,
    #[serde(default = "MongoConfig::default_collection")]
    pub collection: String,
    #[serde(default = "MongoConfig::default_connect_timeout")]
    pub connect_timeout_seconds: u64,
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            uri: None,
            database: None,
            collection: Self::default_collection(),
            connect_timeout_seconds: Self::default_connect_timeout(),
        }
    }
}

impl MongoConfig {
    fn default_collection() -> String {
        DEFAULT_COLLECTION.to_string()
    }

    fn default_connect_timeout() -> u64 {
        DEFAULT_CONNECT_TIMEOUT_SECS
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}

/// nRF Cloud REST API settings
#[derive(Debug, Clone, Deserialize)]
pub struct NrfCloudConfig {
    #[serde(default = "NrfCloudConfig::default_base_url")]
    pub base_url: String,
    /// Bearer token, normally supplied through `NRF_CLOUD_API_KEY`
    pub api_key: Option<String>,
}

impl Default for NrfCloudConfig {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
            api_key: None,
        }
    }
}

impl NrfCloudConfig {
    fn default_base_url() -> String {
        DEFAULT_NRF_CLOUD_BASE_URL.to_string()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollConfig {
    /// Length of the trailing window in seconds (default: 5 minutes)
    #[serde(default = "PollConfig::default_window")]
    pub window_seconds: u64,
    /// Items per page requested from the API; API default when unset
    pub page_limit: Option<u32>,
    /// Maximum pages followed in one poll (default: 10)
    #[serde(default = "PollConfig::default_max_pages")]
    pub max_pages: usize,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            window_seconds: Self::default_window(),
            page_limit: None,
            max_pages: Self::default_max_pages(),
        }
    }
}

impl PollConfig {
    fn default_window() -> u64 {
        DEFAULT_POLL_WINDOW_SECS
    }

    fn default_max_pages() -> usize {
        DEFAULT_POLL_MAX_PAGES
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_seconds)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "text" (human-readable, default) or "json" (structured)
    #[serde(default = "LoggingConfig::default_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: DEFAULT_LOG_FORMAT.to_string(),
        }
    }
}

impl LoggingConfig {
    fn default_format() -> String {
        DEFAULT_LOG_FORMAT.to_string()
    }

    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

impl AppConfig {
    /// Load configuration from `path`.
    ///
    /// A missing file at [`DEFAULT_CONFIG_PATH`] yields the built-in defaults so
    /// the relay can be configured from the environment alone. Any other
    /// missing path is an error.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() && path == Path::new(DEFAULT_CONFIG_PATH) {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from TOML text
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Overlay values from the environment.
    ///
    /// `lookup` is `std::env::var(..).ok()` in production; tests pass a map.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(uri) = non_empty(ENV_MONGODB_URI) {
            self.mongodb.uri = Some(uri);
        }
        if let Some(key) = non_empty(ENV_NRF_CLOUD_API_KEY) {
            self.nrf_cloud.api_key = Some(key);
        }
        if let Some(token) = non_empty(ENV_WEBHOOK_TOKEN) {
            self.http.webhook_token = Some(token);
        }
        if let Some(port) = non_empty(ENV_PORT) {
            self.http.port = port.trim().parse().map_err(|_| {
                ConfigError::Validation(format!("{} is not a valid port: {}", ENV_PORT, port))
            })?;
        }

        Ok(())
    }

    /// Check the invariants the relay relies on at runtime
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mongodb.uri.as_deref().map_or(true, str::is_empty) {
            return Err(ConfigError::Validation(format!(
                "No database configured. Set {} or mongodb.uri",
                ENV_MONGODB_URI
            )));
        }

        if self.http.tls.mode == TlsMode::Manual
            && (self.http.tls.cert_path.is_none() || self.http.tls.key_path.is_none())
        {
            return Err(ConfigError::Validation(
                "http.tls.mode = \"manual\" requires cert_path and key_path".to_string(),
            ));
        }

        if self.mongodb.connect_timeout_seconds == 0 {
            return Err(ConfigError::Validation(
                "mongodb.connect_timeout_seconds must be greater than zero".to_string(),
            ));
        }

        if self.poll.window_seconds == 0 {
            return Err(ConfigError::Validation(
                "poll.window_seconds must be greater than zero".to_string(),
            ));
        }

        if self.poll.max_pages == 0 {
            return Err(ConfigError::Validation(
                "poll.max_pages must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Configuration error: {0}")]
    Validation(String),
}
