//! Configuration management.
//!
//! Configuration is layered: built-in defaults, then a TOML file, then
//! `MANIFESTO_VOTES_*` environment variables.

use crate::identity::DEFAULT_COOKIE_MAX_AGE_SECS;
use crate::models::ItemId;
use crate::storage::StorageBackendType;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application directory name under the platform config/data dirs.
const APP_DIR: &str = "manifesto-votes";

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "MANIFESTO_VOTES_CONFIG_PATH";

/// Main configuration.
#[derive(Debug, Clone, Default, Serialize)]
pub struct VotesConfig {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Vote store settings.
    pub storage: StorageConfig,
    /// Visitor identity cookie settings.
    pub identity: IdentityConfig,
    /// Client (controller) settings.
    pub client: ClientConfig,
    /// Logging settings.
    pub logging: LoggingSettings,
    /// Metrics settings.
    pub metrics: MetricsSettings,
}

/// HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerConfig {
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Vote store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageConfig {
    /// Backend type.
    #[serde(serialize_with = "serialize_backend")]
    pub backend: StorageBackendType,
    /// `SQLite` database path (ignored by the memory backend).
    pub database_path: PathBuf,
    /// Whether the store offers the atomic increment operation.
    pub atomic_increment: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackendType::default(),
            database_path: data_dir().join("votes.db"),
            atomic_increment: true,
        }
    }
}

fn serialize_backend<S: serde::Serializer>(
    backend: &StorageBackendType,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(backend.as_str())
}

/// Visitor identity cookie configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IdentityConfig {
    /// Cookie `Max-Age` in seconds.
    pub cookie_max_age_secs: u64,
    /// Whether to add the `Secure` attribute.
    pub cookie_secure: bool,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            cookie_max_age_secs: DEFAULT_COOKIE_MAX_AGE_SECS,
            cookie_secure: false,
        }
    }
}

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientConfig {
    /// Base URL of the vote API.
    pub api_base_url: String,
    /// Path of the durable client storage file.
    pub storage_path: PathBuf,
    /// Items shown on the page, in document order.
    pub items: Vec<ItemId>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8080".to_string(),
            storage_path: data_dir().join("client.json"),
            items: Vec::new(),
        }
    }
}

/// Logging configuration as written in the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Output format: "json" or "pretty".
    pub format: Option<String>,
    /// `EnvFilter` directive, e.g. `manifesto_votes=debug`.
    pub filter: Option<String>,
    /// Optional log file; logs go to stderr when unset.
    pub file: Option<PathBuf>,
}

/// Metrics configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSettings {
    /// Whether metrics are recorded and exported.
    pub enabled: bool,
    /// Port of the Prometheus scrape listener.
    pub port: u16,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9090,
        }
    }
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Server section.
    pub server: Option<ConfigFileServer>,
    /// Storage section.
    pub storage: Option<ConfigFileStorage>,
    /// Identity section.
    pub identity: Option<ConfigFileIdentity>,
    /// Client section.
    pub client: Option<ConfigFileClient>,
    /// Logging section.
    pub logging: Option<LoggingSettings>,
    /// Metrics section.
    pub metrics: Option<ConfigFileMetrics>,
}

/// Server section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileServer {
    /// Bind host.
    pub host: Option<String>,
    /// Bind port.
    pub port: Option<u16>,
}

/// Storage section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileStorage {
    /// Backend name.
    pub backend: Option<String>,
    /// Database path.
    pub database_path: Option<String>,
    /// Atomic increment availability.
    pub atomic_increment: Option<bool>,
}

/// Identity section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileIdentity {
    /// Cookie max age.
    pub cookie_max_age_secs: Option<u64>,
    /// Secure attribute.
    pub cookie_secure: Option<bool>,
}

/// Client section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileClient {
    /// API base URL.
    pub api_base_url: Option<String>,
    /// Client storage path.
    pub storage_path: Option<String>,
    /// Item ids, as strings or integers.
    pub items: Option<Vec<ItemId>>,
}

/// Metrics section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileMetrics {
    /// Enabled flag.
    pub enabled: Option<bool>,
    /// Listener port.
    pub port: Option<u16>,
}

impl VotesConfig {
    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> crate::Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| crate::Error::OperationFailed {
                operation: "read_config_file".to_string(),
                cause: format!("{}: {e}", path.display()),
            })?;

        Self::from_toml_str(&contents)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML, has unknown sections,
    /// or names an unknown storage backend.
    pub fn from_toml_str(contents: &str) -> crate::Result<Self> {
        let file: ConfigFile =
            toml::from_str(contents).map_err(|e| crate::Error::OperationFailed {
                operation: "parse_config_file".to_string(),
                cause: e.to_string(),
            })?;

        Self::from_config_file(file)
    }

    /// Loads configuration from the default location.
    ///
    /// Checks the following paths in order:
    /// 1. Platform-specific config dir (`~/Library/Application Support/manifesto-votes/` on macOS)
    /// 2. XDG config dir (`~/.config/manifesto-votes/` for Unix compatibility)
    ///
    /// Returns default configuration if no readable config file is found.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Self::default();
        };

        let candidates = [
            base_dirs.config_dir().join(APP_DIR).join("config.toml"),
            base_dirs
                .home_dir()
                .join(".config")
                .join(APP_DIR)
                .join("config.toml"),
        ];

        for path in candidates.iter().filter(|p| p.exists()) {
            match Self::load_from_file(path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable config file");
                },
            }
        }

        Self::default()
    }

    /// Converts a `ConfigFile` to `VotesConfig`.
    fn from_config_file(file: ConfigFile) -> crate::Result<Self> {
        let mut config = Self::default();

        if let Some(server) = file.server {
            if let Some(host) = server.host {
                config.server.host = host;
            }
            if let Some(port) = server.port {
                config.server.port = port;
            }
        }
        if let Some(storage) = file.storage {
            if let Some(backend) = storage.backend {
                config.storage.backend = StorageBackendType::parse(&backend)?;
            }
            if let Some(path) = storage.database_path {
                config.storage.database_path = expand_home(&path);
            }
            if let Some(atomic) = storage.atomic_increment {
                config.storage.atomic_increment = atomic;
            }
        }
        if let Some(identity) = file.identity {
            if let Some(max_age) = identity.cookie_max_age_secs {
                config.identity.cookie_max_age_secs = max_age;
            }
            if let Some(secure) = identity.cookie_secure {
                config.identity.cookie_secure = secure;
            }
        }
        if let Some(client) = file.client {
            if let Some(url) = client.api_base_url {
                config.client.api_base_url = url;
            }
            if let Some(path) = client.storage_path {
                config.client.storage_path = expand_home(&path);
            }
            if let Some(items) = client.items {
                config.client.items = items;
            }
        }
        if let Some(logging) = file.logging {
            config.logging = logging;
        }
        if let Some(metrics) = file.metrics {
            if let Some(enabled) = metrics.enabled {
                config.metrics.enabled = enabled;
            }
            if let Some(port) = metrics.port {
                config.metrics.port = port;
            }
        }

        Ok(config)
    }

    /// Applies `MANIFESTO_VOTES_*` environment overrides.
    ///
    /// Unparseable values are ignored with a warning.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary lookup (environment in production).
    #[must_use]
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(host) = lookup("MANIFESTO_VOTES_HOST") {
            self.server.host = host;
        }
        if let Some(port) = parse_override(&lookup, "MANIFESTO_VOTES_PORT") {
            self.server.port = port;
        }
        if let Some(backend) = lookup("MANIFESTO_VOTES_STORAGE_BACKEND") {
            match StorageBackendType::parse(&backend) {
                Ok(backend) => self.storage.backend = backend,
                Err(e) => tracing::warn!(error = %e, "Ignoring MANIFESTO_VOTES_STORAGE_BACKEND"),
            }
        }
        if let Some(path) = lookup("MANIFESTO_VOTES_DATABASE_PATH") {
            self.storage.database_path = expand_home(&path);
        }
        if let Some(atomic) = lookup("MANIFESTO_VOTES_ATOMIC_INCREMENT").map(|v| parse_bool(&v)) {
            self.storage.atomic_increment = atomic;
        }
        if let Some(secure) = lookup("MANIFESTO_VOTES_COOKIE_SECURE").map(|v| parse_bool(&v)) {
            self.identity.cookie_secure = secure;
        }
        if let Some(url) = lookup("MANIFESTO_VOTES_API_URL") {
            self.client.api_base_url = url;
        }
        if let Some(filter) = lookup("MANIFESTO_VOTES_LOG_FILTER") {
            self.logging.filter = Some(filter);
        }
        if let Some(format) = lookup("MANIFESTO_VOTES_LOG_FORMAT") {
            self.logging.format = Some(format);
        }
        if let Some(enabled) = lookup("MANIFESTO_VOTES_METRICS_ENABLED").map(|v| parse_bool(&v)) {
            self.metrics.enabled = enabled;
        }
        if let Some(port) = parse_override(&lookup, "MANIFESTO_VOTES_METRICS_PORT") {
            self.metrics.port = port;
        }
        self
    }

    /// Sets the storage backend.
    #[must_use]
    pub fn with_storage_backend(mut self, backend: StorageBackendType) -> Self {
        self.storage.backend = backend;
        self
    }

    /// Sets the database path.
    #[must_use]
    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage.database_path = path.into();
        self
    }

    /// Sets the bind port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.server.port = port;
        self
    }

    /// Renders the effective configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml_string(&self) -> crate::Result<String> {
        toml::to_string_pretty(self).map_err(|e| crate::Error::OperationFailed {
            operation: "serialize_config".to_string(),
            cause: e.to_string(),
        })
    }
}

/// Default data directory for the database and client storage.
fn data_dir() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from(".manifesto-votes"),
        |dirs| dirs.data_dir().join(APP_DIR),
    )
}

/// Expands a leading `~/` to the home directory.
fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(dirs) = directories::BaseDirs::new() {
            return dirs.home_dir().join(rest);
        }
    }
    PathBuf::from(path)
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes")
}

fn parse_override<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    let raw = lookup(key)?;
    let parsed = raw.trim().parse().ok();
    if parsed.is_none() {
        tracing::warn!(key, value = %raw, "Ignoring unparseable override");
    }
    parsed
}
