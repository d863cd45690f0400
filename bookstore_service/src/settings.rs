use anyhow::Context;
use serde::Deserialize;

const CONFIG_PATH_ENV: &str = "BOOKSTORE_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/bookstore";
const ENV_PREFIX: &str = "BOOKSTORE";
const ENV_SEPARATOR: &str = "__";

/// Where the records are kept
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// Records live in process memory and are lost on restart
    InMemory,
    #[default]
    Postgres,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Settings {
    pub app: AppSettings,
    pub server: ServerSettings,
    pub storage: StorageBackend,
    pub database: DatabaseSettings,
    pub telemetry: TelemetrySettings,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppSettings {
    pub name: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: "bookstore_service".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatabaseSettings {
    pub hostname: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub dbname: String,
    /// Creates missing tables at startup, production databases are expected to be prepared upfront
    pub create_schema: bool,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            hostname: "127.0.0.1".to_string(),
            port: 5432,
            username: "postgres".to_string(),
            password: "postgres".to_string(),
            dbname: "postgres".to_string(),
            create_schema: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct TelemetrySettings {
    /// Used when `RUST_LOG` is not set
    pub log_filter: String,
    /// Exports spans to a jaeger agent
    pub jaeger_enabled: bool,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_filter: "info".to_string(),
            jaeger_enabled: false,
        }
    }
}

impl Settings {
    /// Loads settings from the optional config file and `BOOKSTORE__*` environment variables,
    /// environment wins over the file and the file wins over defaults.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        Self::build(
            config::Config::builder()
                .add_source(config::File::with_name(&path).required(false))
                .add_source(
                    config::Environment::with_prefix(ENV_PREFIX)
                        .prefix_separator(ENV_SEPARATOR)
                        .separator(ENV_SEPARATOR)
                        .try_parsing(true),
                ),
        )
    }

    /// Loads settings from toml text, missing keys keep their defaults
    pub fn from_toml_str(toml: &str) -> anyhow::Result<Self> {
        Self::build(
            config::Config::builder()
                .add_source(config::File::from_str(toml, config::FileFormat::Toml)),
        )
    }

    fn build(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> anyhow::Result<Self> {
        builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}
