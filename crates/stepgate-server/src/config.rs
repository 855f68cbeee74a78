//! Server configuration loading.
//!
//! Configuration is read from an optional TOML file plus `STEPGATE_`
//! environment overrides (`STEPGATE_SERVER__PORT=9090`,
//! `STEPGATE_ENGINE__SESSION_TTL=10m`, ...).

use serde::{Deserialize, Serialize};
use stepgate_engine::EngineConfig;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "stepgate.toml";

/// Root server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener settings.
    pub server: ListenConfig,

    /// Logging settings.
    pub logging: LoggingConfig,

    /// Verification-engine settings.
    pub engine: EngineConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server: ListenConfig::default(),
            logging: LoggingConfig::default(),
            engine: EngineConfig::default(),
        }
    }
}

/// Listener settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenConfig {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level (overridden by `RUST_LOG`).
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Loads configuration from `path` (optional file) and the environment.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be parsed, or if an
/// environment override has the wrong shape.
pub fn load_config(path: Option<&str>) -> Result<ServerConfig, config::ConfigError> {
    let path = path.unwrap_or(DEFAULT_CONFIG_PATH);

    config::Config::builder()
        .add_source(config::File::with_name(path).required(false))
        .add_source(
            config::Environment::with_prefix("STEPGATE")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()
}
