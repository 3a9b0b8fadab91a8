//! Server configuration: environment variables, an optional config file,
//! and CLI overrides, in that layered order (teacher's `config.rs` shape).

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub vault: VaultSettings,
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub auth: AuthSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> SocketAddr {
        format!("{}:{}", self.host, self.port)
            .parse()
            .expect("invalid socket address")
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// Secret vault master key, hex-encoded. Generated fresh on first run when
/// unset so `flowrunner-server` with no config still starts, at the cost of
/// every secret becoming unreadable across a restart — production
/// deployments must pin this via `FLOWRUNNER_VAULT__MASTER_KEY_HEX`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultSettings {
    pub master_key_hex: Option<String>,
}

impl Default for VaultSettings {
    fn default() -> Self {
        Self { master_key_hex: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,
    #[serde(default)]
    pub execution_timeout_secs: Option<u64>,
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            log_capacity: default_log_capacity(),
            execution_timeout_secs: None,
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSettings {
    #[serde(default = "default_api_requests_per_window")]
    pub api_requests_per_window: u32,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            api_requests_per_window: default_api_requests_per_window(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_shutdown_timeout() -> u64 {
    30
}

fn default_log_capacity() -> usize {
    flowrunner_engine::logbuf::DEFAULT_LOG_CAPACITY
}

fn default_event_channel_capacity() -> usize {
    256
}

fn default_api_requests_per_window() -> u32 {
    1200
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl ServerConfig {
    pub fn load(config_path: Option<&str>) -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();

        let mut builder = config::Config::builder();

        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false));

        builder = builder.add_source(
            config::Environment::with_prefix("FLOWRUNNER")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;

        let server_config: ServerConfig = config.try_deserialize().unwrap_or_else(|_| {
            tracing::warn!("using default configuration - some settings may need adjustment");
            ServerConfig::default()
        });

        Ok(server_config)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            vault: VaultSettings::default(),
            engine: EngineSettings::default(),
            auth: AuthSettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}
