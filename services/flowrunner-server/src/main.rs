//! FlowRunner server.
//!
//! Composition root: wires an in-memory store, secret vault, account
//! service and execution engine behind the HTTP/WebSocket surface in
//! `flowrunner-api`, then serves it with graceful shutdown.

mod config;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use flowrunner_api::{create_router, AppState};
use flowrunner_auth::{AccountConfig, AccountService, RateLimitConfig};
use flowrunner_engine::{NodeRegistry, Runtime, RuntimeConfig};
use flowrunner_secrets::SecretVault;
use flowrunner_storage::MemoryStore;

use crate::config::ServerConfig;

/// FlowRunner - multi-tenant workflow execution service
#[derive(Parser, Debug)]
#[command(name = "flowrunner-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML, JSON, or YAML)
    #[arg(short, long, env = "FLOWRUNNER_CONFIG")]
    config: Option<String>,

    /// Host to bind to
    #[arg(long, env = "FLOWRUNNER_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "FLOWRUNNER_PORT")]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "FLOWRUNNER_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log format (json, pretty)
    #[arg(long, env = "FLOWRUNNER_LOG_FORMAT", default_value = "pretty")]
    log_format: String,

    /// Secret vault master key, hex-encoded (32 bytes)
    #[arg(long, env = "FLOWRUNNER_VAULT_MASTER_KEY_HEX")]
    vault_master_key_hex: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut server_config = ServerConfig::load(args.config.as_deref())?;

    if let Some(host) = args.host {
        server_config.server.host = host;
    }
    if let Some(port) = args.port {
        server_config.server.port = port;
    }
    if let Some(key) = args.vault_master_key_hex {
        server_config.vault.master_key_hex = Some(key);
    }
    server_config.logging.level = args.log_level;
    server_config.logging.format = args.log_format;

    init_logging(&server_config.logging)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting flowrunner-server");

    let master_key = resolve_master_key(&server_config.vault)?;

    let store: Arc<dyn flowrunner_storage::StorageProvider> = Arc::new(MemoryStore::new());
    let accounts = Arc::new(AccountService::new(
        store.clone(),
        AccountConfig {
            rate_limit: RateLimitConfig {
                api_requests_per_window: server_config.auth.api_requests_per_window,
                ..Default::default()
            },
            ..Default::default()
        },
    ));
    let vault = Arc::new(SecretVault::new(store.clone(), &master_key)?);
    let registry = Arc::new(NodeRegistry::with_defaults());
    let engine = Arc::new(Runtime::new(
        store.clone(),
        vault.clone(),
        registry.clone(),
        RuntimeConfig {
            log_capacity: server_config.engine.log_capacity,
            execution_timeout: server_config.engine.execution_timeout_secs.map(Duration::from_secs),
            event_channel_capacity: server_config.engine.event_channel_capacity,
            ..RuntimeConfig::default()
        },
    ));

    let state = Arc::new(AppState::new(store, accounts, vault, engine, registry));
    let app = create_router(state);

    let addr = server_config.server.socket_addr();
    tracing::info!(%addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(server_config.server.shutdown_timeout()))
        .await?;

    tracing::info!("server shutdown complete");
    Ok(())
}

/// Load the vault master key from config, or derive a transient one and
/// warn loudly: without a pinned key every secret becomes unreadable the
/// moment the process restarts.
fn resolve_master_key(vault: &config::VaultSettings) -> anyhow::Result<[u8; flowrunner_crypto::KEY_LEN]> {
    match &vault.master_key_hex {
        Some(hex_key) => {
            let bytes = hex::decode(hex_key)?;
            let key: [u8; flowrunner_crypto::KEY_LEN] = bytes
                .try_into()
                .map_err(|_| anyhow::anyhow!("vault master key must be {} bytes", flowrunner_crypto::KEY_LEN))?;
            Ok(key)
        }
        None => {
            tracing::warn!(
                "no vault master key configured, generating a transient one - secrets will not \
                 survive a restart; set FLOWRUNNER_VAULT_MASTER_KEY_HEX in production"
            );
            let mut key = [0u8; flowrunner_crypto::KEY_LEN];
            rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut key);
            Ok(key)
        }
    }
}

fn init_logging(config: &config::LoggingConfig) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let subscriber = tracing_subscriber::registry().with(env_filter);

    match config.format.as_str() {
        "json" => {
            subscriber.with(fmt::layer().json().with_target(true)).init();
        }
        _ => {
            subscriber.with(fmt::layer().pretty().with_target(true)).init();
        }
    }

    Ok(())
}

async fn shutdown_signal(timeout: Duration) {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install ctrl+c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install sigterm handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received ctrl+c, initiating graceful shutdown..."),
        _ = terminate => tracing::info!("received sigterm, initiating graceful shutdown..."),
    }

    tracing::info!(timeout_secs = timeout.as_secs(), "waiting for in-flight requests to complete...");
    tokio::time::sleep(timeout).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parsing() {
        let args = Args::parse_from(["flowrunner-server", "--port", "9090"]);
        assert_eq!(args.port, Some(9090));
    }

    #[test]
    fn default_config_has_a_sane_port() {
        let config = ServerConfig::default();
        assert_eq!(config.server.port, 8080);
    }
}
