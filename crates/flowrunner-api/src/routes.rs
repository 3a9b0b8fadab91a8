//! Route table. Nesting mirrors the teacher's `routes.rs`: one function per
//! resource group, composed under a single `/api/v1` prefix in `lib.rs`.

use axum::routing::{delete, get, patch, post, put};
use axum::Router;
use std::sync::Arc;

use crate::handlers;
use crate::state::AppState;
use crate::websocket;

pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/api/v1/login", post(handlers::auth::login))
        .route("/api/v1/accounts", post(handlers::auth::create_account))
}

pub fn authenticated_routes() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/api/v1/flows", flow_routes())
        .nest("/api/v1/executions", execution_routes())
        .nest("/api/v1/accounts/:accountId", account_scoped_routes())
        .nest("/api/v1/plugins", plugin_routes())
        .route("/api/v1/ws", get(websocket::ws_handler))
}

fn flow_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(handlers::flows::create_flow))
        .route("/", get(handlers::flows::list_flows))
        .route("/search", post(handlers::flows::search_flows))
        .route("/:flowId", get(handlers::flows::get_flow))
        .route("/:flowId", put(handlers::flows::update_flow))
        .route("/:flowId", delete(handlers::flows::delete_flow))
        .route("/:flowId/metadata", patch(handlers::flows::update_flow_metadata))
        .route("/:flowId/run", post(handlers::flows::run_flow))
}

fn execution_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/:executionId", get(handlers::executions::get_execution))
        .route("/:executionId", delete(handlers::executions::cancel_execution))
        .route("/:executionId/logs", get(handlers::executions::get_execution_logs))
}

fn account_scoped_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/secrets", get(handlers::secrets::list_secrets))
        .route("/secrets/search", post(handlers::secrets::search_secrets))
        .route("/secrets/:key", post(handlers::secrets::set_secret))
        .route("/secrets/:key", get(handlers::secrets::get_secret))
        .route("/secrets/:key", delete(handlers::secrets::delete_secret))
        .route("/secrets/:key/metadata", patch(handlers::secrets::update_secret_metadata))
        .route("/secrets/:key/field/:field", get(handlers::secrets::get_secret_field))
        .route("/oauth-secrets/:key", post(handlers::secrets::set_oauth_secret))
        .route("/api-key-secrets/:key", post(handlers::secrets::set_api_key_secret))
        .route("/database-secrets/:key", post(handlers::secrets::set_database_secret))
        .route("/jwt-secrets/:key", post(handlers::secrets::set_jwt_secret))
        .route("/structured-secrets/:key", get(handlers::secrets::get_structured_secret))
}

fn plugin_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(handlers::plugins::list_plugins))
        .route("/:name", get(handlers::plugins::get_plugin))
}
