//! HTTP + WebSocket surface: routes, DTOs, auth middleware, error folding.

pub mod auth;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod websocket;

use axum::middleware::from_fn;
use axum::middleware::from_fn_with_state;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use state::AppState;

/// Compose the full router: public routes, an authenticated subtree guarded
/// by `auth::authenticate_middleware`, and request-wide timing/security
/// middleware applied last so they see every response, including error ones.
pub fn create_router(state: Arc<AppState>) -> Router {
    let authenticated = routes::authenticated_routes()
        .layer(from_fn_with_state(state.clone(), auth::authenticate_middleware));

    routes::public_routes()
        .merge(authenticated)
        .layer(from_fn(middleware::security_headers_middleware))
        .layer(from_fn(middleware::timing_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
