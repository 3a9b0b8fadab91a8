use axum::extract::{Path, State};
use axum::Json;
use std::sync::Arc;

use crate::dto::plugin::PluginInfo;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub async fn list_plugins(State(state): State<Arc<AppState>>) -> Json<Vec<PluginInfo>> {
    let mut names: Vec<String> = state.registry.known_types().into_iter().collect();
    names.sort();
    Json(names.into_iter().map(|name| PluginInfo { name }).collect())
}

pub async fn get_plugin(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<Json<PluginInfo>> {
    if state.registry.known_types().contains(&name) {
        Ok(Json(PluginInfo { name }))
    } else {
        Err(ApiError::NotFound)
    }
}
