use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use flowrunner_types::{ExecutionId, ExecutionStatus, FlowSearchQuery, JsonValue};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateFlowRequest {
    pub yaml: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateFlowRequest {
    pub yaml: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateFlowMetadataRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunFlowRequest {
    #[serde(default)]
    pub input: JsonValue,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunFlowResponse {
    pub execution_id: ExecutionId,
    pub status: ExecutionStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FlowSearchRequest {
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub name_contains: Option<String>,
    #[serde(default)]
    pub created_after: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_before: Option<DateTime<Utc>>,
}

impl From<FlowSearchRequest> for FlowSearchQuery {
    fn from(req: FlowSearchRequest) -> Self {
        Self {
            tags: req.tags,
            name_contains: req.name_contains,
            created_after: req.created_after,
            created_before: req.created_before,
        }
    }
}
