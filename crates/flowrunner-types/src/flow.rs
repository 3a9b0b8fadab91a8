use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AccountId, FlowId};

/// Denormalized, listing-friendly metadata kept alongside the YAML source of
/// truth so `list`/`search` never need to re-parse every flow.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlowMetadata {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A stored flow. `yaml` is authoritative; the node graph is derived from it
/// on demand by the loader, never persisted separately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flow {
    pub id: FlowId,
    pub account_id: AccountId,
    pub yaml: String,
    pub metadata: FlowMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Listing-oriented projection of a `Flow`, omitting the YAML body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowInfo {
    pub id: FlowId,
    pub account_id: AccountId,
    pub metadata: FlowMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Flow> for FlowInfo {
    fn from(flow: &Flow) -> Self {
        Self {
            id: flow.id.clone(),
            account_id: flow.account_id.clone(),
            metadata: flow.metadata.clone(),
            created_at: flow.created_at,
            updated_at: flow.updated_at,
        }
    }
}

/// Filter used by `FlowRegistry::search`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FlowSearchQuery {
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub name_contains: Option<String>,
    #[serde(default)]
    pub created_after: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_before: Option<DateTime<Utc>>,
}

impl FlowSearchQuery {
    pub fn matches(&self, info: &FlowInfo) -> bool {
        if !self.tags.is_empty() && !self.tags.iter().all(|t| info.metadata.tags.contains(t)) {
            return false;
        }
        if let Some(needle) = &self.name_contains {
            if !info.metadata.name.to_lowercase().contains(&needle.to_lowercase()) {
                return false;
            }
        }
        if let Some(after) = self.created_after {
            if info.created_at < after {
                return false;
            }
        }
        if let Some(before) = self.created_before {
            if info.created_at > before {
                return false;
            }
        }
        true
    }
}
