//! Knowledge-graph node/edge types: entities, observations, relations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Map;

pub type EntityId = String;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    pub entity_type: String,
    #[serde(default)]
    pub attrs: Map<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationSource {
    Manual,
    Tool,
    Import,
    Agent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub id: String,
    pub entity_id: EntityId,
    pub text: String,
    #[serde(default)]
    pub source: Option<ObservationSource>,
    #[serde(default)]
    pub source_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub id: String,
    pub from_id: EntityId,
    pub to_id: EntityId,
    pub relation_type: String,
    pub created_at: DateTime<Utc>,
}

impl Relation {
    /// The (from, to, type) triple relations are deduplicated by.
    pub fn triple(&self) -> (&str, &str, &str) {
        (&self.from_id, &self.to_id, &self.relation_type)
    }
}
