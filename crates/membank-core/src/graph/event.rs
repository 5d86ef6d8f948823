//! Event log record shapes: the fixed marker and the tagged-union data
//! events that make up the rest of `graph.jsonl`.

use super::model::{Entity, EntityId, Observation, Relation};
use crate::error::{MemoryBankError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MARKER_TYPE: &str = "memory_bank_graph";
pub const MARKER_SOURCE: &str = "memory-bank-mcp";
pub const MARKER_VERSION: &str = "1";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Marker {
    #[serde(rename = "type")]
    pub type_tag: String,
    pub source: String,
    pub version: String,
}

impl Marker {
    pub fn current() -> Self {
        Self {
            type_tag: MARKER_TYPE.to_string(),
            source: MARKER_SOURCE.to_string(),
            version: MARKER_VERSION.to_string(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.type_tag != MARKER_TYPE || self.version != MARKER_VERSION {
            return Err(MemoryBankError::MarkerMismatch(format!(
                "expected type={MARKER_TYPE} version={MARKER_VERSION}, found type={} version={}",
                self.type_tag, self.version
            )));
        }
        Ok(())
    }
}

/// A single data event appended to the log after the marker line.
/// Tagged on `type`; unrecognized tags deserialize as `Unknown` so replay
/// can skip forward-incompatible records with a warning instead of failing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    #[serde(rename = "entity_upsert")]
    EntityUpsert { entity: Entity, ts: DateTime<Utc> },

    #[serde(rename = "observation_add")]
    ObservationAdd {
        observation: Observation,
        ts: DateTime<Utc>,
    },

    #[serde(rename = "relation_add")]
    RelationAdd { relation: Relation, ts: DateTime<Utc> },

    #[serde(rename = "relation_remove")]
    RelationRemove {
        from_id: EntityId,
        to_id: EntityId,
        relation_type: String,
        ts: DateTime<Utc>,
    },

    #[serde(rename = "entity_delete")]
    EntityDelete { id: EntityId, ts: DateTime<Utc> },

    #[serde(rename = "observation_delete")]
    ObservationDelete {
        entity_id: EntityId,
        observation_id: String,
        ts: DateTime<Utc>,
    },

    #[serde(rename = "snapshot_written")]
    SnapshotWritten { ts: DateTime<Utc> },

    /// Forward-compatibility hook (design note in spec §9): any `type` tag
    /// this build doesn't recognize lands here instead of failing to parse.
    #[serde(other)]
    Unknown,
}

impl Event {
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Event::EntityUpsert { ts, .. }
            | Event::ObservationAdd { ts, .. }
            | Event::RelationAdd { ts, .. }
            | Event::RelationRemove { ts, .. }
            | Event::EntityDelete { ts, .. }
            | Event::ObservationDelete { ts, .. }
            | Event::SnapshotWritten { ts, .. } => Some(*ts),
            Event::Unknown => None,
        }
    }
}
