//! The `graph.index.json` sidecar: quick-lookup stats and a name→id map,
//! rebuilt from in-memory state (never from the log directly) so it is
//! always consistent with the current entities.
//!
//! Grounded on the teacher's recursive per-bucket counting in
//! `index.rs::index_pads`, generalized from display-index bucketing to
//! distinct-type/name-to-id bucketing.

use super::snapshot::GraphState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct GraphStats {
    pub entity_count: usize,
    pub observation_count: usize,
    pub relation_count: usize,
    pub entity_types: Vec<String>,
    pub relation_types: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphIndex {
    pub last_event_line_count: usize,
    pub snapshot_built_at: DateTime<Utc>,
    pub jsonl_modified_at: Option<DateTime<Utc>>,
    pub stats: GraphStats,
    /// Case-preserved entity name -> id. Lookups lowercase both sides.
    pub name_to_entity_id: BTreeMap<String, String>,
}

impl GraphIndex {
    pub fn build(
        state: &GraphState,
        last_event_line_count: usize,
        jsonl_modified_at: Option<DateTime<Utc>>,
        snapshot_built_at: DateTime<Utc>,
    ) -> Self {
        let mut entity_types: Vec<String> = state
            .entities
            .values()
            .map(|e| e.entity_type.clone())
            .collect();
        entity_types.sort();
        entity_types.dedup();

        let mut relation_types: Vec<String> = state
            .relations
            .values()
            .map(|r| r.relation_type.clone())
            .collect();
        relation_types.sort();
        relation_types.dedup();

        let name_to_entity_id = state
            .entities
            .values()
            .map(|e| (e.name.clone(), e.id.clone()))
            .collect();

        Self {
            last_event_line_count,
            snapshot_built_at,
            jsonl_modified_at,
            stats: GraphStats {
                entity_count: state.entities.len(),
                observation_count: state.observations.len(),
                relation_count: state.relations.len(),
                entity_types,
                relation_types,
            },
            name_to_entity_id,
        }
    }

    /// Per invariant 6 of spec §3: the index is stale once the log has grown
    /// past the line count it was built against.
    pub fn is_stale(&self, current_line_count: usize) -> bool {
        current_line_count > self.last_event_line_count
    }
}
