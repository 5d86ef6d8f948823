//! Materialized graph state and the pure, deterministic fold that builds it
//! from a sequence of events.
//!
//! Grounded on the teacher's "fold/reconcile" pattern in
//! `store/pad_store.rs::reconcile` (orphan detection, needs-update
//! comparisons), generalized from filesystem-vs-index reconciliation to
//! event-vs-state folding.

use super::event::Event;
use super::model::{Entity, EntityId, Observation, Relation};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

pub const SNAPSHOT_SCHEMA_VERSION: &str = "1";
pub const SNAPSHOT_SOURCE: &str = "memory-bank-mcp";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnapshotMeta {
    #[serde(rename = "type")]
    pub type_tag: String,
    pub version: String,
    pub store_id: String,
    pub created_at: DateTime<Utc>,
    pub source: String,
}

impl SnapshotMeta {
    pub fn new(store_id: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            type_tag: super::event::MARKER_TYPE.to_string(),
            version: SNAPSHOT_SCHEMA_VERSION.to_string(),
            store_id: store_id.into(),
            created_at,
            source: SNAPSHOT_SOURCE.to_string(),
        }
    }
}

/// The live, in-memory graph state: the set of entities, observations, and
/// relations that survive replay. Keyed by id internally for O(1) lookup;
/// serialized as sorted arrays for deterministic on-disk bytes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphState {
    pub entities: BTreeMap<EntityId, Entity>,
    pub observations: BTreeMap<String, Observation>,
    pub relations: BTreeMap<String, Relation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedSnapshot {
    pub meta: SnapshotMeta,
    pub entities: Vec<Entity>,
    pub observations: Vec<Observation>,
    pub relations: Vec<Relation>,
}

impl GraphState {
    pub fn to_persisted(&self, meta: SnapshotMeta) -> PersistedSnapshot {
        PersistedSnapshot {
            meta,
            entities: self.entities.values().cloned().collect(),
            observations: self.observations.values().cloned().collect(),
            relations: self.relations.values().cloned().collect(),
        }
    }

    pub fn from_persisted(persisted: PersistedSnapshot) -> Self {
        let mut state = GraphState::default();
        for e in persisted.entities {
            state.entities.insert(e.id.clone(), e);
        }
        for o in persisted.observations {
            state.observations.insert(o.id.clone(), o);
        }
        for r in persisted.relations {
            state.relations.insert(r.id.clone(), r);
        }
        state
    }

    fn name_index(&self) -> HashMap<String, EntityId> {
        self.entities
            .values()
            .map(|e| (e.name.to_lowercase(), e.id.clone()))
            .collect()
    }

    fn relation_triple_index(&self) -> HashSet<(String, String, String)> {
        self.relations
            .values()
            .map(|r| (r.from_id.clone(), r.to_id.clone(), r.relation_type.clone()))
            .collect()
    }

    pub fn find_relation_id(&self, from: &str, to: &str, relation_type: &str) -> Option<String> {
        self.relations
            .values()
            .find(|r| r.from_id == from && r.to_id == to && r.relation_type == relation_type)
            .map(|r| r.id.clone())
    }

    pub fn resolve_entity_id(&self, entity_ref: &str) -> Option<EntityId> {
        if self.entities.contains_key(entity_ref) {
            return Some(entity_ref.to_string());
        }
        let lower = entity_ref.to_lowercase();
        self.entities
            .values()
            .find(|e| e.name.to_lowercase() == lower)
            .map(|e| e.id.clone())
    }

    /// The latest timestamp touching any live entity/observation/relation,
    /// or the Unix epoch for an empty state. Used in place of wall-clock
    /// `Utc::now()` for `meta.created_at`/`snapshot_built_at` so that
    /// persisting the *same* state twice in a row (e.g. `rebuild(); rebuild()`)
    /// produces byte-identical snapshot/index files per spec §8 property 6 —
    /// the timestamp is a function of the state, not of when it was written.
    pub fn derived_timestamp(&self) -> DateTime<Utc> {
        let mut latest: Option<DateTime<Utc>> = None;
        for entity in self.entities.values() {
            latest = Some(latest.map_or(entity.updated_at, |l| l.max(entity.updated_at)));
        }
        for observation in self.observations.values() {
            latest = Some(latest.map_or(observation.created_at, |l| l.max(observation.created_at)));
        }
        for relation in self.relations.values() {
            latest = Some(latest.map_or(relation.created_at, |l| l.max(relation.created_at)));
        }
        latest.unwrap_or_else(|| DateTime::<Utc>::from_timestamp(0, 0).unwrap())
    }
}

/// Counts of events that were dropped because a precondition (a referenced
/// entity existing) did not hold. Per spec §4.5/§7 this is a silent drop
/// recorded as a warning, never a fold failure.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FoldWarnings {
    pub dropped_observations: usize,
    pub dropped_relations: usize,
}

/// Folds `events` onto `state`, in order. Total and deterministic: the same
/// `(state, events)` pair always yields the same resulting `GraphState`.
pub fn fold(state: GraphState, events: &[Event]) -> (GraphState, FoldWarnings) {
    let mut state = state;
    let mut warnings = FoldWarnings::default();

    for event in events {
        apply_event(&mut state, event, &mut warnings);
    }

    (state, warnings)
}

fn apply_event(state: &mut GraphState, event: &Event, warnings: &mut FoldWarnings) {
    match event {
        Event::EntityUpsert { entity, ts } => apply_entity_upsert(state, entity, *ts),
        Event::ObservationAdd { observation, .. } => {
            if state.entities.contains_key(&observation.entity_id) {
                state
                    .observations
                    .insert(observation.id.clone(), observation.clone());
            } else {
                tracing::warn!(
                    entity_id = %observation.entity_id,
                    "dropping observation_add: owning entity does not exist"
                );
                warnings.dropped_observations += 1;
            }
        }
        Event::RelationAdd { relation, .. } => {
            let endpoints_exist = state.entities.contains_key(&relation.from_id)
                && state.entities.contains_key(&relation.to_id);
            if !endpoints_exist {
                tracing::warn!(
                    from = %relation.from_id,
                    to = %relation.to_id,
                    "dropping relation_add: an endpoint does not exist"
                );
                warnings.dropped_relations += 1;
                return;
            }
            let triples = state.relation_triple_index();
            let key = (
                relation.from_id.clone(),
                relation.to_id.clone(),
                relation.relation_type.clone(),
            );
            if !triples.contains(&key) {
                state.relations.insert(relation.id.clone(), relation.clone());
            }
        }
        Event::RelationRemove {
            from_id,
            to_id,
            relation_type,
            ..
        } => {
            if let Some(id) = state.find_relation_id(from_id, to_id, relation_type) {
                state.relations.remove(&id);
            }
        }
        Event::EntityDelete { id, .. } => {
            state.entities.remove(id);
            state.observations.retain(|_, o| &o.entity_id != id);
            state
                .relations
                .retain(|_, r| &r.from_id != id && &r.to_id != id);
        }
        Event::ObservationDelete {
            entity_id,
            observation_id,
            ..
        } => {
            let matches = state
                .observations
                .get(observation_id)
                .map(|o| &o.entity_id == entity_id)
                .unwrap_or(false);
            if matches {
                state.observations.remove(observation_id);
            }
        }
        Event::SnapshotWritten { .. } => {}
        Event::Unknown => {
            tracing::warn!("skipping unrecognized event type during replay");
        }
    }
}

fn apply_entity_upsert(state: &mut GraphState, incoming: &Entity, ts: DateTime<Utc>) {
    if let Some(existing) = state.entities.get(&incoming.id) {
        let mut updated = incoming.clone();
        updated.created_at = existing.created_at;
        updated.updated_at = ts;
        state.entities.insert(updated.id.clone(), updated);
        return;
    }

    let name_index = state.name_index();
    if let Some(existing_id) = name_index.get(&incoming.name.to_lowercase()) {
        let existing = state.entities.get(existing_id).expect("name index is in sync");
        let mut updated = incoming.clone();
        updated.id = existing_id.clone();
        updated.created_at = existing.created_at;
        updated.updated_at = ts;
        state.entities.insert(updated.id.clone(), updated);
        return;
    }

    // A brand-new entity carries its own created_at/updated_at (the mutation
    // API sets both to "now" at mint time); trusting the payload here rather
    // than forcing `ts` lets compaction re-emit entities with their original
    // timestamps intact (see graph::store::compact).
    let _ = ts;
    state.entities.insert(incoming.id.clone(), incoming.clone());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::model::ObservationSource;
    use chrono::Duration;

    fn entity(id: &str, name: &str) -> Entity {
        let now = Utc::now();
        Entity {
            id: id.to_string(),
            name: name.to_string(),
            entity_type: "module".to_string(),
            attrs: Default::default(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn upsert_by_name_preserves_original_id_and_created_at() {
        let t1 = Utc::now();
        let t2 = t1 + Duration::seconds(5);

        let e1 = Event::EntityUpsert {
            entity: Entity {
                created_at: t1,
                updated_at: t1,
                ..entity("gen-id-1", "ServiceX")
            },
            ts: t1,
        };
        let (state, _) = fold(GraphState::default(), &[e1]);
        let original_id = state.entities.values().next().unwrap().id.clone();
        assert_eq!(state.entities.len(), 1);

        let mut attrs = serde_json::Map::new();
        attrs.insert("owner".to_string(), serde_json::json!("alice"));
        let e2 = Event::EntityUpsert {
            entity: Entity {
                attrs,
                created_at: t2,
                updated_at: t2,
                ..entity("gen-id-2", "SERVICEX")
            },
            ts: t2,
        };
        let (state, _) = fold(state, &[e2]);

        assert_eq!(state.entities.len(), 1, "no duplicate entity created");
        let only = state.entities.values().next().unwrap();
        assert_eq!(only.id, original_id);
        assert_eq!(only.created_at, t1);
        assert_eq!(only.updated_at, t2);
        assert_eq!(only.attrs.get("owner").unwrap(), "alice");
    }

    #[test]
    fn observation_add_dropped_when_entity_missing() {
        let now = Utc::now();
        let obs = Observation {
            id: "o1".to_string(),
            entity_id: "missing".to_string(),
            text: "x".to_string(),
            source: Some(ObservationSource::Manual),
            source_ref: None,
            created_at: now,
        };
        let (state, warnings) = fold(
            GraphState::default(),
            &[Event::ObservationAdd {
                observation: obs,
                ts: now,
            }],
        );
        assert!(state.observations.is_empty());
        assert_eq!(warnings.dropped_observations, 1);
    }

    #[test]
    fn relation_add_is_deduplicated_by_triple() {
        let now = Utc::now();
        let e1 = entity("e1", "Auth");
        let e2 = entity("e2", "DB");
        let mut events = vec![
            Event::EntityUpsert {
                entity: e1,
                ts: now,
            },
            Event::EntityUpsert {
                entity: e2,
                ts: now,
            },
        ];
        let rel = Relation {
            id: "r1".to_string(),
            from_id: "e1".to_string(),
            to_id: "e2".to_string(),
            relation_type: "depends_on".to_string(),
            created_at: now,
        };
        events.push(Event::RelationAdd {
            relation: rel.clone(),
            ts: now,
        });
        let mut rel2 = rel.clone();
        rel2.id = "r2".to_string();
        events.push(Event::RelationAdd {
            relation: rel2,
            ts: now,
        });

        let (state, _) = fold(GraphState::default(), &events);
        assert_eq!(state.relations.len(), 1);
    }

    #[test]
    fn delete_entity_cascades_observations_and_relations() {
        let now = Utc::now();
        let auth = entity("e1", "Auth");
        let db = entity("e2", "DB");
        let obs = Observation {
            id: "o1".to_string(),
            entity_id: "e1".to_string(),
            text: "Uses JWT".to_string(),
            source: Some(ObservationSource::Manual),
            source_ref: None,
            created_at: now,
        };
        let rel = Relation {
            id: "r1".to_string(),
            from_id: "e1".to_string(),
            to_id: "e2".to_string(),
            relation_type: "depends_on".to_string(),
            created_at: now,
        };

        let events = vec![
            Event::EntityUpsert {
                entity: auth,
                ts: now,
            },
            Event::EntityUpsert { entity: db, ts: now },
            Event::RelationAdd {
                relation: rel,
                ts: now,
            },
            Event::ObservationAdd {
                observation: obs,
                ts: now,
            },
            Event::EntityDelete {
                id: "e1".to_string(),
                ts: now,
            },
        ];

        let (state, _) = fold(GraphState::default(), &events);
        assert_eq!(state.entities.len(), 1);
        assert!(state.entities.contains_key("e2"));
        assert!(state.observations.is_empty());
        assert!(state.relations.is_empty());
    }

    #[test]
    fn fold_is_deterministic_for_same_event_sequence() {
        let now = Utc::now();
        let events = vec![Event::EntityUpsert {
            entity: entity("e1", "Auth"),
            ts: now,
        }];
        let (state_a, _) = fold(GraphState::default(), &events);
        let (state_b, _) = fold(GraphState::default(), &events);

        let meta = SnapshotMeta::new("store", now);
        let persisted_a = serde_json::to_string(&state_a.to_persisted(meta.clone())).unwrap();
        let persisted_b = serde_json::to_string(&state_b.to_persisted(meta)).unwrap();
        assert_eq!(persisted_a, persisted_b);
    }

    #[test]
    fn relation_remove_is_a_no_op_when_absent() {
        let now = Utc::now();
        let (state, _) = fold(
            GraphState::default(),
            &[Event::RelationRemove {
                from_id: "a".to_string(),
                to_id: "b".to_string(),
                relation_type: "x".to_string(),
                ts: now,
            }],
        );
        assert!(state.relations.is_empty());
    }
}
