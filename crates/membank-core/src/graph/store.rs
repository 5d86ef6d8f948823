//! Graph store: orchestrates the event log, the materialized snapshot, and
//! the index sidecar; serves mutations and queries; owns compaction.
//!
//! Grounded on the teacher's `PadStore<B: StorageBackend>` (`store/pad_store.rs`):
//! same shape of "load persisted state, reconcile/fold against the source of
//! truth, rebuild derived indexes," generalized from filesystem
//! reconciliation to log-replay.

use super::event::{Event, Marker};
use super::index::GraphIndex;
use super::log::EventLog;
use super::model::{Entity, EntityId, Observation, ObservationSource, Relation};
use super::snapshot::{fold, GraphState, PersistedSnapshot, SnapshotMeta};
use crate::error::{MemoryBankError, Result};
use crate::paths::{write_atomic, StoreLayout};
use chrono::Utc;
use serde_json::Map as JsonMap;
use std::fs;
use std::sync::Mutex;
use uuid::Uuid;

struct Inner {
    state: GraphState,
    index: GraphIndex,
}

/// Owns the single on-disk graph for one store. Mutations and compaction
/// take the internal lock for their full duration — linearizable within
/// this process, per spec §5. Construction is gated by `registry::open` so
/// two `GraphStore`s never point at the same directory in one process.
pub struct GraphStore {
    layout: StoreLayout,
    log: EventLog,
    inner: Mutex<Inner>,
}

pub struct SearchOptions {
    pub entity_types: Vec<String>,
    pub relation_types: Vec<String>,
    pub include_neighborhood: bool,
    pub neighborhood_depth: u8,
    pub limit: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            entity_types: Vec::new(),
            relation_types: Vec::new(),
            include_neighborhood: false,
            neighborhood_depth: 1,
            limit: 50,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchHit {
    pub entity: Entity,
    pub neighbors: Vec<Entity>,
    pub relations: Vec<Relation>,
}

#[derive(Debug, Clone)]
pub struct OpenNodesResult {
    pub entities: Vec<Entity>,
    pub relations: Vec<Relation>,
}

impl GraphStore {
    /// §4.6 `initialize()`: ensure the graph directory, open/validate the
    /// log, load-and-fold (from a snapshot if one is usable, else from the
    /// full log), then rebuild the in-memory index.
    pub fn initialize(layout: StoreLayout) -> Result<Self> {
        layout.ensure_graph_dir()?;
        let log = EventLog::open_or_create(layout.graph_log_path())?;
        let current_line_count = log.line_count()?;

        let persisted_snapshot = read_snapshot_file(&layout)?;
        let persisted_index = read_index_file(&layout)?;

        let state = match (persisted_snapshot, &persisted_index) {
            (Some(snapshot), Some(index))
                if index.last_event_line_count <= current_line_count =>
            {
                let base = GraphState::from_persisted(snapshot);
                let (tail_events, _warnings) = log.read_tail(index.last_event_line_count)?;
                let (state, _) = fold(base, &tail_events);
                state
            }
            _ => {
                let (all_events, _warnings) = log.read_all()?;
                let (state, _) = fold(GraphState::default(), &all_events);
                state
            }
        };

        let jsonl_modified_at = fs::metadata(log.path())
            .ok()
            .and_then(|m| m.modified().ok())
            .map(chrono::DateTime::<Utc>::from);
        let built_at = state.derived_timestamp();
        let index = GraphIndex::build(&state, current_line_count, jsonl_modified_at, built_at);

        Ok(Self {
            layout,
            log,
            inner: Mutex::new(Inner { state, index }),
        })
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    fn refresh_index(inner: &mut Inner, line_count: usize) {
        let built_at = inner.state.derived_timestamp();
        inner.index = GraphIndex::build(&inner.state, line_count, None, built_at);
    }

    fn apply_and_persist(&self, inner: &mut Inner, event: Event) -> Result<()> {
        self.log.append(&event)?;
        let (state, _warnings) = fold(std::mem::take(&mut inner.state), std::slice::from_ref(&event));
        inner.state = state;
        let line_count = self.log.line_count()?;
        Self::refresh_index(inner, line_count);
        Ok(())
    }

    // ---- Mutations ----

    pub fn upsert_entity(
        &self,
        name: &str,
        entity_type: &str,
        attrs: Option<JsonMap<String, serde_json::Value>>,
    ) -> Result<Entity> {
        if name.trim().is_empty() {
            return Err(MemoryBankError::InvalidInput("entity name must not be empty".into()));
        }
        let now = Utc::now();
        let entity = Entity {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            entity_type: entity_type.to_string(),
            attrs: attrs.unwrap_or_default(),
            created_at: now,
            updated_at: now,
        };
        let event = Event::EntityUpsert {
            entity: entity.clone(),
            ts: now,
        };

        let mut inner = self.inner.lock().expect("graph store lock poisoned");
        self.apply_and_persist(&mut inner, event)?;
        let resolved_id = inner
            .state
            .resolve_entity_id(name)
            .unwrap_or(entity.id.clone());
        Ok(inner.state.entities.get(&resolved_id).cloned().unwrap_or(entity))
    }

    pub fn add_observation(
        &self,
        entity_ref: &str,
        text: &str,
        source: Option<ObservationSource>,
    ) -> Result<Observation> {
        let mut inner = self.inner.lock().expect("graph store lock poisoned");
        let entity_id = inner
            .state
            .resolve_entity_id(entity_ref)
            .ok_or_else(|| MemoryBankError::EntityNotFound(entity_ref.to_string()))?;

        let now = Utc::now();
        let observation = Observation {
            id: Uuid::new_v4().to_string(),
            entity_id,
            text: text.to_string(),
            source,
            source_ref: None,
            created_at: now,
        };
        let event = Event::ObservationAdd {
            observation: observation.clone(),
            ts: now,
        };
        self.apply_and_persist(&mut inner, event)?;
        Ok(observation)
    }

    pub fn add_doc_pointer(
        &self,
        entity_ref: &str,
        filename: &str,
        heading: Option<&str>,
    ) -> Result<Observation> {
        let reference = match heading {
            Some(h) => format!("{filename}#{h}"),
            None => filename.to_string(),
        };
        let text = format!("Documented in {reference}");

        let mut inner = self.inner.lock().expect("graph store lock poisoned");
        let entity_id = inner
            .state
            .resolve_entity_id(entity_ref)
            .ok_or_else(|| MemoryBankError::EntityNotFound(entity_ref.to_string()))?;

        let now = Utc::now();
        let observation = Observation {
            id: Uuid::new_v4().to_string(),
            entity_id,
            text,
            source: Some(ObservationSource::Tool),
            source_ref: Some(reference),
            created_at: now,
        };
        let event = Event::ObservationAdd {
            observation: observation.clone(),
            ts: now,
        };
        self.apply_and_persist(&mut inner, event)?;
        Ok(observation)
    }

    pub fn link_entities(
        &self,
        from_ref: &str,
        to_ref: &str,
        relation_type: &str,
    ) -> Result<Relation> {
        let mut inner = self.inner.lock().expect("graph store lock poisoned");
        let from_id = inner
            .state
            .resolve_entity_id(from_ref)
            .ok_or_else(|| MemoryBankError::EntityNotFound(from_ref.to_string()))?;
        let to_id = inner
            .state
            .resolve_entity_id(to_ref)
            .ok_or_else(|| MemoryBankError::EntityNotFound(to_ref.to_string()))?;

        if let Some(existing_id) = inner.state.find_relation_id(&from_id, &to_id, relation_type) {
            return Ok(inner.state.relations.get(&existing_id).cloned().expect("just found"));
        }

        let now = Utc::now();
        let relation = Relation {
            id: Uuid::new_v4().to_string(),
            from_id,
            to_id,
            relation_type: relation_type.to_string(),
            created_at: now,
        };
        let event = Event::RelationAdd {
            relation: relation.clone(),
            ts: now,
        };
        self.apply_and_persist(&mut inner, event)?;
        Ok(relation)
    }

    pub fn unlink_entities(&self, from_ref: &str, to_ref: &str, relation_type: &str) -> Result<()> {
        let mut inner = self.inner.lock().expect("graph store lock poisoned");
        let from_id = inner
            .state
            .resolve_entity_id(from_ref)
            .unwrap_or_else(|| from_ref.to_string());
        let to_id = inner
            .state
            .resolve_entity_id(to_ref)
            .unwrap_or_else(|| to_ref.to_string());

        if inner.state.find_relation_id(&from_id, &to_id, relation_type).is_none() {
            return Err(MemoryBankError::RelationNotFound {
                from: from_ref.to_string(),
                to: to_ref.to_string(),
                relation_type: relation_type.to_string(),
            });
        }

        let now = Utc::now();
        let event = Event::RelationRemove {
            from_id,
            to_id,
            relation_type: relation_type.to_string(),
            ts: now,
        };
        self.apply_and_persist(&mut inner, event)
    }

    pub fn delete_entity(&self, entity_ref: &str) -> Result<Entity> {
        let mut inner = self.inner.lock().expect("graph store lock poisoned");
        let entity_id = inner
            .state
            .resolve_entity_id(entity_ref)
            .ok_or_else(|| MemoryBankError::EntityNotFound(entity_ref.to_string()))?;
        let deleted = inner
            .state
            .entities
            .get(&entity_id)
            .cloned()
            .expect("resolved id must be present");

        let now = Utc::now();
        let event = Event::EntityDelete {
            id: entity_id,
            ts: now,
        };
        self.apply_and_persist(&mut inner, event)?;
        Ok(deleted)
    }

    pub fn delete_observation(&self, entity_ref: &str, observation_id: &str) -> Result<()> {
        let mut inner = self.inner.lock().expect("graph store lock poisoned");
        let entity_id = inner
            .state
            .resolve_entity_id(entity_ref)
            .ok_or_else(|| MemoryBankError::EntityNotFound(entity_ref.to_string()))?;

        let matches = inner
            .state
            .observations
            .get(observation_id)
            .map(|o| o.entity_id == entity_id)
            .unwrap_or(false);
        if !matches {
            return Err(MemoryBankError::ObservationNotFound(observation_id.to_string()));
        }

        let now = Utc::now();
        let event = Event::ObservationDelete {
            entity_id,
            observation_id: observation_id.to_string(),
            ts: now,
        };
        self.apply_and_persist(&mut inner, event)
    }

    // ---- Queries ----

    pub fn snapshot(&self) -> PersistedSnapshot {
        let inner = self.inner.lock().expect("graph store lock poisoned");
        let created_at = inner.state.derived_timestamp();
        inner
            .state
            .to_persisted(SnapshotMeta::new(self.layout.store_id(), created_at))
    }

    pub fn stats(&self) -> super::index::GraphStats {
        let inner = self.inner.lock().expect("graph store lock poisoned");
        inner.index.stats.clone()
    }

    pub fn search(&self, query: &str, opts: &SearchOptions) -> Vec<SearchHit> {
        super::query::search(&self.inner.lock().expect("graph store lock poisoned").state, query, opts)
    }

    pub fn open_nodes(&self, refs: &[String]) -> OpenNodesResult {
        super::query::open_nodes(&self.inner.lock().expect("graph store lock poisoned").state, refs)
    }

    // ---- Compaction / rebuild ----

    /// Rewrites the log so replay yields the same snapshot with no
    /// deleted/superseded records, then writes the snapshot and index files.
    /// The lock spans the whole procedure.
    pub fn compact(&self) -> Result<()> {
        let mut inner = self.inner.lock().expect("graph store lock poisoned");

        let mut lines = Vec::new();
        lines.push(serde_json::to_string(&Marker::current())?);

        let mut entities: Vec<&Entity> = inner.state.entities.values().collect();
        entities.sort_by(|a, b| a.id.cmp(&b.id));
        for entity in entities {
            let event = Event::EntityUpsert {
                entity: entity.clone(),
                ts: entity.updated_at,
            };
            lines.push(serde_json::to_string(&event)?);
        }

        let mut observations: Vec<&Observation> = inner.state.observations.values().collect();
        observations.sort_by(|a, b| a.id.cmp(&b.id));
        for observation in observations {
            let event = Event::ObservationAdd {
                observation: observation.clone(),
                ts: observation.created_at,
            };
            lines.push(serde_json::to_string(&event)?);
        }

        let mut relations: Vec<&Relation> = inner.state.relations.values().collect();
        relations.sort_by(|a, b| a.id.cmp(&b.id));
        for relation in relations {
            let event = Event::RelationAdd {
                relation: relation.clone(),
                ts: relation.created_at,
            };
            lines.push(serde_json::to_string(&event)?);
        }

        let mut content = lines.join("\n");
        content.push('\n');
        write_atomic(self.log.path(), content.as_bytes())?;

        self.write_snapshot_and_index(&mut inner)
    }

    /// Rebuild = fold log -> write snapshot -> write index. No mutation to
    /// the log itself.
    pub fn rebuild(&self) -> Result<()> {
        let mut inner = self.inner.lock().expect("graph store lock poisoned");
        let (all_events, _warnings) = self.log.read_all()?;
        let (state, _fold_warnings) = fold(GraphState::default(), &all_events);
        inner.state = state;
        let line_count = self.log.line_count()?;
        Self::refresh_index(&mut inner, line_count);
        self.write_snapshot_and_index(&mut inner)
    }

    fn write_snapshot_and_index(&self, inner: &mut Inner) -> Result<()> {
        let created_at = inner.state.derived_timestamp();
        let persisted = inner
            .state
            .to_persisted(SnapshotMeta::new(self.layout.store_id(), created_at));
        let snapshot_bytes = serde_json::to_vec_pretty(&persisted)?;
        write_atomic(&self.layout.graph_snapshot_path(), &snapshot_bytes)?;

        let line_count = self.log.line_count()?;
        Self::refresh_index(inner, line_count);
        let index_bytes = serde_json::to_vec_pretty(&inner.index)?;
        write_atomic(&self.layout.graph_index_path(), &index_bytes)?;

        let rendered = super::render::render_markdown(&inner.state);
        write_atomic(&self.layout.graph_render_path(), rendered.as_bytes())?;

        Ok(())
    }
}

fn read_snapshot_file(layout: &StoreLayout) -> Result<Option<PersistedSnapshot>> {
    let path = layout.graph_snapshot_path();
    if !path.exists() {
        return Ok(None);
    }
    let bytes = fs::read(&path).map_err(MemoryBankError::Io)?;
    let snapshot: PersistedSnapshot = serde_json::from_slice(&bytes)?;
    Ok(Some(snapshot))
}

fn read_index_file(layout: &StoreLayout) -> Result<Option<GraphIndex>> {
    let path = layout.graph_index_path();
    if !path.exists() {
        return Ok(None);
    }
    let bytes = fs::read(&path).map_err(MemoryBankError::Io)?;
    let index: GraphIndex = serde_json::from_slice(&bytes)?;
    Ok(Some(index))
}
