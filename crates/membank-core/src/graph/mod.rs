//! The knowledge graph: an append-only event log folded into an in-memory
//! state, with a materialized snapshot + index sidecar for fast reopen.

mod event;
mod index;
mod log;
pub(crate) mod model;
mod query;
mod render;
mod snapshot;
mod store;

pub use event::{Event, Marker};
pub use index::{GraphIndex, GraphStats};
pub use log::{EventLog, ReplayWarnings};
pub use model::{Entity, EntityId, Observation, ObservationSource, Relation};
pub use render::render_markdown;
pub use snapshot::{fold, FoldWarnings, GraphState, PersistedSnapshot, SnapshotMeta};
pub use store::{GraphStore, OpenNodesResult, SearchHit, SearchOptions};
