//! Human-readable rendering of a graph snapshot to `graph/graph.md`.
//!
//! Optional per spec.md §4.1 — nothing in the core reads this file back;
//! it exists purely so a developer can `cat graph/graph.md` instead of
//! parsing the snapshot JSON. Grounded on the teacher's own markdown-export
//! shape in `commands/export.rs` (one heading per top-level grouping, a
//! bullet per item), generalized from pad content to graph entities.

use super::snapshot::GraphState;

/// Renders `state` as a flat markdown document: one `##` section per
/// entity, its type/attrs/observations as bullets, then a trailing
/// "Relations" section listing every edge by entity name.
pub fn render_markdown(state: &GraphState) -> String {
    let mut out = String::new();
    out.push_str("# Knowledge Graph\n\n");

    if state.entities.is_empty() {
        out.push_str("_No entities recorded yet._\n");
        return out;
    }

    let mut entities: Vec<_> = state.entities.values().collect();
    entities.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));

    for entity in &entities {
        out.push_str(&format!("## {} ({})\n\n", entity.name, entity.entity_type));
        if !entity.attrs.is_empty() {
            for (key, value) in &entity.attrs {
                out.push_str(&format!("- **{key}:** {value}\n"));
            }
        }

        let mut observations: Vec<_> = state
            .observations
            .values()
            .filter(|o| o.entity_id == entity.id)
            .collect();
        observations.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        for observation in observations {
            out.push_str(&format!("- {}\n", observation.text));
        }
        out.push('\n');
    }

    let mut relations: Vec<_> = state.relations.values().collect();
    if !relations.is_empty() {
        relations.sort_by(|a, b| (&a.from_id, &a.to_id, &a.relation_type).cmp(&(&b.from_id, &b.to_id, &b.relation_type)));
        out.push_str("## Relations\n\n");
        for relation in relations {
            let from_name = state
                .entities
                .get(&relation.from_id)
                .map(|e| e.name.as_str())
                .unwrap_or(relation.from_id.as_str());
            let to_name = state
                .entities
                .get(&relation.to_id)
                .map(|e| e.name.as_str())
                .unwrap_or(relation.to_id.as_str());
            out.push_str(&format!("- {from_name} --{}--> {to_name}\n", relation.relation_type));
        }
    }

    out
}
