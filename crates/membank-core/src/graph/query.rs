//! Search and neighborhood expansion over the in-memory graph state.
//!
//! Per spec §1 Non-goals, this is intentionally a linear substring scan —
//! no secondary full-text index, no general query language.

use super::snapshot::GraphState;
use super::store::{OpenNodesResult, SearchHit, SearchOptions};
use std::cmp::Ordering;
use std::collections::HashSet;

pub fn search(state: &GraphState, query: &str, opts: &SearchOptions) -> Vec<SearchHit> {
    let needle = query.to_lowercase();

    let mut matches: Vec<_> = state
        .entities
        .values()
        .filter(|e| {
            let haystack_matches =
                e.name.to_lowercase().contains(&needle) || e.entity_type.to_lowercase().contains(&needle);
            let type_allowed = opts.entity_types.is_empty()
                || opts
                    .entity_types
                    .iter()
                    .any(|t| t.eq_ignore_ascii_case(&e.entity_type));
            haystack_matches && type_allowed
        })
        .collect();

    matches.sort_by(|a, b| {
        let a_exact = a.name.eq_ignore_ascii_case(query);
        let b_exact = b.name.eq_ignore_ascii_case(query);
        match (a_exact, b_exact) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => match b.updated_at.cmp(&a.updated_at) {
                Ordering::Equal => a.name.cmp(&b.name),
                other => other,
            },
        }
    });

    matches.truncate(opts.limit);

    matches
        .into_iter()
        .map(|entity| {
            let (neighbors, relations) = if opts.include_neighborhood {
                expand_neighborhood(state, &entity.id, opts.neighborhood_depth, &opts.relation_types)
            } else {
                (Vec::new(), Vec::new())
            };
            SearchHit {
                entity: entity.clone(),
                neighbors,
                relations,
            }
        })
        .collect()
}

/// BFS out to `depth` hops from `start_id`, collecting touching relations
/// (optionally filtered by `relation_type_filter`) and the entities at their
/// other endpoint.
fn expand_neighborhood(
    state: &GraphState,
    start_id: &str,
    depth: u8,
    relation_type_filter: &[String],
) -> (Vec<super::model::Entity>, Vec<super::model::Relation>) {
    let mut visited: HashSet<String> = HashSet::new();
    visited.insert(start_id.to_string());
    let mut frontier: Vec<String> = vec![start_id.to_string()];
    let mut collected_relations = Vec::new();
    let mut collected_entities = Vec::new();

    for _ in 0..depth.max(1) {
        let mut next_frontier = Vec::new();
        for node in &frontier {
            for relation in state.relations.values() {
                let touches = relation.from_id == *node || relation.to_id == *node;
                if !touches {
                    continue;
                }
                if !relation_type_filter.is_empty()
                    && !relation_type_filter
                        .iter()
                        .any(|t| t.eq_ignore_ascii_case(&relation.relation_type))
                {
                    continue;
                }
                collected_relations.push(relation.clone());

                let other = if relation.from_id == *node {
                    &relation.to_id
                } else {
                    &relation.from_id
                };
                if visited.insert(other.clone()) {
                    next_frontier.push(other.clone());
                    if let Some(entity) = state.entities.get(other) {
                        collected_entities.push(entity.clone());
                    }
                }
            }
        }
        frontier = next_frontier;
        if frontier.is_empty() {
            break;
        }
    }

    collected_relations.sort_by(|a, b| a.id.cmp(&b.id));
    collected_relations.dedup_by(|a, b| a.id == b.id);
    (collected_entities, collected_relations)
}

pub fn open_nodes(state: &GraphState, refs: &[String]) -> OpenNodesResult {
    let mut base_ids: Vec<String> = Vec::new();
    for r in refs {
        if let Some(id) = state.resolve_entity_id(r) {
            if !base_ids.contains(&id) {
                base_ids.push(id);
            }
        }
    }

    let mut combined: HashSet<String> = base_ids.iter().cloned().collect();
    for id in &base_ids {
        for relation in state.relations.values() {
            if relation.from_id == *id {
                combined.insert(relation.to_id.clone());
            } else if relation.to_id == *id {
                combined.insert(relation.from_id.clone());
            }
        }
    }

    let mut entities: Vec<_> = combined
        .iter()
        .filter_map(|id| state.entities.get(id).cloned())
        .collect();
    entities.sort_by(|a, b| a.id.cmp(&b.id));

    let mut relations: Vec<_> = state
        .relations
        .values()
        .filter(|r| combined.contains(&r.from_id) && combined.contains(&r.to_id))
        .cloned()
        .collect();
    relations.sort_by(|a, b| a.id.cmp(&b.id));

    OpenNodesResult { entities, relations }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::event::Event;
    use crate::graph::model::Entity;
    use crate::graph::model::Relation;
    use crate::graph::snapshot::fold;
    use chrono::Utc;

    fn entity(id: &str, name: &str, entity_type: &str) -> Entity {
        let now = Utc::now();
        Entity {
            id: id.to_string(),
            name: name.to_string(),
            entity_type: entity_type.to_string(),
            attrs: Default::default(),
            created_at: now,
            updated_at: now,
        }
    }

    fn sample_state() -> GraphState {
        let now = Utc::now();
        let events = vec![
            Event::EntityUpsert {
                entity: entity("e1", "Auth", "module"),
                ts: now,
            },
            Event::EntityUpsert {
                entity: entity("e2", "DB", "module"),
                ts: now,
            },
            Event::EntityUpsert {
                entity: entity("e3", "Billing", "module"),
                ts: now,
            },
            Event::RelationAdd {
                relation: Relation {
                    id: "r1".to_string(),
                    from_id: "e1".to_string(),
                    to_id: "e2".to_string(),
                    relation_type: "depends_on".to_string(),
                    created_at: now,
                },
                ts: now,
            },
        ];
        fold(GraphState::default(), &events).0
    }

    #[test]
    fn search_matches_name_substring_case_insensitively() {
        let state = sample_state();
        let hits = search(&state, "auth", &SearchOptions::default());
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].entity.name, "Auth");
    }

    #[test]
    fn search_with_neighborhood_includes_touching_relation() {
        let state = sample_state();
        let opts = SearchOptions {
            include_neighborhood: true,
            neighborhood_depth: 1,
            ..SearchOptions::default()
        };
        let hits = search(&state, "Auth", &opts);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].neighbors.len(), 1);
        assert_eq!(hits[0].neighbors[0].name, "DB");
        assert_eq!(hits[0].relations.len(), 1);
    }

    #[test]
    fn search_respects_entity_type_filter() {
        let state = sample_state();
        let opts = SearchOptions {
            entity_types: vec!["pipeline".to_string()],
            ..SearchOptions::default()
        };
        let hits = search(&state, "a", &opts);
        assert!(hits.is_empty());
    }

    #[test]
    fn open_nodes_includes_direct_neighbors_and_relations_between() {
        let state = sample_state();
        let result = open_nodes(&state, &["Auth".to_string()]);
        let names: Vec<_> = result.entities.iter().map(|e| e.name.clone()).collect();
        assert!(names.contains(&"Auth".to_string()));
        assert!(names.contains(&"DB".to_string()));
        assert!(!names.contains(&"Billing".to_string()));
        assert_eq!(result.relations.len(), 1);
    }

    #[test]
    fn open_nodes_silently_drops_unknown_refs() {
        let state = sample_state();
        let result = open_nodes(&state, &["Auth".to_string(), "Nonexistent".to_string()]);
        assert_eq!(result.entities.iter().filter(|e| e.name == "Auth" || e.name == "DB").count(), 2);
    }
}
