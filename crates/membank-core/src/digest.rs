//! Context digest: a compact synthesis of the active-context, progress, and
//! decision-log documents plus a graph summary, for handing a fresh agent
//! session just enough state to continue working.
//!
//! Grounded on the teacher's markdown-section-scanning style in
//! `commands/export.rs::bump_markdown_headers` (walking `pulldown-cmark`'s
//! `Tag::Heading` stream), here used to locate a heading's body rather than
//! rewrite it.

use crate::document::store::DocumentStore;
use crate::graph::GraphStore;
use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct DigestOptions {
    pub max_progress_entries: usize,
    pub max_decisions: usize,
    pub include_system_patterns: bool,
}

impl Default for DigestOptions {
    fn default() -> Self {
        Self {
            max_progress_entries: 10,
            max_decisions: 5,
            include_system_patterns: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DecisionEntry {
    pub title: String,
    pub date: Option<String>,
    pub decision: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContextDigest {
    pub project_state: Option<String>,
    pub ongoing_tasks: Vec<String>,
    pub known_issues: Vec<String>,
    pub next_steps: Vec<String>,
    pub recent_progress: Vec<String>,
    pub recent_decisions: Vec<DecisionEntry>,
    pub system_patterns_excerpt: Option<String>,
    pub graph_summary: Option<String>,
}

/// Composes a digest from whatever documents happen to exist. A missing
/// document is simply omitted, never an error (spec requirement).
pub fn context_digest(
    documents: &DocumentStore,
    graph: Option<&GraphStore>,
    opts: &DigestOptions,
) -> ContextDigest {
    let mut digest = ContextDigest::default();

    if let Ok((active, _)) = documents.read_string("active-context.md") {
        let sections = markdown_sections(&active);
        digest.project_state = section_first_line(&sections, "Current Project State");
        digest.ongoing_tasks = section_bullets(&sections, "Ongoing Tasks");
        digest.known_issues = section_bullets(&sections, "Known Issues");
        digest.next_steps = section_bullets(&sections, "Next Steps");
    }

    if let Ok((progress, _)) = documents.read_string("progress.md") {
        digest.recent_progress = progress
            .lines()
            .filter(|line| is_dated_progress_line(line))
            .take(opts.max_progress_entries)
            .map(|line| line.to_string())
            .collect();
    }

    if let Ok((decision_log, _)) = documents.read_string("decision-log.md") {
        let sections = markdown_sections(&decision_log);
        digest.recent_decisions = sections
            .into_iter()
            .filter(|(level, title, _)| *level == HeadingLevel::H2 && !title.trim().is_empty())
            .take(opts.max_decisions)
            .map(|(_, title, content)| DecisionEntry {
                title: title.trim().to_string(),
                date: extract_field(&content, "**Date:**"),
                decision: extract_field(&content, "**Decision:**"),
            })
            .collect();
    }

    if opts.include_system_patterns {
        if let Ok((patterns, _)) = documents.read_string("system-patterns.md") {
            digest.system_patterns_excerpt =
                Some(patterns.lines().take(20).collect::<Vec<_>>().join("\n"));
        }
    }

    if let Some(graph) = graph {
        digest.graph_summary = Some(graph_summary(graph));
    }

    digest
}

fn graph_summary(graph: &GraphStore) -> String {
    let stats = graph.stats();
    let snapshot = graph.snapshot();
    let mut recent: Vec<_> = snapshot.entities.iter().collect();
    recent.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    let recent_names: Vec<String> = recent.into_iter().take(5).map(|e| e.name.clone()).collect();

    format!(
        "{} entities, {} observations, {} relations; types: {}; recent: {}",
        stats.entity_count,
        stats.observation_count,
        stats.relation_count,
        stats.entity_types.join(", "),
        recent_names.join(", ")
    )
}

fn is_dated_progress_line(line: &str) -> bool {
    line.trim_start()
        .strip_prefix("- [")
        .and_then(|rest| rest.chars().next())
        .map(|c| c.is_ascii_digit())
        .unwrap_or(false)
}

fn extract_field(content: &str, prefix: &str) -> Option<String> {
    content.lines().find_map(|line| {
        line.trim_start()
            .strip_prefix(prefix)
            .map(|rest| rest.trim().to_string())
    })
}

/// Walks the heading stream of `markdown`, returning `(level, title, body)`
/// triples where `body` spans from the end of this heading to the start of
/// the next one (any level).
fn markdown_sections(markdown: &str) -> Vec<(HeadingLevel, String, String)> {
    let parser = Parser::new_ext(markdown, Options::empty()).into_offset_iter();

    let mut markers: Vec<(HeadingLevel, String, usize, usize)> = Vec::new();
    let mut heading_level: Option<HeadingLevel> = None;
    let mut heading_title = String::new();
    let mut heading_start = 0usize;

    for (event, range) in parser {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                heading_level = Some(level);
                heading_title.clear();
                heading_start = range.start;
            }
            Event::Text(text) | Event::Code(text) if heading_level.is_some() => {
                heading_title.push_str(&text);
            }
            Event::End(TagEnd::Heading(level)) => {
                markers.push((level, heading_title.clone(), range.end, heading_start));
                heading_level = None;
            }
            _ => {}
        }
    }

    let mut sections = Vec::with_capacity(markers.len());
    for (i, (level, title, content_start, _)) in markers.iter().enumerate() {
        let content_end = markers
            .get(i + 1)
            .map(|(_, _, _, next_start)| *next_start)
            .unwrap_or(markdown.len());
        let content = markdown[*content_start..content_end].to_string();
        sections.push((*level, title.clone(), content));
    }
    sections
}

fn section_first_line(sections: &[(HeadingLevel, String, String)], heading: &str) -> Option<String> {
    sections
        .iter()
        .find(|(_, title, _)| title.trim().eq_ignore_ascii_case(heading))
        .and_then(|(_, _, content)| content.lines().map(str::trim).find(|l| !l.is_empty()))
        .map(|s| s.to_string())
}

fn section_bullets(sections: &[(HeadingLevel, String, String)], heading: &str) -> Vec<String> {
    sections
        .iter()
        .find(|(_, title, _)| title.trim().eq_ignore_ascii_case(heading))
        .map(|(_, _, content)| {
            content
                .lines()
                .filter_map(|line| {
                    let trimmed = line.trim();
                    trimmed.strip_prefix("- ").or_else(|| trimmed.strip_prefix("* "))
                })
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::StoreLayout;
    use tempfile::tempdir;

    fn store_with(dir: &std::path::Path) -> DocumentStore {
        let layout = StoreLayout::new(dir).unwrap();
        DocumentStore::new(layout)
    }

    #[test]
    fn digest_extracts_project_state_and_task_bullets() {
        let dir = tempdir().unwrap();
        let store = store_with(dir.path());
        let active = "# Active Context\n\n\
            ## Current Project State\n\nMigrating auth to JWT.\n\n\
            ## Ongoing Tasks\n\n- Ship the migration\n- Write tests\n\n\
            ## Known Issues\n\n- Rate limiter is flaky\n\n\
            ## Next Steps\n\n- Deploy to staging\n";
        store.write("active-context.md", active.as_bytes(), None).unwrap();

        let digest = context_digest(&store, None, &DigestOptions::default());
        assert_eq!(digest.project_state.as_deref(), Some("Migrating auth to JWT."));
        assert_eq!(digest.ongoing_tasks, vec!["Ship the migration", "Write tests"]);
        assert_eq!(digest.known_issues, vec!["Rate limiter is flaky"]);
        assert_eq!(digest.next_steps, vec!["Deploy to staging"]);
    }

    #[test]
    fn digest_caps_recent_progress_at_max_entries() {
        let dir = tempdir().unwrap();
        let store = store_with(dir.path());
        let progress = "# Progress\n\n## Update History\n\n\
            - [2026-01-01] first\n- [2026-01-02] second\n- [2026-01-03] third\nnot a progress line\n";
        store.write("progress.md", progress.as_bytes(), None).unwrap();

        let opts = DigestOptions {
            max_progress_entries: 2,
            ..DigestOptions::default()
        };
        let digest = context_digest(&store, None, &opts);
        assert_eq!(digest.recent_progress.len(), 2);
        assert!(digest.recent_progress[0].contains("first"));
    }

    #[test]
    fn digest_extracts_decisions_with_date_and_decision_fields() {
        let dir = tempdir().unwrap();
        let store = store_with(dir.path());
        let log = "# Decision Log\n\n\
            ## Use Postgres\n\n**Date:** 2026-02-01\n\n**Decision:** adopt Postgres over SQLite\n\n\
            ## Drop gRPC\n\n**Decision:** stick with REST\n";
        store.write("decision-log.md", log.as_bytes(), None).unwrap();

        let digest = context_digest(&store, None, &DigestOptions::default());
        assert_eq!(digest.recent_decisions.len(), 2);
        assert_eq!(digest.recent_decisions[0].title, "Use Postgres");
        assert_eq!(digest.recent_decisions[0].date.as_deref(), Some("2026-02-01"));
        assert_eq!(
            digest.recent_decisions[0].decision.as_deref(),
            Some("adopt Postgres over SQLite")
        );
        assert_eq!(digest.recent_decisions[1].date, None);
    }

    #[test]
    fn digest_omits_missing_documents_without_failing() {
        let dir = tempdir().unwrap();
        let store = store_with(dir.path());
        let digest = context_digest(&store, None, &DigestOptions::default());
        assert_eq!(digest, ContextDigest::default());
    }
}
