//! Structured writers: document edits that insert or rewrite one section
//! while leaving the rest of the document byte-identical.
//!
//! Heading location is done with `pulldown-cmark`'s offset-tracking parser
//! (grounded on the teacher's `commands/export.rs` heading walk); the edit
//! itself is a byte-range splice rather than a whole-document cmark
//! round-trip, because a full re-serialize can reflow unrelated sections —
//! exactly the byte-identical-elsewhere guarantee these writers must hold.
//! `pulldown-cmark-to-cmark` is used narrowly, to render just the rebuilt
//! task bullet list in `update_tasks`.

use crate::document::store::DocumentStore;
use crate::error::{MemoryBankError, Result};
use chrono::{DateTime, Utc};
use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use pulldown_cmark_to_cmark::cmark;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressCategory {
    Feature,
    Fix,
    Refactor,
    Docs,
    Test,
    Chore,
    Other,
}

impl ProgressCategory {
    fn glyph_and_label(self) -> (&'static str, &'static str) {
        match self {
            ProgressCategory::Feature => ("\u{2728}", "Feature"),
            ProgressCategory::Fix => ("\u{1F41B}", "Fix"),
            ProgressCategory::Refactor => ("\u{267B}", "Refactor"),
            ProgressCategory::Docs => ("\u{1F4DD}", "Docs"),
            ProgressCategory::Test => ("\u{2705}", "Test"),
            ProgressCategory::Chore => ("\u{1F527}", "Chore"),
            ProgressCategory::Other => ("\u{2022}", "Other"),
        }
    }
}

impl std::str::FromStr for ProgressCategory {
    type Err = MemoryBankError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "feature" => Ok(ProgressCategory::Feature),
            "fix" => Ok(ProgressCategory::Fix),
            "refactor" => Ok(ProgressCategory::Refactor),
            "docs" => Ok(ProgressCategory::Docs),
            "test" => Ok(ProgressCategory::Test),
            "chore" => Ok(ProgressCategory::Chore),
            "other" => Ok(ProgressCategory::Other),
            other => Err(MemoryBankError::InvalidInput(format!(
                "unrecognized progress category: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AddProgressEntryRequest {
    pub summary: String,
    pub details: Option<String>,
    pub files: Vec<String>,
    pub tags: Vec<String>,
}

/// Inserts a new subsection immediately after `## Update History` in
/// `progress.md`, creating that heading if absent. Returns the entry's
/// stable id.
pub fn add_progress_entry(
    documents: &DocumentStore,
    category: ProgressCategory,
    req: &AddProgressEntryRequest,
) -> Result<String> {
    let (content, etag) = read_or_empty(documents, "progress.md")?;
    let now = Utc::now();
    let id = format!("p_{}_{}", now.format("%Y-%m-%d"), base36_millis(now));
    let (glyph, label) = category.glyph_and_label();

    let mut entry = format!("\n### {glyph} {label} \u{2014} {}\n", req.summary);
    entry.push_str(&format!("<!-- {id} -->\n\n"));
    if let Some(details) = req.details.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        entry.push_str(details);
        entry.push_str("\n\n");
    }
    if !req.files.is_empty() {
        entry.push_str(&format!("**Files:** {}\n\n", req.files.join(", ")));
    }
    if !req.tags.is_empty() {
        entry.push_str(&format!("**Tags:** {}\n\n", req.tags.join(", ")));
    }

    let updated = insert_after_heading(&content, "Update History", &entry);
    documents.write("progress.md", updated.as_bytes(), Some(&etag))?;
    Ok(id)
}

#[derive(Debug, Clone, Default)]
pub struct AddSessionNoteRequest {
    pub note: String,
    pub category: Option<String>,
}

/// Inserts `- [HH:MM AM/PM] <glyph?> <note>` at the top of `## Session
/// Notes`, creating that heading if absent.
pub fn add_session_note(documents: &DocumentStore, req: &AddSessionNoteRequest) -> Result<()> {
    let (content, etag) = read_or_empty(documents, "active-context.md")?;
    let now = Utc::now();
    let time = now.format("%I:%M %p");
    let line = match req.category.as_deref() {
        Some(category) => format!("\n- [{time}] {} {}\n", session_note_glyph(category), req.note),
        None => format!("\n- [{time}] {}\n", req.note),
    };

    let updated = insert_after_heading(&content, "Session Notes", &line);
    documents.write("active-context.md", updated.as_bytes(), Some(&etag))?;
    Ok(())
}

fn session_note_glyph(category: &str) -> &'static str {
    match category.to_lowercase().as_str() {
        "blocker" => "\u{1F6A7}",
        "decision" => "\u{1F9ED}",
        "question" => "\u{2753}",
        "milestone" => "\u{1F3C1}",
        _ => "\u{2022}",
    }
}

#[derive(Debug, Clone, Default)]
pub struct UpdateTasksRequest {
    pub add: Vec<String>,
    pub remove: Vec<String>,
    pub replace: Option<Vec<String>>,
}

/// Candidate heading names for the task list, tried in order. The template
/// shipped by `document::templates` uses "Ongoing Tasks"; "Tasks" and
/// "Current Tasks" are accepted too so a document authored by hand under
/// either name is still found.
const TASK_HEADINGS: [&str; 3] = ["Tasks", "Current Tasks", "Ongoing Tasks"];

/// Applies add/remove/replace semantics to the bulleted list under the
/// task heading, rewriting just that section. Returns the resulting list.
pub fn update_tasks(documents: &DocumentStore, req: &UpdateTasksRequest) -> Result<Vec<String>> {
    let (content, etag) = read_or_empty(documents, "active-context.md")?;
    let heading = resolve_task_heading(&content);

    let mut tasks = section_bounds(&content, heading)
        .map(|(start, end)| parse_bullets(&content[start..end]))
        .unwrap_or_default();

    if let Some(replacement) = &req.replace {
        tasks = replacement.clone();
    } else {
        for item in &req.remove {
            let needle = item.to_lowercase();
            tasks.retain(|t| !t.to_lowercase().contains(&needle));
        }
        for item in &req.add {
            let lower = item.to_lowercase();
            if !tasks.iter().any(|t| t.to_lowercase() == lower) {
                tasks.push(item.clone());
            }
        }
    }

    let body = render_bullet_list(&tasks);
    let updated = replace_section_body(&content, heading, &body);
    documents.write("active-context.md", updated.as_bytes(), Some(&etag))?;
    Ok(tasks)
}

fn resolve_task_heading(content: &str) -> &'static str {
    TASK_HEADINGS
        .iter()
        .find(|h| section_bounds(content, h).is_some())
        .copied()
        .unwrap_or("Ongoing Tasks")
}

fn parse_bullets(section: &str) -> Vec<String> {
    section
        .lines()
        .filter_map(|line| {
            let trimmed = line.trim();
            trimmed.strip_prefix("- ").or_else(|| trimmed.strip_prefix("* "))
        })
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn render_bullet_list(tasks: &[String]) -> String {
    if tasks.is_empty() {
        return "\n".to_string();
    }

    let mut events = Vec::new();
    events.push(Event::Start(Tag::List(None)));
    for task in tasks {
        events.push(Event::Start(Tag::Item));
        events.push(Event::Text(task.clone().into()));
        events.push(Event::End(TagEnd::Item));
    }
    events.push(Event::End(TagEnd::List(false)));

    let mut out = String::new();
    cmark(events.iter(), &mut out).expect("cmark serialization of task list failed");
    out.push_str("\n\n");
    out
}

fn read_or_empty(documents: &DocumentStore, filename: &str) -> Result<(String, String)> {
    match documents.read_string(filename) {
        Ok(pair) => Ok(pair),
        Err(MemoryBankError::FileNotFound(_)) => Ok((String::new(), crate::fingerprint::etag(&[]))),
        Err(e) => Err(e),
    }
}

fn base36_millis(now: DateTime<Utc>) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut n = now.timestamp_millis().max(0) as u128;
    if n == 0 {
        return "0".to_string();
    }
    let mut buf = Vec::new();
    while n > 0 {
        buf.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    buf.reverse();
    String::from_utf8(buf).expect("base36 digits are ASCII")
}

/// Returns `(body_start, body_end)`: the byte span from the end of
/// `heading_text`'s line to the start of the next heading (any level), or
/// `None` if no heading with that text exists.
fn section_bounds(content: &str, heading_text: &str) -> Option<(usize, usize)> {
    let parser = Parser::new_ext(content, Options::empty()).into_offset_iter();

    let mut headings: Vec<(HeadingLevel, String, usize, usize)> = Vec::new();
    let mut active_title = String::new();
    let mut active = false;
    let mut heading_start = 0usize;
    let mut active_level = HeadingLevel::H1;

    for (event, range) in parser {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                active = true;
                active_level = level;
                active_title.clear();
                heading_start = range.start;
            }
            Event::Text(t) | Event::Code(t) if active => active_title.push_str(&t),
            Event::End(TagEnd::Heading(_)) => {
                active = false;
                let mut end = range.end;
                if let Some(rel) = content[end..].find('\n') {
                    end += rel + 1;
                } else {
                    end = content.len();
                }
                headings.push((active_level, active_title.clone(), end, heading_start));
            }
            _ => {}
        }
    }

    for (i, (_, title, body_start, _)) in headings.iter().enumerate() {
        if title.trim().eq_ignore_ascii_case(heading_text) {
            let body_end = headings
                .get(i + 1)
                .map(|(_, _, _, next_heading_start)| *next_heading_start)
                .unwrap_or(content.len());
            return Some((*body_start, body_end));
        }
    }
    None
}

fn splice(content: &str, start: usize, end: usize, insertion: &str) -> String {
    let mut out = String::with_capacity(content.len() + insertion.len());
    out.push_str(&content[..start]);
    out.push_str(insertion);
    out.push_str(&content[end..]);
    out
}

fn append_new_heading(content: &str, heading_text: &str, body: &str) -> String {
    let mut out = content.to_string();
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    if !out.is_empty() {
        out.push('\n');
    }
    out.push_str(&format!("## {heading_text}\n"));
    out.push_str(body);
    out
}

fn insert_after_heading(content: &str, heading_text: &str, insertion: &str) -> String {
    match section_bounds(content, heading_text) {
        Some((body_start, _)) => splice(content, body_start, body_start, insertion),
        None => append_new_heading(content, heading_text, insertion),
    }
}

fn replace_section_body(content: &str, heading_text: &str, new_body: &str) -> String {
    match section_bounds(content, heading_text) {
        Some((start, end)) => splice(content, start, end, new_body),
        None => append_new_heading(content, heading_text, new_body),
    }
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
    fn add_progress_entry_inserts_after_update_history_heading() {
        let dir = tempdir().unwrap();
        let store = store_with(dir.path());
        store
            .write("progress.md", b"# Progress\n\n## Update History\n\n### Older entry\n", None)
            .unwrap();

        let id = add_progress_entry(
            &store,
            ProgressCategory::Feature,
            &AddProgressEntryRequest {
                summary: "Ship JWT rollout".to_string(),
                details: None,
                files: vec!["src/auth.rs".to_string()],
                tags: vec!["auth".to_string()],
            },
        )
        .unwrap();

        assert!(id.starts_with("p_"));
        let (content, _) = store.read_string("progress.md").unwrap();
        assert!(content.contains("Ship JWT rollout"));
        assert!(content.contains(&format!("<!-- {id} -->")));
        let update_idx = content.find("## Update History").unwrap();
        let new_entry_idx = content.find("Ship JWT rollout").unwrap();
        let older_idx = content.find("Older entry").unwrap();
        assert!(update_idx < new_entry_idx);
        assert!(new_entry_idx < older_idx, "new entry inserted before older ones");
    }

    #[test]
    fn add_progress_entry_creates_heading_when_absent() {
        let dir = tempdir().unwrap();
        let store = store_with(dir.path());
        store.write("progress.md", b"# Progress\n", None).unwrap();

        add_progress_entry(
            &store,
            ProgressCategory::Fix,
            &AddProgressEntryRequest {
                summary: "Patch retry bug".to_string(),
                ..Default::default()
            },
        )
        .unwrap();

        let (content, _) = store.read_string("progress.md").unwrap();
        assert!(content.contains("## Update History"));
        assert!(content.contains("Patch retry bug"));
    }

    #[test]
    fn add_session_note_leaves_other_sections_byte_identical() {
        let dir = tempdir().unwrap();
        let store = store_with(dir.path());
        let original = "# Active Context\n\n\
            ## Session Notes\n\n\
            ## Ongoing Tasks\n\n- Task one\n- Task two\n";
        store.write("active-context.md", original.as_bytes(), None).unwrap();

        add_session_note(
            &store,
            &AddSessionNoteRequest {
                note: "Blocked on X".to_string(),
                category: Some("blocker".to_string()),
            },
        )
        .unwrap();

        let (content, _) = store.read_string("active-context.md").unwrap();
        assert!(content.contains("Blocked on X"));
        assert!(content.contains("## Ongoing Tasks\n\n- Task one\n- Task two\n"));
    }

    #[test]
    fn update_tasks_adds_removes_and_dedupes_case_insensitively() {
        let dir = tempdir().unwrap();
        let store = store_with(dir.path());
        store
            .write(
                "active-context.md",
                b"# Active Context\n\n## Ongoing Tasks\n\n- Ship auth\n- Write docs\n",
                None,
            )
            .unwrap();

        let tasks = update_tasks(
            &store,
            &UpdateTasksRequest {
                add: vec!["SHIP AUTH".to_string(), "Add tests".to_string()],
                remove: vec!["docs".to_string()],
                replace: None,
            },
        )
        .unwrap();

        assert_eq!(tasks, vec!["Ship auth".to_string(), "Add tests".to_string()]);
    }

    #[test]
    fn update_tasks_replace_overwrites_whole_list() {
        let dir = tempdir().unwrap();
        let store = store_with(dir.path());
        store
            .write(
                "active-context.md",
                b"# Active Context\n\n## Ongoing Tasks\n\n- Old one\n",
                None,
            )
            .unwrap();

        let tasks = update_tasks(
            &store,
            &UpdateTasksRequest {
                add: Vec::new(),
                remove: Vec::new(),
                replace: Some(vec!["Brand new task".to_string()]),
            },
        )
        .unwrap();

        assert_eq!(tasks, vec!["Brand new task".to_string()]);
        let (content, _) = store.read_string("active-context.md").unwrap();
        assert!(!content.contains("Old one"));
    }
}
