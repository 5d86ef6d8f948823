//! `membank`: a thin binary over `membank-core`, one subcommand per tool
//! operation from the tool surface this crate's `membank-core` implements.
//!
//! The binary is intentionally thin, the way `padz`'s `main.rs` only
//! invokes `cli::run()`: this file parses arguments, calls straight into
//! `membank_core`, and prints JSON. No business logic lives here.

use base64::Engine;
use clap::{Parser, Subcommand};
use membank_core::graph::{ObservationSource, SearchOptions};
use membank_core::{
    AddProgressEntryRequest, AddSessionNoteRequest, DigestOptions, MemoryBank, ProgressCategory,
    UpdateTasksRequest,
};
use serde_json::json;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Parser, Debug)]
#[command(name = "membank", bin_name = "membank", about = "Inspect and poke a membank-core project-memory store", long_about = None)]
struct Cli {
    /// Path to the store directory (created if absent).
    #[arg(short, long, global = true, value_name = "PATH", default_value = ".")]
    store: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the store directory and its core documents if absent.
    Init,
    /// Print which core documents exist and the graph's size.
    Status,
    /// Read one document's content and ETag.
    Read { filename: String },
    /// Write a document's content, optionally gated by an ETag precondition.
    Write {
        filename: String,
        content: String,
        #[arg(long)]
        if_match: Option<String>,
    },
    /// List every document in the store root.
    List,
    /// All five core documents' content and ETags in one call.
    Bundle,
    /// Linear substring search across documents.
    SearchDocs {
        query: String,
        #[arg(long)]
        case_sensitive: bool,
        #[arg(long, default_value_t = 20)]
        max_results: usize,
    },
    /// Synthesized active-context/progress/decision-log/graph summary.
    Digest {
        #[arg(long, default_value_t = 10)]
        max_progress_entries: usize,
        #[arg(long, default_value_t = 5)]
        max_decisions: usize,
        #[arg(long)]
        include_system_patterns: bool,
    },
    /// Append a dated subsection to `progress.md`.
    AddProgressEntry {
        category: String,
        summary: String,
        #[arg(long)]
        details: Option<String>,
        #[arg(long = "file")]
        files: Vec<String>,
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// Append a timestamped bullet under `## Session Notes`.
    AddSessionNote {
        note: String,
        #[arg(long)]
        category: Option<String>,
    },
    /// Add/remove/replace bullets under the active task-list heading.
    UpdateTasks {
        #[arg(long = "add")]
        add: Vec<String>,
        #[arg(long = "remove")]
        remove: Vec<String>,
        #[arg(long)]
        replace: Option<Vec<String>>,
    },
    /// Rename legacy camelCase document filenames to kebab-case.
    MigrateFileNaming,
    /// Copy the store directory under `backups/`.
    CreateBackup,
    /// List backup ids, newest first.
    ListBackups,
    /// Restore the store from a named backup.
    RestoreBackup {
        backup_id: String,
        /// Skip taking a backup of the current state before restoring.
        #[arg(long)]
        no_pre_restore_backup: bool,
    },
    /// Upsert a graph entity by name.
    GraphUpsertEntity {
        name: String,
        entity_type: String,
    },
    /// Attach a free-form observation to an entity.
    GraphAddObservation {
        entity: String,
        text: String,
        #[arg(long)]
        source: Option<String>,
    },
    /// Record an entity's pointer to a document (and optional heading).
    GraphAddDocPointer {
        entity: String,
        filename: String,
        #[arg(long)]
        heading: Option<String>,
    },
    /// Link two entities with a directed, typed relation.
    GraphLinkEntities {
        from: String,
        to: String,
        relation_type: String,
    },
    /// Remove a relation between two entities.
    GraphUnlinkEntities {
        from: String,
        to: String,
        relation_type: String,
    },
    /// Delete an entity and cascade its observations/relations.
    GraphDeleteEntity { entity: String },
    /// Delete a single observation from an entity.
    GraphDeleteObservation {
        entity: String,
        observation_id: String,
    },
    /// Substring search over entities, with optional neighborhood expansion.
    GraphSearch {
        query: String,
        #[arg(long, default_value_t = 50)]
        limit: usize,
        #[arg(long)]
        include_neighborhood: bool,
        #[arg(long, default_value_t = 1)]
        neighborhood_depth: u8,
    },
    /// Resolve refs (id or name) to entities, their neighbors, and relations.
    GraphOpenNodes { refs: Vec<String> },
    /// Entity/observation/relation counts and distinct-type lists.
    GraphStats,
    /// Rewrite the graph log to one record per live entity/observation/relation.
    GraphCompact,
    /// Rebuild the in-memory index from the persisted log/snapshot.
    GraphRebuild,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("{}", json!({ "error": true, "code": e.code(), "message": e.to_string() }));
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> membank_core::Result<()> {
    let bank = MemoryBank::initialize(&cli.store)?;

    match cli.command {
        Commands::Init => {
            println!("{}", json!({ "initialized": bank.documents().layout().root() }));
        }
        Commands::Status => {
            let status = bank.status()?;
            println!(
                "{}",
                json!({
                    "storeId": status.store_id,
                    "documentsPresent": status.documents_present,
                    "graphStats": status.graph_stats,
                })
            );
        }
        Commands::Read { filename } => {
            let (bytes, etag) = bank.documents().read(&filename)?;
            print_file(&filename, &bytes, &etag);
        }
        Commands::Write { filename, content, if_match } => {
            let etag = bank
                .documents()
                .write(&filename, content.as_bytes(), if_match.as_deref())?;
            println!("{}", json!({ "filename": filename, "etag": etag }));
        }
        Commands::List => {
            println!("{}", json!(bank.documents().list()?));
        }
        Commands::Bundle => {
            let bundle = bank.context_bundle();
            let rendered: serde_json::Map<String, serde_json::Value> = bundle
                .into_iter()
                .map(|(name, (bytes, etag))| (name, file_json(&bytes, &etag)))
                .collect();
            println!("{}", serde_json::Value::Object(rendered));
        }
        Commands::SearchDocs { query, case_sensitive, max_results } => {
            let hits = bank
                .documents()
                .search(&query, &[], max_results, case_sensitive)?;
            println!("{}", json!(hits));
        }
        Commands::Digest { max_progress_entries, max_decisions, include_system_patterns } => {
            let opts = DigestOptions {
                max_progress_entries,
                max_decisions,
                include_system_patterns,
            };
            println!("{}", json!(bank.context_digest(&opts)));
        }
        Commands::AddProgressEntry { category, summary, details, files, tags } => {
            let category = ProgressCategory::from_str(&category).map_err(|_| {
                membank_core::MemoryBankError::InvalidInput(format!(
                    "unknown progress category: {category}"
                ))
            })?;
            let id = membank_core::add_progress_entry(
                bank.documents(),
                category,
                &AddProgressEntryRequest { summary, details, files, tags },
            )?;
            println!("{}", json!({ "id": id }));
        }
        Commands::AddSessionNote { note, category } => {
            membank_core::add_session_note(
                bank.documents(),
                &AddSessionNoteRequest { note, category },
            )?;
            println!("{}", json!({ "ok": true }));
        }
        Commands::UpdateTasks { add, remove, replace } => {
            let tasks = membank_core::update_tasks(
                bank.documents(),
                &UpdateTasksRequest { add, remove, replace },
            )?;
            println!("{}", json!(tasks));
        }
        Commands::MigrateFileNaming => {
            println!("{}", json!(bank.documents().migrate_file_naming()?));
        }
        Commands::CreateBackup => {
            println!("{}", json!({ "backupId": bank.create_backup()? }));
        }
        Commands::ListBackups => {
            println!("{}", json!(bank.list_backups()?));
        }
        Commands::RestoreBackup { backup_id, no_pre_restore_backup } => {
            let outcome = bank.restore_backup(&backup_id, !no_pre_restore_backup)?;
            println!(
                "{}",
                json!({
                    "restoredFiles": outcome.restored_files,
                    "preRestoreBackupId": outcome.pre_restore_backup_id,
                })
            );
        }
        Commands::GraphUpsertEntity { name, entity_type } => {
            let entity = bank.graph().upsert_entity(&name, &entity_type, None)?;
            println!("{}", json!(entity));
        }
        Commands::GraphAddObservation { entity, text, source } => {
            let source = source.as_deref().map(parse_observation_source).transpose()?;
            let observation = bank.graph().add_observation(&entity, &text, source)?;
            println!("{}", json!(observation));
        }
        Commands::GraphAddDocPointer { entity, filename, heading } => {
            let observation = bank.graph().add_doc_pointer(&entity, &filename, heading.as_deref())?;
            println!("{}", json!(observation));
        }
        Commands::GraphLinkEntities { from, to, relation_type } => {
            let relation = bank.graph().link_entities(&from, &to, &relation_type)?;
            println!("{}", json!(relation));
        }
        Commands::GraphUnlinkEntities { from, to, relation_type } => {
            bank.graph().unlink_entities(&from, &to, &relation_type)?;
            println!("{}", json!({ "ok": true }));
        }
        Commands::GraphDeleteEntity { entity } => {
            let deleted = bank.graph().delete_entity(&entity)?;
            println!("{}", json!(deleted));
        }
        Commands::GraphDeleteObservation { entity, observation_id } => {
            bank.graph().delete_observation(&entity, &observation_id)?;
            println!("{}", json!({ "ok": true }));
        }
        Commands::GraphSearch { query, limit, include_neighborhood, neighborhood_depth } => {
            let opts = SearchOptions {
                limit,
                include_neighborhood,
                neighborhood_depth,
                ..SearchOptions::default()
            };
            let hits = bank.graph().search(&query, &opts);
            println!("{}", json!(hits.iter().map(search_hit_json).collect::<Vec<_>>()));
        }
        Commands::GraphOpenNodes { refs } => {
            let result = bank.graph().open_nodes(&refs);
            println!("{}", json!({ "entities": result.entities, "relations": result.relations }));
        }
        Commands::GraphStats => {
            println!("{}", json!(bank.graph().stats()));
        }
        Commands::GraphCompact => {
            bank.graph().compact()?;
            println!("{}", json!({ "ok": true }));
        }
        Commands::GraphRebuild => {
            bank.graph().rebuild()?;
            println!("{}", json!({ "ok": true }));
        }
    }

    Ok(())
}

fn print_file(filename: &str, bytes: &[u8], etag: &str) {
    let mut value = file_json(bytes, etag);
    value["filename"] = json!(filename);
    println!("{}", value);
}

fn file_json(bytes: &[u8], etag: &str) -> serde_json::Value {
    match std::str::from_utf8(bytes) {
        Ok(text) => json!({ "content": text, "etag": etag }),
        Err(_) => json!({
            "contentBase64": base64::engine::general_purpose::STANDARD.encode(bytes),
            "etag": etag,
        }),
    }
}

fn search_hit_json(hit: &membank_core::graph::SearchHit) -> serde_json::Value {
    json!({
        "entity": hit.entity,
        "neighbors": hit.neighbors,
        "relations": hit.relations,
    })
}

fn parse_observation_source(s: &str) -> membank_core::Result<ObservationSource> {
    match s.to_lowercase().as_str() {
        "manual" => Ok(ObservationSource::Manual),
        "tool" => Ok(ObservationSource::Tool),
        "import" => Ok(ObservationSource::Import),
        "agent" => Ok(ObservationSource::Agent),
        other => Err(membank_core::MemoryBankError::InvalidInput(format!(
            "unknown observation source: {other}"
        ))),
    }
}
