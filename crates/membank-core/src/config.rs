//! Layered configuration: environment variables override `membank.toml`,
//! which overrides compiled defaults.
//!
//! Grounded directly on the teacher's `padzapp::config::PadzConfig`
//! (`confique::Config` derive, `#[config(default = ...)]` fields, explicit
//! accessor/resolution methods alongside the raw struct). The teacher loads
//! through its own `clapfig` wrapper; this crate calls confique's builder
//! directly instead, since clapfig brings nothing beyond what
//! `Config::builder().env().file(..).load()` already does for a single
//! config struct with no CLI-argument layer of its own.

use confique::Config;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MemoryBankConfig {
    /// Default store root when a caller passes a bare store id instead of
    /// an absolute path. Unset resolves via the OS data directory.
    pub store_root: Option<PathBuf>,

    /// Default `maxProgressEntries` for `context_digest` when the caller
    /// omits it.
    #[config(default = 10)]
    pub max_progress_entries: usize,

    /// Default `maxDecisions` for `context_digest` when the caller omits it.
    #[config(default = 5)]
    pub max_decisions: usize,

    /// Default `includeSystemPatterns` for `context_digest`.
    #[config(default = false)]
    pub include_system_patterns: bool,

    /// Backups kept per store before the oldest become eligible for
    /// pruning. A retention hint only; nothing prunes automatically.
    #[config(default = 10)]
    pub backup_retention: usize,
}

impl Default for MemoryBankConfig {
    fn default() -> Self {
        Self {
            store_root: None,
            max_progress_entries: 10,
            max_decisions: 5,
            include_system_patterns: false,
            backup_retention: 10,
        }
    }
}

impl MemoryBankConfig {
    /// Resolves a relative or bare store identifier against `store_root`
    /// (or the OS data directory when unset). Absolute paths pass through.
    pub fn resolve_store_path(&self, id_or_path: &str) -> PathBuf {
        let candidate = PathBuf::from(id_or_path);
        if candidate.is_absolute() {
            return candidate;
        }
        let base = self.store_root.clone().unwrap_or_else(default_store_root);
        base.join(candidate)
    }
}

/// Loads config from environment variables (`MEMBANK__*`) layered over an
/// optional TOML file, falling back to compiled defaults when neither
/// source is present or the file doesn't parse.
pub fn load(config_file: Option<&Path>) -> MemoryBankConfig {
    let mut builder = MemoryBankConfig::builder().env();
    if let Some(path) = config_file {
        builder = builder.file(path);
    }
    builder.load().unwrap_or_default()
}

/// OS-appropriate default data directory for stores with no explicit root,
/// via the teacher's `directories` dependency.
pub fn default_store_root() -> PathBuf {
    ProjectDirs::from("", "", "membank")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".membank"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_spec_defaults() {
        let config = MemoryBankConfig::default();
        assert_eq!(config.max_progress_entries, 10);
        assert_eq!(config.max_decisions, 5);
        assert!(!config.include_system_patterns);
    }

    #[test]
    fn resolve_store_path_passes_through_absolute_paths() {
        let config = MemoryBankConfig::default();
        let resolved = config.resolve_store_path("/tmp/my-store");
        assert_eq!(resolved, PathBuf::from("/tmp/my-store"));
    }

    #[test]
    fn resolve_store_path_joins_relative_ids_under_store_root() {
        let config = MemoryBankConfig {
            store_root: Some(PathBuf::from("/data/stores")),
            ..MemoryBankConfig::default()
        };
        assert_eq!(
            config.resolve_store_path("proj-a"),
            PathBuf::from("/data/stores/proj-a")
        );
    }

    #[test]
    fn load_falls_back_to_defaults_when_no_file_given() {
        let config = load(None);
        assert_eq!(config, MemoryBankConfig::default());
    }
}
