//! The append-only NDJSON event log: `graph/graph.jsonl`.
//!
//! Grounded on the teacher's atomic-write discipline (`paths::write_atomic`),
//! adapted for append semantics since a log's whole point is to grow without
//! rewriting prior lines — only compaction (`graph::store`) rewrites it, and
//! that rewrite still goes through `write_atomic`.

use super::event::{Event, Marker};
use crate::error::{MemoryBankError, Result};
use crate::paths::append_bytes;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

pub struct EventLog {
    path: PathBuf,
}

/// Count of log lines that failed to parse as JSON during a read, kept for
/// diagnostics. Per spec §4.4/§7: skipped, never surfaced as an error.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplayWarnings {
    pub skipped_lines: usize,
}

impl EventLog {
    /// Opens the log at `path`, creating it with a fresh marker if absent.
    /// If it exists, validates the first line is a matching marker.
    pub fn open_or_create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            let marker = Marker::current();
            let line = serde_json::to_string(&marker).map_err(MemoryBankError::Serialization)?;
            append_bytes(&path, format!("{line}\n").as_bytes())?;
            return Ok(Self { path });
        }

        let marker = read_first_line_marker(&path)?;
        marker.validate()?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, event: &Event) -> Result<()> {
        let line = serde_json::to_string(event).map_err(MemoryBankError::Serialization)?;
        append_bytes(&self.path, format!("{line}\n").as_bytes())
    }

    /// Total number of lines in the log, including the marker line.
    pub fn line_count(&self) -> Result<usize> {
        let file = fs::File::open(&self.path).map_err(MemoryBankError::Io)?;
        Ok(BufReader::new(file).lines().count())
    }

    /// Parses every data event after the marker line. Lines that fail to
    /// parse are skipped and counted rather than aborting replay.
    pub fn read_all(&self) -> Result<(Vec<Event>, ReplayWarnings)> {
        self.read_tail(1)
    }

    /// Returns data events from 0-based line index `from_line` onward
    /// (line 0 is always the marker, so `from_line` is normally >= 1).
    pub fn read_tail(&self, from_line: usize) -> Result<(Vec<Event>, ReplayWarnings)> {
        let file = fs::File::open(&self.path).map_err(MemoryBankError::Io)?;
        let mut events = Vec::new();
        let mut warnings = ReplayWarnings::default();

        for (idx, line) in BufReader::new(file).lines().enumerate() {
            if idx < from_line {
                continue;
            }
            let line = line.map_err(MemoryBankError::Io)?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Event>(&line) {
                Ok(event) => events.push(event),
                Err(e) => {
                    tracing::warn!(line = idx, error = %e, "skipping unparseable log line");
                    warnings.skipped_lines += 1;
                }
            }
        }

        Ok((events, warnings))
    }
}

fn read_first_line_marker(path: &Path) -> Result<Marker> {
    let file = fs::File::open(path).map_err(MemoryBankError::Io)?;
    let mut lines = BufReader::new(file).lines();
    let first = lines
        .next()
        .ok_or_else(|| MemoryBankError::MarkerMismatch("log file is empty".to_string()))?
        .map_err(MemoryBankError::Io)?;
    serde_json::from_str::<Marker>(&first)
        .map_err(|e| MemoryBankError::MarkerMismatch(format!("first line is not a marker: {e}")))
}
