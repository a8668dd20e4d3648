use std::{
    env,
    fs::{self, File, OpenOptions},
    io::{self, BufRead, BufReader, Write},
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::{HISTORY_DISABLED_ENV, state_dir};

pub const HISTORY_VERSION: u8 = 1;

/// One line of the append-only JSONL history log.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub enum HistoryEvent {
    Query(QueryEvent),
    Ingest(IngestEvent),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueryEvent {
    /// Schema version
    pub version: u8,
    pub timestamp: DateTime<Utc>,
    /// Predicate as the user typed it.
    pub predicate: String,
    /// Number of records returned.
    pub hits: usize,
    pub duration_ms: u32,
}

impl QueryEvent {
    pub fn new(predicate: String, hits: usize, duration_ms: u32) -> Self {
        Self {
            version: HISTORY_VERSION,
            timestamp: Utc::now(),
            predicate,
            hits,
            duration_ms,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestEvent {
    pub version: u8,
    pub timestamp: DateTime<Utc>,
    /// Where the records came from ("-" for stdin).
    pub input: String,
    pub records: usize,
    pub duration_ms: u32,
}

impl IngestEvent {
    pub fn new(input: String, records: usize, duration_ms: u32) -> Self {
        Self {
            version: HISTORY_VERSION,
            timestamp: Utc::now(),
            input,
            records,
            duration_ms,
        }
    }
}

fn history_disabled() -> bool {
    match env::var(HISTORY_DISABLED_ENV) {
        Ok(val) => val == "0" || val.eq_ignore_ascii_case("false"),
        Err(_) => false,
    }
}

/// Best-effort event log under the XDG state directory. Failures are
/// logged and swallowed; history must never break a query.
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new() -> Option<Self> {
        if history_disabled() {
            return None;
        }
        let path = state_dir()?.join("history.log");
        Some(Self { path })
    }

    /// History store at a custom path (for testing).
    #[cfg(test)]
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn log_event(&self, event: HistoryEvent) {
        if let Err(e) = self.append_event(&event) {
            debug!("Failed to log history event: {e}");
        }
    }

    fn append_event(&self, event: &HistoryEvent) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut line = serde_json::to_string(event).map_err(io::Error::other)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        // One JSON line per event; O_APPEND keeps concurrent writers from
        // interleaving whole writes in practice.
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    pub fn iter_events(&self) -> impl Iterator<Item = HistoryEvent> {
        self.read_events().into_iter().flatten()
    }

    fn read_events(&self) -> Option<Vec<HistoryEvent>> {
        let file = File::open(&self.path).ok()?;
        let reader = BufReader::new(file);
        let mut events = Vec::new();
        for line in reader.lines() {
            match line {
                Ok(line) => match serde_json::from_str(&line) {
                    Ok(ev) => events.push(ev),
                    Err(e) => debug!("Skipping malformed history line: {e}"),
                },
                Err(e) => {
                    debug!("Error reading history log: {e}");
                    break;
                }
            }
        }
        Some(events)
    }

    /// Most recent events first.
    pub fn recent(&self, limit: usize) -> Vec<HistoryEvent> {
        let mut events: Vec<HistoryEvent> = self.iter_events().collect();
        events.reverse();
        events.truncate(limit);
        events
    }

    pub fn count(&self) -> usize {
        self.iter_events().count()
    }

    pub fn clear(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
#[path = "history_tests.rs"]
mod tests;
