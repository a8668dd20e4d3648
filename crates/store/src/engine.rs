use std::path::Path;
use std::sync::{Mutex, RwLock};

use log::debug;

use sift_engine::{Index, IndexConfig, SearchPredicate};

use crate::error::StoreError;
use crate::record::{LevelMask, NewRecord, Record};
use crate::segment::ClusterSummary;
use crate::store::{RecordStore, StoreConfig};

/// Engine-wide tuning, owned by the caller and passed down.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineConfig {
    pub index: IndexConfig,
    pub store: StoreConfig,
}

/// Search-time filters applied on top of the trigram candidates.
#[derive(Debug, Clone, Copy)]
pub struct QueryOptions {
    pub levels: LevelMask,
    /// Inclusive `[from_ms, to_ms]` window on record timestamps.
    pub window: Option<(i64, i64)>,
    pub limit: Option<usize>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            levels: LevelMask::all(),
            window: None,
            limit: None,
        }
    }
}

/// The record store and the trigram index wired together.
///
/// `put` stores the record and indexes its searchable text under the
/// assigned seq; `search` turns trigram candidates back into records,
/// screening Bloom and rank false positives against the actual text.
/// Mutation and search serialize through the index lock; the store side
/// is already single-writer.
pub struct LogEngine {
    store: RecordStore,
    index: RwLock<Index>,
    /// Keeps (store seq assignment, index insertion) atomic so ids enter
    /// the index in increasing order.
    write_lock: Mutex<()>,
}

impl LogEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            store: RecordStore::new(config.store),
            index: RwLock::new(Index::new(config.index)),
            write_lock: Mutex::new(()),
        }
    }

    /// Ingest one record; returns its assigned id.
    pub fn put(&self, record: NewRecord) -> Result<u64, StoreError> {
        let _guard = self.write_lock.lock().unwrap();

        let text = format!("{} {}", record.source, record.message);
        let seq = self.store.put(record)?.wait()?;

        // The index rejects writes only after seal, which this engine
        // performs under the same write lock.
        self.index
            .write()
            .unwrap()
            .add(seq, &text)
            .map_err(|_| StoreError::Sealed)?;
        Ok(seq)
    }

    pub fn get(&self, id: u64) -> Result<Option<Record>, StoreError> {
        self.store.get(id)
    }

    /// Records matching `predicate` and `options`, newest first.
    pub fn search(
        &self,
        predicate: &SearchPredicate,
        options: QueryOptions,
    ) -> Result<Vec<Record>, StoreError> {
        let limit = options.limit.unwrap_or(usize::MAX);
        if limit == 0 {
            return Ok(Vec::new());
        }

        let index = self.index.read().unwrap();
        let mut out = Vec::new();
        let mut scanned = 0usize;

        for id in index.search(predicate) {
            scanned += 1;
            let Some(record) = self.store.get(id)? else {
                continue;
            };

            if !options.levels.matches(record.level) {
                continue;
            }
            if let Some((from, to)) = options.window
                && !(from..=to).contains(&record.ts_ms)
            {
                continue;
            }
            if !text_matches(&record.searchable_text(), predicate) {
                continue;
            }

            out.push(record);
            if out.len() >= limit {
                break;
            }
        }

        debug!("search scanned {scanned} candidates, kept {}", out.len());
        Ok(out)
    }

    /// Seal both halves: freeze the store into packed segments and
    /// convert the index to higher rank. Idempotent.
    pub fn seal(&self) {
        let _guard = self.write_lock.lock().unwrap();
        self.store.seal_wait();
        // Second and later calls find the index already converted.
        let _ = self.index.write().unwrap().convert_to_higher_rank();
    }

    pub fn is_sealed(&self) -> bool {
        self.store.is_sealed()
    }

    pub fn clusters(&self) -> Vec<ClusterSummary> {
        self.store.clusters()
    }

    pub fn record_count(&self) -> usize {
        self.store.record_count()
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Per-shard index breakdown, for the stats surface.
    pub fn index_stats(&self) -> sift_engine::IndexStats {
        self.index.read().unwrap().stats()
    }

    /// Export the sealed store image. The trigram index is rebuilt on
    /// import, not persisted.
    pub fn write_image(&self, path: &Path) -> std::io::Result<()> {
        self.store.write_image(path)
    }

    /// Open a persisted image and rebuild the search index from the
    /// decoded records.
    pub fn open_image(config: EngineConfig, path: &Path) -> std::io::Result<LogEngine> {
        let store = RecordStore::open_image(config.store, path)?;

        let mut index = Index::new(config.index);
        for id in store.ids() {
            if let Ok(Some(record)) = store.get(id) {
                let _ = index.add(id, &record.searchable_text());
            }
        }
        let _ = index.convert_to_higher_rank();

        Ok(LogEngine {
            store,
            index: RwLock::new(index),
            write_lock: Mutex::new(()),
        })
    }
}

/// Verify a predicate against the record's text the same way the trigram
/// hasher sees it: lowercased, alphanumerics only. This is the screen
/// that removes Bloom and rank-compaction false positives.
fn text_matches(text: &str, predicate: &SearchPredicate) -> bool {
    let haystack = normalize(text);
    predicate.groups.iter().all(|alts| {
        alts.iter().any(|alt| {
            let needle = normalize(alt);
            // Unindexable alternatives are unconstrained, like in the
            // row algebra.
            needle.is_empty() || haystack.contains(&needle)
        })
    })
}

fn normalize(text: &str) -> String {
    text.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
