use std::sync::{Arc, Mutex, OnceLock, RwLock};
use std::thread;

use crossbeam::channel::{Sender, bounded};
use hashbrown::HashMap;

use sift_engine::DrainConfig;

use crate::encode::{Dicts, decode_open};
use crate::error::StoreError;
use crate::frozen::{decode_frozen, summarize_clusters};
use crate::record::{Level, NewRecord, Record};
use crate::segment::{ClusterSummary, SealedStorage};
use crate::templates::TemplateRegistry;
use crate::writer::{PutHandle, SealHandle, WriterMsg, run_writer};

/// The store's two states. The transition is one-way and happens by a
/// single pointer swap, so readers always observe a consistent storage.
pub enum Storage {
    /// Accepting writes; records live in a mutable map keyed by seq.
    Open(RwLock<HashMap<u64, Vec<u8>>>),
    /// Read-only packed segments.
    Sealed(SealedStorage),
}

/// State shared between the store facade, the writer task, and readers.
pub struct StoreInner {
    pub storage: RwLock<Arc<Storage>>,
    pub dicts: Dicts,
    pub templates: TemplateRegistry,
    pub miner: Mutex<sift_engine::DrainMiner>,
    /// First-seen (level, source) per template id, for cluster output.
    pub cluster_meta: Mutex<HashMap<u64, (Level, String)>>,
    /// Timestamp of the first record; all deltas are relative to it.
    pub base_ts: OnceLock<i64>,
    pub drain_config: DrainConfig,
}

#[derive(Debug, Clone, Copy)]
pub struct StoreConfig {
    pub drain: DrainConfig,
    /// Writer channel capacity; `put` blocks when it is full.
    pub channel_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            drain: DrainConfig::default(),
            channel_capacity: 1024,
        }
    }
}

/// Write-append record store with template compression.
///
/// One writer task serializes all mutation; `put` hands a record to it
/// through a bounded channel and returns a completion handle carrying the
/// assigned id. `get` works in both states and never blocks on the
/// writer.
pub struct RecordStore {
    inner: Arc<StoreInner>,
    tx: Sender<WriterMsg>,
    seal_state: Mutex<Option<SealHandle>>,
}

impl RecordStore {
    pub fn new(config: StoreConfig) -> Self {
        Self::with_storage(
            config,
            Storage::Open(RwLock::new(HashMap::new())),
            false,
            None,
        )
    }

    /// Bring up a store already in the sealed state (e.g. from a persisted
    /// image). Writes are rejected from the start.
    pub fn from_sealed(config: StoreConfig, sealed: SealedStorage) -> Self {
        let base_ts = sealed.base_ts;
        Self::with_storage(config, Storage::Sealed(sealed), true, Some(base_ts))
    }

    fn with_storage(
        config: StoreConfig,
        storage: Storage,
        sealed: bool,
        base_ts: Option<i64>,
    ) -> Self {
        let base = OnceLock::new();
        if let Some(ts) = base_ts {
            let _ = base.set(ts);
        }

        let inner = Arc::new(StoreInner {
            storage: RwLock::new(Arc::new(storage)),
            dicts: Dicts::new(),
            templates: TemplateRegistry::new(),
            miner: Mutex::new(sift_engine::DrainMiner::new(config.drain)),
            cluster_meta: Mutex::new(HashMap::new()),
            base_ts: base,
            drain_config: config.drain,
        });

        let (tx, rx) = bounded(config.channel_capacity);
        {
            let inner = Arc::clone(&inner);
            thread::spawn(move || run_writer(inner, rx, sealed));
        }

        let seal_state = Mutex::new(sealed.then(|| {
            // Pre-resolved handle: the channel sender is dropped right
            // away, so every wait returns immediately.
            let (_tx, rx) = bounded(1);
            SealHandle { rx }
        }));

        Self {
            inner,
            tx,
            seal_state,
        }
    }

    /// Hand a record to the writer. Blocks only on channel backpressure;
    /// the returned handle resolves to the assigned id.
    pub fn put(&self, record: NewRecord) -> Result<PutHandle, StoreError> {
        if self.is_sealed() {
            return Err(StoreError::Sealed);
        }
        let (done, rx) = bounded(1);
        self.tx
            .send(WriterMsg::Put { record, done })
            .map_err(|_| StoreError::WriterGone)?;
        Ok(PutHandle { rx })
    }

    /// `put` and wait for the assigned id.
    pub fn put_wait(&self, record: NewRecord) -> Result<u64, StoreError> {
        self.put(record)?.wait()
    }

    /// Fetch a record by id, in either state.
    pub fn get(&self, id: u64) -> Result<Option<Record>, StoreError> {
        let storage = self.inner.storage.read().unwrap().clone();
        match &*storage {
            Storage::Open(map) => {
                let Some(bytes) = map.read().unwrap().get(&id).cloned() else {
                    return Ok(None);
                };
                let base_ts = self.inner.base_ts.get().copied().unwrap_or(0);
                decode_open(id, &bytes, &self.inner.templates, &self.inner.dicts, base_ts)
                    .map(Some)
            }
            Storage::Sealed(sealed) => {
                let Some((segment, index)) = sealed.find(id) else {
                    return Ok(None);
                };
                let source = sealed.strings.get(segment.source_id as usize).cloned().ok_or(
                    StoreError::Corrupt(sift_codec::DecodeError::ValueOutOfRange(u64::from(
                        segment.source_id,
                    ))),
                )?;
                decode_frozen(
                    id,
                    segment.record_bytes(index),
                    segment.level,
                    source,
                    sealed,
                )
                .map(Some)
            }
        }
    }

    /// Ask the writer to compact and freeze. Idempotent: every call
    /// returns a handle for the same, single transition.
    pub fn seal(&self) -> SealHandle {
        let mut state = self.seal_state.lock().unwrap();
        if let Some(handle) = &*state {
            return handle.clone();
        }

        let (done, rx) = bounded(1);
        let handle = SealHandle { rx };
        // A disconnected writer means sealing already happened or the
        // store is shutting down; the handle resolves either way.
        let _ = self.tx.send(WriterMsg::Seal { done });
        *state = Some(handle.clone());
        handle
    }

    /// `seal` and block until the packed segment is installed.
    pub fn seal_wait(&self) {
        self.seal().wait();
    }

    pub fn is_sealed(&self) -> bool {
        matches!(
            &**self.inner.storage.read().unwrap(),
            Storage::Sealed(_)
        )
    }

    pub fn record_count(&self) -> usize {
        let storage = self.inner.storage.read().unwrap().clone();
        match &*storage {
            Storage::Open(map) => map.read().unwrap().len(),
            Storage::Sealed(sealed) => sealed.record_count(),
        }
    }

    /// Per-cluster summaries, most common first.
    pub fn clusters(&self) -> Vec<ClusterSummary> {
        let storage = self.inner.storage.read().unwrap().clone();
        match &*storage {
            Storage::Open(_) => {
                let miner = self.inner.miner.lock().unwrap();
                let meta = self.inner.cluster_meta.lock().unwrap();
                summarize_clusters(&miner, &meta)
            }
            Storage::Sealed(sealed) => sealed.clusters.clone(),
        }
    }

    /// Ids of sealed records whose timestamp falls in `[from, to]`.
    /// Only available once sealed, where the timestamp column exists.
    pub fn ids_in_time_range(&self, from: i64, to: i64) -> Result<Vec<u64>, StoreError> {
        let storage = self.inner.storage.read().unwrap().clone();
        let Storage::Sealed(sealed) = &*storage else {
            return Err(StoreError::NotSealed);
        };

        let mut ids: Vec<u64> = sealed
            .segments
            .iter()
            .flat_map(|seg| seg.ids_in_time_range(from, to))
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    /// All record ids, ascending.
    pub fn ids(&self) -> Vec<u64> {
        let storage = self.inner.storage.read().unwrap().clone();
        match &*storage {
            Storage::Open(map) => {
                let mut ids: Vec<u64> = map.read().unwrap().keys().copied().collect();
                ids.sort_unstable();
                ids
            }
            Storage::Sealed(sealed) => {
                // Ids interleave across segments; merge their runs.
                let per_segment: Vec<std::vec::IntoIter<u64>> = sealed
                    .segments
                    .iter()
                    .map(|seg| seg.ids().into_iter())
                    .collect();
                sift_engine::merge_k(per_segment, sift_engine::Direction::Ascending).collect()
            }
        }
    }

    /// (string, uuid) dictionary sizes, live or frozen.
    pub fn dictionary_sizes(&self) -> (usize, usize) {
        let storage = self.inner.storage.read().unwrap().clone();
        match &*storage {
            Storage::Open(_) => (self.inner.dicts.strings.len(), self.inner.dicts.uuids.len()),
            Storage::Sealed(sealed) => (sealed.strings.len(), sealed.uuids.len()),
        }
    }

    /// Snapshot of the sealed storage, for persistence.
    pub fn sealed_storage(&self) -> Result<Arc<Storage>, StoreError> {
        let storage = self.inner.storage.read().unwrap().clone();
        match &*storage {
            Storage::Sealed(_) => Ok(storage),
            Storage::Open(_) => Err(StoreError::NotSealed),
        }
    }

    /// Export the sealed store as a one-file binary image.
    pub fn write_image(&self, path: &std::path::Path) -> std::io::Result<()> {
        let storage = self.sealed_storage().map_err(std::io::Error::other)?;
        let Storage::Sealed(sealed) = &*storage else {
            unreachable!("sealed_storage only returns the sealed variant");
        };
        crate::persist::write_image_atomic(path, sealed)
    }

    /// Re-open a persisted image as a store in the sealed state.
    pub fn open_image(config: StoreConfig, path: &std::path::Path) -> std::io::Result<RecordStore> {
        let sealed = crate::persist::open_image(path)?;
        Ok(RecordStore::from_sealed(config, sealed))
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
