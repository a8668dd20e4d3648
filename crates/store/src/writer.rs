use std::sync::Arc;

use crossbeam::channel::{Receiver, Sender};
use log::{debug, info};

use sift_engine::tokenize;

use crate::encode::encode_open;
use crate::error::StoreError;
use crate::frozen::build_sealed;
use crate::record::NewRecord;
use crate::store::{Storage, StoreInner};

/// Work items for the store's single writer task.
pub enum WriterMsg {
    Put {
        record: NewRecord,
        done: Sender<Result<u64, StoreError>>,
    },
    Seal {
        done: Sender<()>,
    },
}

/// Completion handle for one `put`. Dropping it abandons the result; the
/// record is still either fully stored or fully absent.
#[derive(Debug)]
pub struct PutHandle {
    pub(crate) rx: Receiver<Result<u64, StoreError>>,
}

impl PutHandle {
    /// Block until the writer has stored the record; returns its id.
    pub fn wait(self) -> Result<u64, StoreError> {
        self.rx.recv().unwrap_or(Err(StoreError::WriterGone))
    }
}

/// Completion handle for `seal`. Resolves once the packed segment is
/// installed; every clone resolves.
#[derive(Clone)]
pub struct SealHandle {
    pub(crate) rx: Receiver<()>,
}

impl SealHandle {
    pub fn wait(&self) {
        // A message or a disconnect both mean the writer is done sealing.
        let _ = self.rx.recv();
    }
}

/// Writer task: drains the request channel, assigns sequence numbers in
/// arrival order, and owns all mutation of the open storage.
pub fn run_writer(inner: Arc<StoreInner>, rx: Receiver<WriterMsg>, initially_sealed: bool) {
    let mut next_seq: u64 = 0;
    let mut sealed = initially_sealed;

    for msg in rx {
        match msg {
            WriterMsg::Put { record, done } => {
                if sealed {
                    let _ = done.send(Err(StoreError::Sealed));
                    continue;
                }
                let seq = next_seq;
                next_seq += 1;
                ingest(&inner, seq, &record);
                let _ = done.send(Ok(seq));
            }
            WriterMsg::Seal { done } => {
                if !sealed {
                    seal(&inner);
                    sealed = true;
                }
                let _ = done.send(());
            }
        }
    }

    debug!("record store writer shut down after {next_seq} records");
}

/// Serialize one record into the open map under `seq`.
fn ingest(inner: &StoreInner, seq: u64, record: &NewRecord) {
    let tokens = tokenize(&record.message);

    let outcome = inner.miner.lock().unwrap().learn(&tokens);
    inner.templates.apply(&outcome);
    inner
        .cluster_meta
        .lock()
        .unwrap()
        .entry(outcome.template_id)
        .or_insert_with(|| (record.level, record.source.clone()));

    // The very first record seeds the delta base for all timestamps.
    let base_ts = *inner.base_ts.get_or_init(|| record.ts_ms);

    let bytes = encode_open(
        record,
        &tokens,
        outcome.template_id,
        &outcome.wildcards,
        base_ts,
        &inner.dicts,
    );

    let storage = inner.storage.read().unwrap().clone();
    if let Storage::Open(map) = &*storage {
        map.write().unwrap().insert(seq, bytes);
    }
}

/// One-way transition to the packed form.
fn seal(inner: &StoreInner) {
    let storage = inner.storage.read().unwrap().clone();
    let Storage::Open(map) = &*storage else {
        return;
    };

    let mut entries: Vec<(u64, Vec<u8>)> = map.write().unwrap().drain().collect();
    entries.sort_unstable_by_key(|(id, _)| *id);
    let count = entries.len();

    let base_ts = inner.base_ts.get().copied().unwrap_or(0);
    let sealed = build_sealed(
        entries,
        &inner.templates,
        &inner.dicts,
        base_ts,
        inner.drain_config,
    );

    info!(
        "sealed {count} records into {} segments",
        sealed.segments.len()
    );
    *inner.storage.write().unwrap() = Arc::new(Storage::Sealed(sealed));
}
