use hashbrown::HashMap;
use uuid::Uuid;

use sift_codec::T64;
use sift_codec::varint::{read_uvarint, write_uvarint};
use sift_engine::TemplateToken;

use crate::encode::DictRead;
use crate::record::{DomainKind, Level};

/// Records between checkpoints; bounds the linear delta walk.
pub const CHECKPOINT_STRIDE: usize = 128;

/// One immutable packed run of frozen records sharing a header.
///
/// Records are laid end to end in `blob`; `offsets[i]..offsets[i+1]`
/// frames record `i`. Ids are recovered from a varint gap stream anchored
/// every [CHECKPOINT_STRIDE] records by `(id, stream offset)` pairs, so a
/// point lookup is a binary search plus at most one stride of gap walking.
pub struct Segment {
    pub domain: DomainKind,
    pub level: Level,
    pub source_id: u32,

    blob: Vec<u8>,
    /// `record_count + 1` entries; the last one is `blob.len()`.
    offsets: Vec<u32>,
    checkpoint_ids: Vec<u64>,
    checkpoint_offsets: Vec<u32>,
    /// Gaps `id[i] - id[i-1]` for `i >= 1`, as uvarints.
    delta_stream: Vec<u8>,
    /// Record timestamps, index-aligned, for time-window scans.
    timestamps: T64,

    first_id: u64,
    last_id: u64,
}

impl Segment {
    /// Pack `records` (ascending ids) into a segment.
    pub fn build(
        domain: DomainKind,
        level: Level,
        source_id: u32,
        records: &[(u64, i64, Vec<u8>)],
    ) -> Segment {
        debug_assert!(!records.is_empty());
        debug_assert!(records.windows(2).all(|w| w[0].0 < w[1].0));

        let mut blob = Vec::with_capacity(records.iter().map(|(_, _, b)| b.len()).sum());
        let mut offsets = Vec::with_capacity(records.len() + 1);
        let mut checkpoint_ids = Vec::new();
        let mut checkpoint_offsets = Vec::new();
        let mut delta_stream = Vec::new();
        let mut timestamps = T64::new();

        let mut prev_id = 0u64;
        for (i, (id, ts, bytes)) in records.iter().enumerate() {
            if i > 0 {
                write_uvarint(&mut delta_stream, id - prev_id);
            }
            // The checkpoint offset must point at the gap of the *next*
            // record, so it is taken after this record's own gap.
            if i % CHECKPOINT_STRIDE == 0 {
                checkpoint_ids.push(*id);
                checkpoint_offsets.push(delta_stream.len() as u32);
            }
            prev_id = *id;

            offsets.push(blob.len() as u32);
            blob.extend_from_slice(bytes);
            timestamps.add(*ts);
        }
        offsets.push(blob.len() as u32);

        Segment {
            domain,
            level,
            source_id,
            blob,
            offsets,
            checkpoint_ids,
            checkpoint_offsets,
            delta_stream,
            timestamps,
            first_id: records[0].0,
            last_id: records[records.len() - 1].0,
        }
    }

    /// Reassemble a segment from its persisted parts.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        domain: DomainKind,
        level: Level,
        source_id: u32,
        blob: Vec<u8>,
        offsets: Vec<u32>,
        checkpoint_ids: Vec<u64>,
        checkpoint_offsets: Vec<u32>,
        delta_stream: Vec<u8>,
        timestamps: T64,
    ) -> Option<Segment> {
        let count = offsets.len().checked_sub(1)?;
        if count == 0 || checkpoint_ids.is_empty() {
            return None;
        }

        let first_id = checkpoint_ids[0];
        // The last id is the last checkpoint plus any trailing gaps.
        let mut last_id = *checkpoint_ids.last()?;
        let mut input = delta_stream.get(*checkpoint_offsets.last()? as usize..)?;
        while !input.is_empty() {
            last_id += read_uvarint(&mut input).ok()?;
        }

        Some(Segment {
            domain,
            level,
            source_id,
            blob,
            offsets,
            checkpoint_ids,
            checkpoint_offsets,
            delta_stream,
            timestamps,
            first_id,
            last_id,
        })
    }

    pub fn record_count(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn blob(&self) -> &[u8] {
        &self.blob
    }

    pub fn offsets(&self) -> &[u32] {
        &self.offsets
    }

    pub fn checkpoint_ids(&self) -> &[u64] {
        &self.checkpoint_ids
    }

    pub fn checkpoint_offsets(&self) -> &[u32] {
        &self.checkpoint_offsets
    }

    pub fn delta_stream(&self) -> &[u8] {
        &self.delta_stream
    }

    pub fn timestamps(&self) -> &T64 {
        &self.timestamps
    }

    pub fn timestamps_mut(&mut self) -> &mut T64 {
        &mut self.timestamps
    }

    /// Position of `id` in this segment, if present.
    pub fn lookup(&self, id: u64) -> Option<usize> {
        if id < self.first_id || id > self.last_id {
            return None;
        }

        let cp = match self.checkpoint_ids.binary_search(&id) {
            Ok(cp) => return Some(cp * CHECKPOINT_STRIDE),
            // Not a checkpoint: walk from the greatest one below.
            Err(0) => return None,
            Err(ins) => ins - 1,
        };

        let mut index = cp * CHECKPOINT_STRIDE;
        let mut current = self.checkpoint_ids[cp];
        let mut input = &self.delta_stream[self.checkpoint_offsets[cp] as usize..];

        while current < id {
            if input.is_empty() || index + 1 >= self.record_count() {
                return None;
            }
            // The stream is built in-process; a bad gap means memory
            // corruption, so treat it as absent.
            let Ok(gap) = read_uvarint(&mut input) else {
                return None;
            };
            current += gap;
            index += 1;
        }

        (current == id).then_some(index)
    }

    /// The bytes of record `index`.
    pub fn record_bytes(&self, index: usize) -> &[u8] {
        let start = self.offsets[index] as usize;
        let end = self.offsets[index + 1] as usize;
        &self.blob[start..end]
    }

    /// All record ids in this segment, ascending.
    pub fn ids(&self) -> Vec<u64> {
        let mut out = Vec::with_capacity(self.record_count());
        let mut current = self.first_id;
        let mut input = self.delta_stream.as_slice();

        out.push(current);
        while let Ok(gap) = read_uvarint(&mut input) {
            current += gap;
            out.push(current);
        }
        out
    }

    /// Ids whose timestamp falls inside `[from, to]`, ascending.
    pub fn ids_in_time_range(&self, from: i64, to: i64) -> Vec<u64> {
        let mut out = Vec::new();
        let mut current = self.first_id;
        let mut input = self.delta_stream.as_slice();

        for index in 0..self.record_count() {
            if index > 0 {
                let Ok(gap) = read_uvarint(&mut input) else {
                    break;
                };
                current += gap;
            }
            if let Ok(ts) = self.timestamps.get(index)
                && (from..=to).contains(&ts)
            {
                out.push(current);
            }
        }
        out
    }
}

/// Per-cluster roll-up surfaced by `clusters()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterSummary {
    pub count: u64,
    pub level: Level,
    pub template: String,
    pub source: String,
}

/// Everything the sealed store owns: packed segments plus the frozen
/// dictionaries and templates they decode against.
pub struct SealedStorage {
    pub segments: Vec<Segment>,
    pub strings: Vec<String>,
    pub uuids: Vec<Uuid>,
    pub templates: HashMap<u64, Vec<TemplateToken>>,
    pub clusters: Vec<ClusterSummary>,
    pub base_ts: i64,
}

impl SealedStorage {
    pub fn record_count(&self) -> usize {
        self.segments.iter().map(Segment::record_count).sum()
    }

    /// Locate `id` across segments. Ids interleave between groups, so
    /// each segment's checkpoint index is probed; the id range check
    /// rejects most of them immediately.
    pub fn find(&self, id: u64) -> Option<(&Segment, usize)> {
        self.segments
            .iter()
            .find_map(|seg| seg.lookup(id).map(|idx| (seg, idx)))
    }
}

impl DictRead for SealedStorage {
    fn string(&self, id: u32) -> Option<String> {
        self.strings.get(id as usize).cloned()
    }

    fn uuid(&self, id: u32) -> Option<Uuid> {
        self.uuids.get(id as usize).copied()
    }
}

#[cfg(test)]
#[path = "segment_tests.rs"]
mod tests;
