use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use hashbrown::HashMap;
use thiserror::Error;

use crate::varint::{unzigzag, zigzag};

/// Values per block. Also the width of one bit plane in bits.
pub const BLOCK_LEN: usize = 64;

/// Decoded blocks kept around for repeated random access.
const CACHE_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("index {index} out of range for column of {count} values")]
pub struct OutOfRange {
    pub index: usize,
    pub count: usize,
}

/// Block-based codec for monotone or near-monotone 64-bit sequences.
///
/// Each value is zig-zag delta-encoded against its predecessor. Full blocks
/// of 64 deltas are transposed into bit planes:
///
///   - 8 bytes LE: running value before the block
///   - 1 byte: actual block size (<= 64)
///   - 1 byte: bit length of the widest delta (0 if all deltas are 0)
///   - `bit_length` planes of 8 bytes LE; plane `j` holds bit `j` of every
///     delta, one bit per value
///
/// Random access stays O(block size): locate the block, rebuild its deltas
/// from the planes, and offset from the stored running value. Recently
/// decoded blocks are cached.
pub struct T64 {
    /// Flushed, transposed blocks.
    data: Vec<u8>,
    /// Byte offset of each flushed block in `data`.
    block_offsets: Vec<usize>,
    /// Number of values covered by `data`.
    flushed: usize,
    /// Last value of the flushed prefix; the delta base for the tail.
    tail_base: i64,
    /// Raw values not yet flushed into a block.
    tail: Vec<i64>,
    /// Set once the trailing partial block has been flushed; the column
    /// rejects further appends from then on.
    finished: bool,
    cache: Mutex<BlockCache>,
}

impl T64 {
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            block_offsets: Vec::new(),
            flushed: 0,
            tail_base: 0,
            tail: Vec::with_capacity(BLOCK_LEN),
            finished: false,
            cache: Mutex::new(BlockCache::new(CACHE_CAPACITY)),
        }
    }

    /// Rebuild a column from previously produced compressed bytes.
    pub fn from_compressed(data: Vec<u8>) -> Result<Self, crate::DecodeError> {
        let mut block_offsets = Vec::new();
        let mut flushed = 0usize;
        let mut pos = 0usize;

        while pos < data.len() {
            if data.len() - pos < 10 {
                return Err(crate::DecodeError::UnexpectedEof);
            }
            block_offsets.push(pos);
            let size = data[pos + 8] as usize;
            let bit_length = data[pos + 9] as usize;
            if size == 0 || size > BLOCK_LEN || bit_length > 64 {
                return Err(crate::DecodeError::ValueOutOfRange(size as u64));
            }
            let block_bytes = 10 + bit_length * 8;
            if data.len() - pos < block_bytes {
                return Err(crate::DecodeError::UnexpectedEof);
            }
            flushed += size;
            pos += block_bytes;
        }

        Ok(Self {
            data,
            block_offsets,
            flushed,
            tail_base: 0,
            tail: Vec::new(),
            finished: true,
            cache: Mutex::new(BlockCache::new(CACHE_CAPACITY)),
        })
    }

    pub fn len(&self) -> usize {
        self.flushed + self.tail.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append the next value. Must not be called after `compressed_data`.
    pub fn add(&mut self, v: i64) {
        debug_assert!(!self.finished, "T64 does not support append after flush");
        self.tail.push(v);
        if self.tail.len() == BLOCK_LEN {
            self.flush_tail();
        }
    }

    /// The value passed to the `k`-th `add`.
    pub fn get(&self, k: usize) -> Result<i64, OutOfRange> {
        let count = self.len();
        if k >= count {
            return Err(OutOfRange { index: k, count });
        }

        if k >= self.flushed {
            // Unflushed tail: raw values, direct lookup.
            return Ok(self.tail[k - self.flushed]);
        }

        let block = k / BLOCK_LEN;
        let values = self.decode_block_cached(block);
        Ok(values[k % BLOCK_LEN])
    }

    /// Flush the partial tail and expose the packed bytes.
    ///
    /// The column stays readable but rejects further appends.
    pub fn compressed_data(&mut self) -> &[u8] {
        if !self.tail.is_empty() {
            self.flush_tail();
        }
        self.finished = true;
        &self.data
    }

    /// The packed bytes written so far. Covers the whole column only
    /// after `compressed_data` has flushed the tail.
    pub fn flushed_bytes(&self) -> &[u8] {
        &self.data
    }

    fn flush_tail(&mut self) {
        debug_assert!(!self.tail.is_empty() && self.tail.len() <= BLOCK_LEN);

        let mut deltas = [0u64; BLOCK_LEN];
        let mut prev = self.tail_base;
        let mut max: u64 = 0;
        for (i, &v) in self.tail.iter().enumerate() {
            let zz = zigzag(v.wrapping_sub(prev));
            deltas[i] = zz;
            max |= zz;
            prev = v;
        }
        let bit_length = (64 - max.leading_zeros()) as usize;

        self.block_offsets.push(self.data.len());
        self.data.extend_from_slice(&self.tail_base.to_le_bytes());
        self.data.push(self.tail.len() as u8);
        self.data.push(bit_length as u8);

        // Transpose: plane j carries bit j of every delta.
        for j in 0..bit_length {
            let mut plane: u64 = 0;
            for (i, &zz) in deltas[..self.tail.len()].iter().enumerate() {
                plane |= ((zz >> j) & 1) << i;
            }
            self.data.extend_from_slice(&plane.to_le_bytes());
        }

        self.flushed += self.tail.len();
        self.tail_base = prev;
        self.tail.clear();
    }

    fn decode_block_cached(&self, block: usize) -> Arc<Vec<i64>> {
        let mut cache = self.cache.lock().unwrap();
        if let Some(values) = cache.get(block) {
            return values;
        }
        let values = Arc::new(self.decode_block(block));
        cache.insert(block, Arc::clone(&values));
        values
    }

    /// Rebuild the absolute values of one flushed block from its planes.
    fn decode_block(&self, block: usize) -> Vec<i64> {
        let pos = self.block_offsets[block];
        let base = i64::from_le_bytes(self.data[pos..pos + 8].try_into().unwrap());
        let size = self.data[pos + 8] as usize;
        let bit_length = self.data[pos + 9] as usize;

        let mut deltas = [0u64; BLOCK_LEN];
        let planes = &self.data[pos + 10..pos + 10 + bit_length * 8];
        for (j, plane_bytes) in planes.chunks_exact(8).enumerate() {
            let plane = u64::from_le_bytes(plane_bytes.try_into().unwrap());
            for (i, delta) in deltas[..size].iter_mut().enumerate() {
                *delta |= ((plane >> i) & 1) << j;
            }
        }

        let mut values = Vec::with_capacity(size);
        let mut running = base;
        for &zz in &deltas[..size] {
            running = running.wrapping_add(unzigzag(zz));
            values.push(running);
        }
        values
    }
}

impl Default for T64 {
    fn default() -> Self {
        Self::new()
    }
}

/// Least-recently-used cache of decoded blocks.
struct BlockCache {
    capacity: usize,
    blocks: HashMap<usize, Arc<Vec<i64>>>,
    order: VecDeque<usize>,
}

impl BlockCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            blocks: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
        }
    }

    fn get(&mut self, block: usize) -> Option<Arc<Vec<i64>>> {
        let values = self.blocks.get(&block).cloned()?;
        self.touch(block);
        Some(values)
    }

    fn insert(&mut self, block: usize, values: Arc<Vec<i64>>) {
        if self.blocks.len() >= self.capacity
            && !self.blocks.contains_key(&block)
            && let Some(evicted) = self.order.pop_front()
        {
            self.blocks.remove(&evicted);
        }
        self.blocks.insert(block, values);
        self.touch(block);
    }

    fn touch(&mut self, block: usize) {
        if let Some(i) = self.order.iter().position(|&b| b == block) {
            self.order.remove(i);
        }
        self.order.push_back(block);
    }
}

#[cfg(test)]
#[path = "t64_tests.rs"]
mod tests;
