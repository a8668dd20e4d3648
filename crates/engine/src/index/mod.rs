use log::debug;

mod shard;
mod stats;

use shard::Shard;
pub use stats::{IndexStats, ShardStats};

use crate::{
    IndexError, SearchPredicate,
    merge::{Direction, merge_k},
    trigram::trigram_set,
};

/// Tuning knobs for the bit-sliced index. Owned by the caller and passed
/// down; there is no process-wide state.
#[derive(Debug, Clone, Copy)]
pub struct IndexConfig {
    /// Target Bloom false-positive rate used to size a record's filter.
    pub target_fp_rate: f64,
    /// Rows at or under this density keep halving during compaction.
    pub target_density: f64,
    /// Rows denser than this collapse to a single word outright.
    pub dense_cutoff: f64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            target_fp_rate: 0.0001,
            target_density: 0.30,
            dense_cutoff: 0.80,
        }
    }
}

/// `-ln(1 / 2^ln2)`: the per-item bit cost divisor of a Bloom filter with
/// an optimal hash count.
const BLOOM_LN_FACTOR: f64 = 0.480_453_013_918_201_4;

/// Maximum shard width class; widths are `2^0 ..= 2^31`.
const SHARD_SLOTS: usize = 32;

/// Bloom width for `n` distinct trigrams at false-positive rate `p`,
/// rounded up to a power of two. The power-of-two rounding is what makes
/// shards reusable across records of similar trigram counts.
fn bloom_width(n: usize, p: f64) -> usize {
    let bits = (n as f64 * p.ln() / -BLOOM_LN_FACTOR).ceil();
    let clamped = bits.max(1.0).min((1u64 << (SHARD_SLOTS - 1)) as f64);
    (clamped as usize).next_power_of_two()
}

/// Trigram bit-sliced substring index.
///
/// Write path: `add` hashes the text, picks the shard for its width class,
/// and sets one Bloom bit per trigram. Read path: `search` lowers the
/// predicate to trigram hashes, runs the row algebra per shard, and merges
/// the per-shard hits into one descending id stream.
///
/// Single-writer, multi-reader: `add` and `convert_to_higher_rank` must
/// not overlap searches. Searching a quiesced index is safe from any
/// number of threads.
pub struct Index {
    /// Shards keyed by `log2(width)`, created lazily.
    shards: Vec<Option<Shard>>,
    config: IndexConfig,
    sealed: bool,
}

impl Index {
    pub fn new(config: IndexConfig) -> Self {
        Self {
            shards: (0..SHARD_SLOTS).map(|_| None).collect(),
            config,
            sealed: false,
        }
    }

    /// Number of indexed records across all shards.
    pub fn value_count(&self) -> usize {
        self.shards
            .iter()
            .flatten()
            .map(Shard::value_count)
            .sum()
    }

    /// Approximate row storage in 64-bit words, for stats output.
    pub fn word_count(&self) -> usize {
        self.shards.iter().flatten().map(Shard::word_count).sum()
    }

    /// Widths of the shards created so far, ascending.
    pub fn shard_widths(&self) -> Vec<usize> {
        self.shards.iter().flatten().map(Shard::width).collect()
    }

    /// Per-shard breakdown for stats output.
    pub fn stats(&self) -> IndexStats {
        IndexStats {
            shards: self
                .shards
                .iter()
                .flatten()
                .map(|s| ShardStats {
                    width: s.width(),
                    values: s.value_count(),
                    row_words: s.word_count(),
                    compacted: s.is_compacted(),
                })
                .collect(),
        }
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Index `text` under `id`. Ids must arrive in increasing order.
    ///
    /// Text that normalizes to nothing is not indexable and is skipped;
    /// the index is unchanged.
    pub fn add(&mut self, id: u64, text: &str) -> Result<(), IndexError> {
        if self.sealed {
            return Err(IndexError::AlreadySealed);
        }

        let trigrams = trigram_set(text);
        if trigrams.is_empty() {
            return Ok(());
        }

        let width = bloom_width(trigrams.len(), self.config.target_fp_rate);
        let slot = width.trailing_zeros() as usize;

        let shard = self.shards[slot].get_or_insert_with(|| {
            debug!("creating shard for width {width} (slot {slot})");
            Shard::new(width)
        });
        shard.add(id, &trigrams);
        Ok(())
    }

    /// Compact every shard's rows by OR-halving and make the index
    /// read-only. Fails on the second call.
    pub fn convert_to_higher_rank(&mut self) -> Result<(), IndexError> {
        if self.sealed {
            return Err(IndexError::AlreadySealed);
        }
        self.sealed = true;

        let before = self.word_count();
        for shard in self.shards.iter_mut().flatten() {
            shard.compact(self.config.target_density, self.config.dense_cutoff);
        }
        debug!(
            "higher-rank conversion: {before} -> {} row words",
            self.word_count()
        );
        Ok(())
    }

    /// All ids matching the predicate, strictly descending.
    ///
    /// An empty predicate matches everything. Never fails; Bloom false
    /// positives (and, after compaction, rank aliases) are the caller's to
    /// screen out, e.g. via [Index::search_filtered].
    pub fn search(&self, predicate: &SearchPredicate) -> SearchHits {
        // Lower the predicate to hashes once; each shard re-maps them to
        // its own width.
        let groups: Vec<Vec<Vec<u32>>> = predicate
            .groups
            .iter()
            .map(|alts| alts.iter().map(|s| trigram_set(s)).collect())
            .collect();

        let per_shard: Vec<std::vec::IntoIter<u64>> = self
            .shards
            .iter()
            .flatten()
            .map(|shard| shard.query(&groups).into_iter())
            .collect();

        SearchHits {
            inner: merge_k(per_shard, Direction::Descending),
        }
    }

    /// [Index::search] with a caller-side screen applied to each id, in
    /// the spirit of verifying Bloom candidates against the source text.
    pub fn search_filtered<'a, F>(
        &'a self,
        predicate: &SearchPredicate,
        filter: F,
    ) -> impl Iterator<Item = u64> + 'a
    where
        F: Fn(u64) -> bool + 'a,
    {
        self.search(predicate).filter(move |&id| filter(id))
    }
}

impl Default for Index {
    fn default() -> Self {
        Self::new(IndexConfig::default())
    }
}

/// Lazy descending id stream produced by [Index::search].
pub struct SearchHits {
    inner: crate::merge::MergeK<std::vec::IntoIter<u64>>,
}

impl Iterator for SearchHits {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        self.inner.next()
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
