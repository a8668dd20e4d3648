use smallvec::SmallVec;

use crate::bits::{BitMat, RankedRow};

/// One Bloom-width class of the inverted index.
///
/// All records whose trigram count maps to the same filter width `m` land
/// in the same shard. The shard keeps `m` rows; row `k` has bit `v` set
/// iff `values[v]`'s filter touched bit `k`.
pub struct Shard {
    /// Bloom filter width. Always a power of two.
    width: usize,
    /// Caller ids in insertion order. Monotonically increasing.
    values: Vec<u64>,
    rows: BitMat,
}

impl Shard {
    pub fn new(width: usize) -> Self {
        debug_assert!(width.is_power_of_two());
        Self {
            width,
            values: Vec::new(),
            rows: BitMat::new(width),
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn value_count(&self) -> usize {
        self.values.len()
    }

    pub fn word_count(&self) -> usize {
        self.rows.word_count()
    }

    pub fn is_compacted(&self) -> bool {
        self.rows.is_compacted()
    }

    /// Index `id` under its trigram set. The caller guarantees ids arrive
    /// in increasing order and that the shard is not compacted.
    pub fn add(&mut self, id: u64, trigrams: &[u32]) {
        debug_assert!(self.values.last().is_none_or(|&last| last < id));

        let position = self.values.len();
        for &h in trigrams {
            self.rows.set(h as usize % self.width, position);
        }
        self.values.push(id);
    }

    pub fn compact(&mut self, target_density: f64, dense_cutoff: f64) {
        self.rows.compact(target_density, dense_cutoff);
    }

    /// Ids matching the predicate, descending.
    ///
    /// `groups` is the predicate lowered to trigram hashes: outer AND,
    /// inner OR, innermost the hash set of one substring alternative. An
    /// alternative with no hashes makes its whole group unconstrained.
    pub fn query(&self, groups: &[Vec<Vec<u32>>]) -> Vec<u64> {
        let Some(result) = self.query_row(groups) else {
            // Unconstrained: everything, newest first.
            return self.values.iter().rev().copied().collect();
        };

        result
            .candidates_desc(self.values.len())
            .into_iter()
            .map(|pos| self.values[pos])
            .collect()
    }

    /// AND-of-OR row algebra. `None` means "no constraint applied".
    ///
    /// Groups are evaluated most-selective first so a dead conjunction
    /// dies on its cheapest member.
    fn query_row(&self, groups: &[Vec<Vec<u32>>]) -> Option<RankedRow> {
        let mut order: Vec<usize> = (0..groups.len()).collect();
        order.sort_by_cached_key(|&g| self.estimate_group_cost(&groups[g]));

        let mut result: Option<RankedRow> = None;
        for &g in &order {
            let Some(group_row) = self.group_row(&groups[g]) else {
                continue;
            };

            match &mut result {
                None => result = Some(group_row),
                Some(acc) => acc.and_with(&group_row),
            }

            // Short-circuit: a dead group kills the whole conjunction.
            if result.as_ref().is_some_and(RankedRow::is_all_zero) {
                return result;
            }
        }

        result
    }

    /// Upper bound on how many positions a group can pass: each
    /// alternative contributes at most its sparsest row. Unconstrained
    /// groups cost the world and evaluate last.
    fn estimate_group_cost(&self, alternatives: &[Vec<u32>]) -> u64 {
        let mut total = 0u64;
        for alt in alternatives {
            if alt.is_empty() {
                return u64::MAX;
            }
            let sparsest = alt
                .iter()
                .map(|&h| self.rows.count_ones(h as usize % self.width))
                .min()
                .unwrap_or(0);
            total = total.saturating_add(sparsest as u64);
        }
        total
    }

    /// OR together the alternatives of one group. `None` when the group
    /// imposes no constraint.
    fn group_row(&self, alternatives: &[Vec<u32>]) -> Option<RankedRow> {
        let mut group_row: Option<RankedRow> = None;

        for alt in alternatives {
            if alt.is_empty() {
                return None;
            }

            let alt_row = self.alternative_row(alt);
            match &mut group_row {
                None => group_row = Some(alt_row),
                Some(acc) => acc.or_with(&alt_row),
            }
        }

        group_row
    }

    /// AND the rows every trigram of one substring maps to.
    fn alternative_row(&self, trigrams: &[u32]) -> RankedRow {
        // The same trigram set may hit one physical row several times
        // under `mod width`; AND-ing a row with itself is wasted work.
        let mut row_ids: SmallVec<[usize; 16]> = trigrams
            .iter()
            .map(|&h| h as usize % self.width)
            .collect();
        row_ids.sort_unstable();
        row_ids.dedup();

        let mut acc = self.rows.ranked_row(row_ids[0]);
        for &k in &row_ids[1..] {
            if acc.is_all_zero() {
                break;
            }
            acc.and_with(&self.rows.ranked_row(k));
        }
        acc
    }
}

#[cfg(test)]
#[path = "shard_tests.rs"]
mod tests;
