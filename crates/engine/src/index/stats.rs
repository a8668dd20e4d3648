use std::fmt;

/// Stats collected about one shard of the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardStats {
    /// Bloom filter width of this shard.
    pub width: usize,
    /// Records indexed under this width class.
    pub values: usize,
    /// Total row storage in 64-bit words.
    pub row_words: usize,
    /// Whether the shard has gone through higher-rank conversion.
    pub compacted: bool,
}

impl ShardStats {
    /// Average words per row; how much the rank compaction bought.
    pub fn words_per_row(&self) -> f64 {
        if self.width == 0 {
            return 0.0;
        }
        self.row_words as f64 / self.width as f64
    }
}

/// Aggregate stats across the whole index, one entry per live shard.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub shards: Vec<ShardStats>,
}

impl IndexStats {
    pub fn value_count(&self) -> usize {
        self.shards.iter().map(|s| s.values).sum()
    }

    pub fn row_bytes(&self) -> usize {
        self.shards.iter().map(|s| s.row_words * 8).sum()
    }
}

impl fmt::Display for IndexStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:>10}  {:>10}  {:>12}  {:>9}  STATE",
            "WIDTH", "RECORDS", "ROW WORDS", "WORDS/ROW"
        )?;
        for s in &self.shards {
            writeln!(
                f,
                "{:>10}  {:>10}  {:>12}  {:>9.2}  {}",
                s.width,
                s.values,
                s.row_words,
                s.words_per_row(),
                if s.compacted { "compacted" } else { "open" }
            )?;
        }
        write!(
            f,
            "{} records, {} bytes of rows",
            self.value_count(),
            self.row_bytes()
        )
    }
}
