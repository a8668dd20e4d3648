use std::sync::{Arc, RwLock};

use hashbrown::HashMap;

use sift_engine::{LearnOutcome, TemplateToken};

/// One template as the store knows it: the miner's current tokens plus
/// every literal a later update wildcarded away.
///
/// The side map is what keeps open-state decode exact: a record encoded
/// while position `p` was still a literal stores no value for `p`, so when
/// `p` mutates to a wildcard the original literal must stay reachable.
/// A position is wildcarded at most once, so the map never changes again
/// for that position.
#[derive(Debug, Clone)]
pub struct StoredTemplate {
    pub tokens: Vec<TemplateToken>,
    /// position -> the literal that stood there before it became `*`.
    pub replaced: HashMap<usize, String>,
}

impl StoredTemplate {
    /// Wildcard positions, ascending.
    pub fn wildcards(&self) -> Vec<usize> {
        self.tokens
            .iter()
            .enumerate()
            .filter(|(_, t)| t.is_wildcard())
            .map(|(i, _)| i)
            .collect()
    }
}

/// Templates by id. A concurrent map while the store is open; the sealed
/// store replaces it with a plain frozen table.
pub struct TemplateRegistry {
    inner: RwLock<HashMap<u64, Arc<StoredTemplate>>>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: u64) -> Option<Arc<StoredTemplate>> {
        self.inner.read().unwrap().get(&id).cloned()
    }

    /// Fold one learn outcome in: replace the token snapshot and extend
    /// the replaced-literal map with this update's mutations.
    pub fn apply(&self, outcome: &LearnOutcome) {
        let mut inner = self.inner.write().unwrap();
        let prior = inner.get(&outcome.template_id);

        let mut replaced = prior.map(|t| t.replaced.clone()).unwrap_or_default();
        for (pos, literal) in &outcome.replaced {
            replaced.entry(*pos).or_insert_with(|| literal.clone());
        }

        inner.insert(
            outcome.template_id,
            Arc::new(StoredTemplate {
                tokens: outcome.tokens.clone(),
                replaced,
            }),
        );
    }

    /// Final token snapshots, for the frozen table.
    pub fn freeze(&self) -> HashMap<u64, Vec<TemplateToken>> {
        self.inner
            .read()
            .unwrap()
            .iter()
            .map(|(&id, t)| (id, t.tokens.clone()))
            .collect()
    }
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sift_engine::{DrainConfig, DrainMiner, tokenize};

    #[test]
    fn apply_tracks_replaced_literals_across_updates() {
        let mut miner = DrainMiner::new(DrainConfig::default());
        let registry = TemplateRegistry::new();

        let a = miner.learn(&tokenize("job 700 finished"));
        registry.apply(&a);
        let b = miner.learn(&tokenize("job 900 finished"));
        registry.apply(&b);

        assert_eq!(a.template_id, b.template_id);
        let stored = registry.get(a.template_id).unwrap();
        assert!(stored.tokens[2].is_wildcard());
        assert_eq!(stored.replaced.get(&2).map(String::as_str), Some("700"));
    }

    #[test]
    fn first_wildcarding_wins_in_the_replaced_map() {
        let mut miner = DrainMiner::new(DrainConfig::default());
        let registry = TemplateRegistry::new();

        registry.apply(&miner.learn(&tokenize("took 100 ms and 200 units")));
        registry.apply(&miner.learn(&tokenize("took 300 ms and 200 units")));
        registry.apply(&miner.learn(&tokenize("took 300 ms and 500 units")));

        let stored = registry.get(0).unwrap();
        // Position 2 was wildcarded by the second message, position 8 by
        // the third; each keeps the literal it replaced.
        assert_eq!(stored.replaced.get(&2).map(String::as_str), Some("100"));
        assert_eq!(stored.replaced.get(&8).map(String::as_str), Some("200"));
    }
}
