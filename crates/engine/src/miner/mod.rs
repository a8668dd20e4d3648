use std::fmt;

use hashbrown::HashMap;

pub mod tokenize;

/// Tuning for the template tree. Defaults follow the classic Drain
/// parameters scaled to log-like token streams (delimiters count as
/// tokens here, so paths run deeper than word-split miners).
#[derive(Debug, Clone, Copy)]
pub struct DrainConfig {
    /// Maximum tree depth, including the token-count level.
    pub max_depth: usize,
    /// Literal children per node before new tokens route to the shared
    /// wildcard child.
    pub max_children: usize,
    /// Clusters per leaf before the least-seen cluster is evicted.
    pub max_clusters_per_leaf: usize,
    /// Fraction of token positions that must match literally for a
    /// message to join a cluster.
    pub similarity: f64,
}

impl Default for DrainConfig {
    fn default() -> Self {
        Self {
            max_depth: 6,
            max_children: 100,
            max_clusters_per_leaf: 1024,
            similarity: 0.6,
        }
    }
}

/// One token slot of a template: a shared literal or a variable position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateToken {
    Literal(String),
    Wildcard,
}

impl TemplateToken {
    #[inline]
    pub fn is_wildcard(&self) -> bool {
        matches!(self, TemplateToken::Wildcard)
    }

    #[inline]
    fn matches_literally(&self, token: &str) -> bool {
        matches!(self, TemplateToken::Literal(l) if l == token)
    }
}

impl fmt::Display for TemplateToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateToken::Literal(l) => f.write_str(l),
            TemplateToken::Wildcard => f.write_str("*"),
        }
    }
}

/// A learned message skeleton plus usage statistics.
#[derive(Debug, Clone)]
pub struct Cluster {
    /// Stable id, assigned at creation, never reused.
    pub template_id: u64,
    pub tokens: Vec<TemplateToken>,
    /// Number of messages this cluster has absorbed.
    pub seen: u64,
}

impl Cluster {
    /// The template rendered back into text; wildcards print as `*`.
    pub fn template_text(&self) -> String {
        use fmt::Write;
        let mut out = String::new();
        for t in &self.tokens {
            let _ = write!(out, "{t}");
        }
        out
    }

    pub fn wildcard_positions(&self) -> Vec<usize> {
        self.tokens
            .iter()
            .enumerate()
            .filter(|(_, t)| t.is_wildcard())
            .map(|(i, _)| i)
            .collect()
    }
}

/// What one `learn` call did, snapshotted for the caller.
#[derive(Debug, Clone)]
pub struct LearnOutcome {
    pub template_id: u64,
    /// Template tokens after this update.
    pub tokens: Vec<TemplateToken>,
    /// Wildcard positions after this update, ascending.
    pub wildcards: Vec<usize>,
    /// Positions this very update turned from literal to wildcard,
    /// paired with the literal they held. Consumers that decode against
    /// mutable templates need these to keep older encodings exact.
    pub replaced: Vec<(usize, String)>,
    pub seen: u64,
}

/// Online Drain-style template tree.
///
/// Level 1 routes by token count, levels 2.. route by a token's routing
/// key (variables collapse onto a shared `*` child), leaves hold an
/// unordered bag of clusters scored by literal overlap.
pub struct DrainMiner {
    config: DrainConfig,
    /// Level-1 routing: one subtree per token count.
    roots: HashMap<usize, Node>,
    next_template_id: u64,
}

#[derive(Default)]
struct Node {
    children: HashMap<Box<str>, Node>,
    /// Non-empty only at leaves.
    clusters: Vec<Cluster>,
}

const WILDCARD_KEY: &str = "*";

/// Routing key for a token: variables (number-heavy tokens, UUIDs) all
/// share the wildcard edge so they cannot explode the tree's fan-out.
fn routing_key(token: &str) -> &str {
    if looks_like_variable(token) {
        WILDCARD_KEY
    } else {
        token
    }
}

fn looks_like_variable(token: &str) -> bool {
    let digits = token.bytes().filter(u8::is_ascii_digit).count();
    digits >= 3 || is_uuid_shaped(token)
}

/// Canonical 36-char hyphenated UUID shape.
pub fn is_uuid_shaped(token: &str) -> bool {
    if token.len() != 36 {
        return false;
    }
    token.bytes().enumerate().all(|(i, b)| match i {
        8 | 13 | 18 | 23 => b == b'-',
        _ => b.is_ascii_hexdigit(),
    })
}

impl DrainMiner {
    pub fn new(config: DrainConfig) -> Self {
        Self {
            config,
            roots: HashMap::new(),
            next_template_id: 0,
        }
    }

    /// Total number of live clusters.
    pub fn cluster_count(&self) -> usize {
        self.clusters().count()
    }

    /// All live clusters, in no particular order.
    pub fn clusters(&self) -> impl Iterator<Item = &Cluster> {
        self.roots.values().flat_map(Node::iter_clusters)
    }

    /// Route `tokens` to its leaf and match or create a cluster there.
    pub fn learn(&mut self, tokens: &[String]) -> LearnOutcome {
        let token_count = tokens.len();
        // Levels 2..min(max_depth, token_count) consume one token each.
        let route_len = self.config.max_depth.min(token_count).saturating_sub(1);
        let max_children = self.config.max_children;

        let mut node = self.roots.entry(token_count).or_default();
        for token in &tokens[..route_len] {
            let key = routing_key(token);
            // A full node routes unseen literals through the wildcard
            // child instead of growing wider.
            let key = if node.children.contains_key(key)
                || key == WILDCARD_KEY
                || node.children.len() < max_children
            {
                key
            } else {
                WILDCARD_KEY
            };
            node = node.children.entry_ref(key).or_default();
        }

        let threshold = (self.config.similarity * token_count as f64).floor() as usize;

        match best_match(&node.clusters, tokens) {
            Some((index, score)) if score >= threshold => {
                let cluster = &mut node.clusters[index];
                let replaced = wildcard_mismatches(cluster, tokens);
                cluster.seen += 1;
                Self::outcome(cluster, replaced)
            }
            _ => {
                let cluster = Cluster {
                    template_id: self.next_template_id,
                    tokens: tokens
                        .iter()
                        .map(|t| TemplateToken::Literal(t.clone()))
                        .collect(),
                    seen: 1,
                };
                self.next_template_id += 1;

                // Snapshot before eviction: a crowded leaf may drop the
                // newcomer itself, but the caller still encoded against it.
                let outcome = Self::outcome(&cluster, Vec::new());
                node.clusters.push(cluster);
                if node.clusters.len() > self.config.max_clusters_per_leaf {
                    evict_least_seen(&mut node.clusters);
                }
                outcome
            }
        }
    }

    fn outcome(cluster: &Cluster, replaced: Vec<(usize, String)>) -> LearnOutcome {
        LearnOutcome {
            template_id: cluster.template_id,
            tokens: cluster.tokens.clone(),
            wildcards: cluster.wildcard_positions(),
            replaced,
            seen: cluster.seen,
        }
    }
}

/// Index and score of the best-scoring cluster: the count of positions
/// whose literal equals the message token. Wildcards score nothing.
fn best_match(clusters: &[Cluster], tokens: &[String]) -> Option<(usize, usize)> {
    clusters
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let score = c
                .tokens
                .iter()
                .zip(tokens)
                .filter(|(t, m)| t.matches_literally(m))
                .count();
            (i, score)
        })
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
}

/// Turn every disagreeing literal into a wildcard, returning what was
/// replaced and where.
fn wildcard_mismatches(cluster: &mut Cluster, tokens: &[String]) -> Vec<(usize, String)> {
    let mut replaced = Vec::new();
    for (i, (slot, token)) in cluster.tokens.iter_mut().zip(tokens).enumerate() {
        if let TemplateToken::Literal(l) = slot
            && l != token
        {
            replaced.push((i, std::mem::take(l)));
            *slot = TemplateToken::Wildcard;
        }
    }
    replaced
}

fn evict_least_seen(clusters: &mut Vec<Cluster>) {
    if let Some(least) = clusters
        .iter()
        .enumerate()
        .min_by_key(|(_, c)| c.seen)
        .map(|(i, _)| i)
    {
        clusters.remove(least);
    }
}

impl Node {
    fn iter_clusters(&self) -> Box<dyn Iterator<Item = &Cluster> + '_> {
        Box::new(
            self.clusters
                .iter()
                .chain(self.children.values().flat_map(Node::iter_clusters)),
        )
    }
}

#[cfg(test)]
#[path = "miner_tests.rs"]
mod tests;
