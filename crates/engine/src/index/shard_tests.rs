use super::*;
use crate::trigram::trigram_set;

fn lower(groups: &[&[&str]]) -> Vec<Vec<Vec<u32>>> {
    groups
        .iter()
        .map(|alts| alts.iter().map(|s| trigram_set(s)).collect())
        .collect()
}

fn shard_with(texts: &[(u64, &str)]) -> Shard {
    let mut shard = Shard::new(1024);
    for &(id, text) in texts {
        shard.add(id, &trigram_set(text));
    }
    shard
}

#[test]
fn single_term_query_finds_exact_records() {
    let shard = shard_with(&[
        (1, "user login ok"),
        (2, "user logout ok"),
        (3, "admin login ok"),
    ]);

    assert_eq!(shard.query(&lower(&[&["logout"]])), vec![2]);
    assert_eq!(shard.query(&lower(&[&["admin"]])), vec![3]);
    assert!(shard.query(&lower(&[&["missing"]])).is_empty());
}

#[test]
fn conjunction_intersects_groups() {
    let shard = shard_with(&[
        (1, "user login ok"),
        (2, "user logout ok"),
        (3, "admin login ok"),
    ]);

    let hits = shard.query(&lower(&[&["user"], &["login"]]));
    assert_eq!(hits, vec![1]);
}

#[test]
fn disjunction_unions_alternatives_descending() {
    let shard = shard_with(&[
        (1, "user login ok"),
        (2, "user logout ok"),
        (3, "admin login ok"),
    ]);

    let hits = shard.query(&lower(&[&["user"], &["login", "logout"]]));
    assert_eq!(hits, vec![2, 1]);
}

#[test]
fn empty_predicate_returns_everything_newest_first() {
    let shard = shard_with(&[(10, "aaa"), (20, "bbb"), (30, "ccc")]);
    assert_eq!(shard.query(&[]), vec![30, 20, 10]);
}

#[test]
fn unconstrained_alternative_neutralizes_its_group() {
    let shard = shard_with(&[(1, "user login"), (2, "admin logout")]);

    // "??" normalizes to nothing: the group matches everything, the other
    // group still constrains.
    let hits = shard.query(&lower(&[&["??", "user"], &["logout"]]));
    assert_eq!(hits, vec![2]);
}

#[test]
fn query_after_compaction_keeps_recall() {
    let mut shard = shard_with(&[
        (1, "user login ok"),
        (2, "user logout ok"),
        (3, "admin login ok"),
    ]);
    shard.compact(0.30, 0.80);

    let hits = shard.query(&lower(&[&["logout"]]));
    assert!(hits.contains(&2), "compaction lost a true match: {hits:?}");
    // Descending order survives even with rank aliases present.
    for w in hits.windows(2) {
        assert!(w[0] > w[1]);
    }
}

#[test]
fn value_count_tracks_insertions() {
    let shard = shard_with(&[(5, "one"), (6, "two")]);
    assert_eq!(shard.value_count(), 2);
}
