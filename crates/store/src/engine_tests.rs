use super::*;
use crate::record::Level;

fn engine() -> LogEngine {
    LogEngine::new(EngineConfig::default())
}

fn rec(ts_ms: i64, level: Level, source: &str, message: &str) -> NewRecord {
    NewRecord {
        ts_ms,
        level,
        source: source.into(),
        message: message.into(),
        extra: None,
    }
}

#[test]
fn put_search_get_roundtrip() {
    let engine = engine();
    let id = engine
        .put(rec(1_000, Level::Info, "api-0", "GET /api/orders id=100 status=200"))
        .unwrap();
    assert_eq!(id, 0);

    let hits = engine
        .search(&SearchPredicate::contains_all(["orders"]), QueryOptions::default())
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].seq, id);

    let missing = engine
        .search(&SearchPredicate::contains_all(["missing"]), QueryOptions::default())
        .unwrap();
    assert!(missing.is_empty());
}

#[test]
fn and_of_or_scenario_yields_descending_ids() {
    let engine = engine();
    engine.put(rec(1, Level::Info, "auth", "user login ok")).unwrap();
    engine.put(rec(2, Level::Info, "auth", "user logout ok")).unwrap();
    engine.put(rec(3, Level::Info, "auth", "admin login ok")).unwrap();

    let pred = SearchPredicate::new(vec![
        vec!["user".into()],
        vec!["login".into(), "logout".into()],
    ]);
    let hits = engine.search(&pred, QueryOptions::default()).unwrap();
    let ids: Vec<u64> = hits.iter().map(|r| r.seq).collect();
    assert_eq!(ids, vec![1, 0]);
}

#[test]
fn source_text_is_searchable() {
    let engine = engine();
    engine.put(rec(1, Level::Info, "billing-7f9c", "started")).unwrap();
    engine.put(rec(2, Level::Info, "checkout-1a2b", "started")).unwrap();

    let hits = engine
        .search(&SearchPredicate::contains_all(["billing"]), QueryOptions::default())
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].source, "billing-7f9c");
}

#[test]
fn level_mask_filters_results() {
    let engine = engine();
    engine.put(rec(1, Level::Info, "api", "request handled fine")).unwrap();
    engine.put(rec(2, Level::Error, "api", "request handled badly")).unwrap();

    let opts = QueryOptions {
        levels: LevelMask::ERROR,
        ..QueryOptions::default()
    };
    let hits = engine
        .search(&SearchPredicate::contains_all(["request"]), opts)
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].level, Level::Error);
}

#[test]
fn time_window_filters_results() {
    let engine = engine();
    for i in 0..10i64 {
        engine
            .put(rec(1_000 + i * 100, Level::Info, "api", "tick event"))
            .unwrap();
    }

    let opts = QueryOptions {
        window: Some((1_200, 1_400)),
        ..QueryOptions::default()
    };
    let hits = engine
        .search(&SearchPredicate::contains_all(["tick"]), opts)
        .unwrap();
    let ts: Vec<i64> = hits.iter().map(|r| r.ts_ms).collect();
    assert_eq!(ts, vec![1_400, 1_300, 1_200]);
}

#[test]
fn limit_truncates_from_the_newest() {
    let engine = engine();
    for i in 0..20i64 {
        engine.put(rec(i, Level::Info, "api", "repeated line")).unwrap();
    }

    let opts = QueryOptions {
        limit: Some(5),
        ..QueryOptions::default()
    };
    let hits = engine
        .search(&SearchPredicate::contains_all(["repeated"]), opts)
        .unwrap();
    let ids: Vec<u64> = hits.iter().map(|r| r.seq).collect();
    assert_eq!(ids, vec![19, 18, 17, 16, 15]);
}

#[test]
fn empty_predicate_returns_everything() {
    let engine = engine();
    for i in 0..4i64 {
        engine.put(rec(i, Level::Info, "api", &format!("line {i}"))).unwrap();
    }

    let hits = engine
        .search(&SearchPredicate::default(), QueryOptions::default())
        .unwrap();
    assert_eq!(hits.len(), 4);
}

#[test]
fn search_still_works_after_seal() {
    let engine = engine();
    for i in 0..100i64 {
        engine
            .put(rec(i, Level::Info, "api", &format!("GET /api/orders id={i} status=200")))
            .unwrap();
    }
    engine.seal();
    assert!(engine.is_sealed());

    let hits = engine
        .search(&SearchPredicate::contains_all(["orders"]), QueryOptions::default())
        .unwrap();
    assert_eq!(hits.len(), 100);
    for w in hits.windows(2) {
        assert!(w[0].seq > w[1].seq);
    }

    // Put after seal is rejected; a second seal is a no-op.
    assert!(matches!(
        engine.put(rec(999, Level::Info, "api", "late")),
        Err(StoreError::Sealed)
    ));
    engine.seal();
    assert_eq!(engine.record_count(), 100);
}

#[test]
fn image_roundtrip_supports_search() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("engine.sift");

    let engine = engine();
    for i in 0..50i64 {
        engine
            .put(rec(i, Level::Info, "api", &format!("job {} finished ok", i * 100)))
            .unwrap();
    }
    engine.seal();
    engine.write_image(&path).unwrap();

    let reopened = LogEngine::open_image(EngineConfig::default(), &path).unwrap();
    assert_eq!(reopened.record_count(), 50);

    let hits = reopened
        .search(&SearchPredicate::contains_all(["finished"]), QueryOptions::default())
        .unwrap();
    assert_eq!(hits.len(), 50);

    let one = reopened
        .search(&SearchPredicate::contains_all(["4900"]), QueryOptions::default())
        .unwrap();
    assert_eq!(one.len(), 1);
    assert_eq!(one[0].seq, 49);
}

#[test]
fn clusters_flow_through_the_facade() {
    let engine = engine();
    for i in 0..10i64 {
        engine
            .put(rec(i, Level::Warn, "db", &format!("slow query took {}00 ms", i + 1)))
            .unwrap();
    }

    let clusters = engine.clusters();
    assert_eq!(clusters.len(), 1);
    assert_eq!(clusters[0].count, 10);
    assert_eq!(clusters[0].level, Level::Warn);
}
