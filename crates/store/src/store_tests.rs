use super::*;
use crate::record::{BrokerExtra, Extra, LogExtra};

fn store() -> RecordStore {
    RecordStore::new(StoreConfig::default())
}

fn log_record(ts_ms: i64, level: Level, message: &str) -> NewRecord {
    NewRecord {
        ts_ms,
        level,
        source: "billing-7f9c".into(),
        message: message.into(),
        extra: None,
    }
}

#[test]
fn put_assigns_sequential_ids_in_arrival_order() {
    let store = store();
    for expected in 0..10u64 {
        let seq = store
            .put_wait(log_record(1_000 + expected as i64, Level::Info, "hello"))
            .unwrap();
        assert_eq!(seq, expected);
    }
    assert_eq!(store.record_count(), 10);
}

#[test]
fn get_returns_what_put_stored() {
    let store = store();
    let rec = NewRecord {
        ts_ms: 1_700_000_000_123,
        level: Level::Error,
        source: "api-0".into(),
        message: "GET /api/orders id=100 status=200".into(),
        extra: Some(Extra::Log(LogExtra {
            thread: "main".into(),
            service: "api".into(),
            service_version: "1.0".into(),
            logger: "http".into(),
            correlation_id: Some("123e4567-e89b-12d3-a456-426614174000".into()),
            ..LogExtra::default()
        })),
    };
    let seq = store.put_wait(rec.clone()).unwrap();

    let got = store.get(seq).unwrap().expect("present");
    assert_eq!(got.seq, seq);
    assert_eq!(got.ts_ms, rec.ts_ms);
    assert_eq!(got.level, rec.level);
    assert_eq!(got.source, rec.source);
    assert_eq!(got.message, rec.message);
    assert_eq!(got.extra, rec.extra);
}

#[test]
fn get_of_absent_id_is_none() {
    let store = store();
    store.put_wait(log_record(1, Level::Info, "only one")).unwrap();
    assert!(store.get(5).unwrap().is_none());
}

#[test]
fn messages_survive_template_mutation_before_seal() {
    let store = store();
    let a = store
        .put_wait(log_record(1, Level::Info, "job 700 finished"))
        .unwrap();
    let b = store
        .put_wait(log_record(2, Level::Info, "job 900 finished"))
        .unwrap();

    assert_eq!(store.get(a).unwrap().unwrap().message, "job 700 finished");
    assert_eq!(store.get(b).unwrap().unwrap().message, "job 900 finished");
}

#[test]
fn seal_preserves_every_record() {
    let store = store();
    let mut recs = Vec::new();
    for i in 0..400u64 {
        let rec = NewRecord {
            ts_ms: 1_000 + i as i64 * 13,
            level: if i % 3 == 0 { Level::Warn } else { Level::Info },
            source: format!("pod-{}", i % 4),
            message: format!("GET /api/orders id={i} status=200"),
            extra: None,
        };
        let seq = store.put_wait(rec.clone()).unwrap();
        recs.push((seq, rec));
    }

    let before: Vec<Record> = recs
        .iter()
        .map(|(seq, _)| store.get(*seq).unwrap().unwrap())
        .collect();

    store.seal_wait();
    assert!(store.is_sealed());
    assert_eq!(store.record_count(), 400);

    for ((seq, rec), earlier) in recs.iter().zip(&before) {
        let after = store.get(*seq).unwrap().expect("survived seal");
        assert_eq!(after.message, rec.message);
        assert_eq!(after.level, rec.level);
        assert_eq!(after.source, rec.source);
        assert_eq!(after.ts_ms, rec.ts_ms);
        assert_eq!(&after, earlier, "seal changed observable fields");
    }
}

#[test]
fn put_after_seal_is_rejected_and_seal_is_idempotent() {
    let store = store();
    for i in 0..5 {
        store
            .put_wait(log_record(i, Level::Info, "before seal"))
            .unwrap();
    }
    store.seal_wait();

    let err = store
        .put(log_record(99, Level::Info, "after seal"))
        .unwrap_err();
    assert!(matches!(err, StoreError::Sealed));

    // Second seal resolves immediately and changes nothing.
    store.seal_wait();
    assert_eq!(store.record_count(), 5);
    for i in 0..5u64 {
        assert!(store.get(i).unwrap().is_some());
    }
}

#[test]
fn pending_put_races_with_seal_but_never_tears() {
    let store = store();
    // A put whose message is sent before the seal message must be fully
    // stored; one sent after must be fully rejected.
    let h1 = store.put(log_record(1, Level::Info, "in before")).unwrap();
    let seal = store.seal();
    let id = h1.wait().unwrap();
    seal.wait();

    assert!(store.get(id).unwrap().is_some());
    assert!(matches!(
        store.put_wait(log_record(2, Level::Info, "too late")),
        Err(StoreError::Sealed)
    ));
}

#[test]
fn clusters_converge_after_seal() {
    let store = store();
    for i in 0..1000u64 {
        store
            .put_wait(log_record(
                i as i64,
                Level::Info,
                &format!("GET /api/orders id={i} status=200"),
            ))
            .unwrap();
    }
    store.seal_wait();

    let clusters = store.clusters();
    assert_eq!(clusters.len(), 1, "clusters: {clusters:?}");
    assert_eq!(clusters[0].count, 1000);
    assert_eq!(clusters[0].level, Level::Info);
    assert_eq!(clusters[0].source, "billing-7f9c");
    assert!(clusters[0].template.contains("GET /api/orders id="));

    // And every record still reads back verbatim.
    for i in [0u64, 1, 500, 999] {
        let rec = store.get(i).unwrap().unwrap();
        assert_eq!(rec.message, format!("GET /api/orders id={i} status=200"));
    }
}

#[test]
fn clusters_are_visible_while_open() {
    let store = store();
    store
        .put_wait(log_record(1, Level::Error, "disk full on /var"))
        .unwrap();
    store
        .put_wait(log_record(2, Level::Error, "disk full on /opt"))
        .unwrap();

    let clusters = store.clusters();
    assert_eq!(clusters.len(), 1);
    assert_eq!(clusters[0].count, 2);
    assert_eq!(clusters[0].level, Level::Error);
}

#[test]
fn earlier_than_base_timestamps_recover_as_base() {
    let store = store();
    store.put_wait(log_record(5_000, Level::Info, "first")).unwrap();
    let late = store.put_wait(log_record(3_000, Level::Info, "early")).unwrap();

    assert_eq!(store.get(late).unwrap().unwrap().ts_ms, 5_000);

    store.seal_wait();
    assert_eq!(store.get(late).unwrap().unwrap().ts_ms, 5_000);
}

#[test]
fn broker_records_group_into_their_own_segments() {
    let store = store();
    let broker = NewRecord {
        ts_ms: 10,
        level: Level::Message,
        source: "orders-consumer".into(),
        message: "payload received".into(),
        extra: Some(Extra::Broker(BrokerExtra {
            topic: "orders.v1".into(),
            offset: 7,
            partition: 2,
            event_id: "orders.v1/2/7".into(),
            ..BrokerExtra::default()
        })),
    };
    let a = store.put_wait(broker.clone()).unwrap();
    let b = store.put_wait(log_record(11, Level::Info, "plain log")).unwrap();
    store.seal_wait();

    let got_a = store.get(a).unwrap().unwrap();
    assert_eq!(got_a.extra, broker.extra);
    assert_eq!(got_a.level, Level::Message);

    let got_b = store.get(b).unwrap().unwrap();
    assert!(got_b.extra.is_none());
}

#[test]
fn ids_are_ascending_in_both_states() {
    let store = store();
    for i in 0..40 {
        let level = if i % 2 == 0 { Level::Info } else { Level::Error };
        store.put_wait(log_record(i, level, "alternating levels")).unwrap();
    }

    let expected: Vec<u64> = (0..40).collect();
    assert_eq!(store.ids(), expected);

    // Sealing splits records across per-level segments; the merged id
    // stream must still come back whole and ordered.
    store.seal_wait();
    assert_eq!(store.ids(), expected);
}

#[test]
fn time_range_lookup_works_on_the_sealed_column() {
    let store = store();
    for i in 0..50u64 {
        store
            .put_wait(log_record(1_000 + i as i64 * 10, Level::Info, "tick"))
            .unwrap();
    }
    assert!(matches!(
        store.ids_in_time_range(0, 10),
        Err(StoreError::NotSealed)
    ));

    store.seal_wait();
    let ids = store.ids_in_time_range(1_100, 1_140).unwrap();
    assert_eq!(ids, vec![10, 11, 12, 13, 14]);
}
