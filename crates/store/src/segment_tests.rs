use super::*;

fn build_with_ids(ids: &[u64]) -> Segment {
    let records: Vec<(u64, i64, Vec<u8>)> = ids
        .iter()
        .map(|&id| (id, 1_000 + id as i64, vec![id as u8; 3]))
        .collect();
    Segment::build(DomainKind::Log, Level::Info, 0, &records)
}

#[test]
fn lookup_finds_every_id() {
    // Gappy ids across several checkpoint strides.
    let ids: Vec<u64> = (0..500u64).map(|i| i * 3 + 7).collect();
    let seg = build_with_ids(&ids);

    assert_eq!(seg.record_count(), 500);
    for (index, &id) in ids.iter().enumerate() {
        assert_eq!(seg.lookup(id), Some(index), "id {id}");
    }
}

#[test]
fn lookup_rejects_absent_and_out_of_range_ids() {
    let ids: Vec<u64> = (0..300u64).map(|i| i * 2 + 10).collect();
    let seg = build_with_ids(&ids);

    // Between stored ids.
    assert_eq!(seg.lookup(11), None);
    assert_eq!(seg.lookup(257), None);
    // Below and above the range.
    assert_eq!(seg.lookup(9), None);
    assert_eq!(seg.lookup(10_000), None);
}

#[test]
fn record_bytes_frame_each_record() {
    let records = vec![
        (1u64, 0i64, vec![0xAA, 0xBB]),
        (2, 0, vec![]),
        (5, 0, vec![0xCC]),
    ];
    let seg = Segment::build(DomainKind::Log, Level::Info, 0, &records);

    assert_eq!(seg.record_bytes(0), &[0xAA, 0xBB]);
    assert_eq!(seg.record_bytes(1), &[] as &[u8]);
    assert_eq!(seg.record_bytes(2), &[0xCC]);
}

#[test]
fn checkpoints_are_placed_every_stride() {
    let ids: Vec<u64> = (0..CHECKPOINT_STRIDE as u64 * 2 + 5).collect();
    let seg = build_with_ids(&ids);

    assert_eq!(seg.checkpoint_ids().len(), 3);
    assert_eq!(seg.checkpoint_ids()[0], 0);
    assert_eq!(seg.checkpoint_ids()[1], CHECKPOINT_STRIDE as u64);
    // Checkpoint lookups take the fast path and must still be right.
    assert_eq!(
        seg.lookup(CHECKPOINT_STRIDE as u64),
        Some(CHECKPOINT_STRIDE)
    );
}

#[test]
fn single_record_segment_works() {
    let seg = build_with_ids(&[42]);
    assert_eq!(seg.record_count(), 1);
    assert_eq!(seg.lookup(42), Some(0));
    assert_eq!(seg.lookup(41), None);
    assert!(seg.delta_stream().is_empty());
}

#[test]
fn from_parts_rebuilds_an_equivalent_segment() {
    let ids: Vec<u64> = (0..CHECKPOINT_STRIDE as u64 + 40).map(|i| i * 5).collect();
    let mut seg = build_with_ids(&ids);

    let timestamps = T64::from_compressed(seg.timestamps_mut().compressed_data().to_vec()).unwrap();
    let rebuilt = Segment::from_parts(
        seg.domain,
        seg.level,
        seg.source_id,
        seg.blob().to_vec(),
        seg.offsets().to_vec(),
        seg.checkpoint_ids().to_vec(),
        seg.checkpoint_offsets().to_vec(),
        seg.delta_stream().to_vec(),
        timestamps,
    )
    .expect("valid parts");

    for (index, &id) in ids.iter().enumerate() {
        assert_eq!(rebuilt.lookup(id), Some(index));
        assert_eq!(rebuilt.record_bytes(index), seg.record_bytes(index));
    }
}

#[test]
fn ids_reproduce_the_build_input() {
    let ids: Vec<u64> = (0..300u64).map(|i| i * 7 + 3).collect();
    let seg = build_with_ids(&ids);
    assert_eq!(seg.ids(), ids);

    assert_eq!(build_with_ids(&[9]).ids(), vec![9]);
}

#[test]
fn ids_in_time_range_selects_by_timestamp() {
    // build_with_ids stamps each record with 1000 + id.
    let seg = build_with_ids(&[2, 4, 6, 8]);

    assert_eq!(seg.ids_in_time_range(1_004, 1_006), vec![4, 6]);
    assert_eq!(seg.ids_in_time_range(0, 999), Vec::<u64>::new());
    assert_eq!(seg.ids_in_time_range(i64::MIN, i64::MAX), vec![2, 4, 6, 8]);
}

#[test]
fn sealed_storage_find_probes_all_segments() {
    let a = build_with_ids(&[1, 4, 9]);
    let b = build_with_ids(&[2, 3, 11]);
    let storage = SealedStorage {
        segments: vec![a, b],
        strings: Vec::new(),
        uuids: Vec::new(),
        templates: HashMap::new(),
        clusters: Vec::new(),
        base_ts: 0,
    };

    assert_eq!(storage.record_count(), 6);
    let (seg, idx) = storage.find(3).expect("present");
    assert_eq!(seg.record_bytes(idx), &[3, 3, 3]);
    assert!(storage.find(7).is_none());
}
