use super::*;

#[test]
fn set_and_get_across_word_boundaries() {
    let mut row = BitRow::new();
    for bit in [0, 1, 63, 64, 65, 127, 128, 1000] {
        row.set(bit);
    }

    for bit in [0, 1, 63, 64, 65, 127, 128, 1000] {
        assert!(row.get(bit), "bit {bit} should be set");
    }
    for bit in [2, 62, 66, 129, 999, 1001] {
        assert!(!row.get(bit), "bit {bit} should be clear");
    }
    assert_eq!(row.count_ones(), 8);
}

#[test]
fn get_past_the_end_is_clear() {
    let mut row = BitRow::new();
    row.set(10);
    assert!(!row.get(640));
}

#[test]
fn and_assign_treats_missing_words_as_zero() {
    let mut a = BitRow::new();
    a.set(5);
    a.set(200);

    let mut b = BitRow::new();
    b.set(5);
    // b has no word covering bit 200.

    a.and_assign(&b);
    assert!(a.get(5));
    assert!(!a.get(200));
}

#[test]
fn or_assign_grows_to_the_wider_row() {
    let mut a = BitRow::new();
    a.set(1);

    let mut b = BitRow::new();
    b.set(500);

    a.or_assign(&b);
    assert!(a.get(1));
    assert!(a.get(500));
}

#[test]
fn halve_folds_upper_half_onto_lower() {
    let mut row = BitRow::new();
    row.set(3);
    row.set(64 + 7);
    row.grow_to_words(2);

    row.halve();
    assert_eq!(row.len_words(), 1);
    assert!(row.get(3));
    assert!(row.get(7));
}

#[test]
fn double_then_halve_is_identity_on_membership() {
    let mut row = BitRow::new();
    row.set(3);
    row.set(40);
    row.grow_to_words(1);

    let before = row.clone();
    row.double();
    assert_eq!(row.len_words(), 2);
    // Both copies carry the bits.
    assert!(row.get(3) && row.get(64 + 3));

    row.halve();
    assert_eq!(row, before);
}

#[test]
fn iter_ones_desc_yields_strictly_descending_positions() {
    let mut row = BitRow::new();
    let bits = [0, 17, 63, 64, 190, 191];
    for &b in &bits {
        row.set(b);
    }

    let seen: Vec<usize> = row.iter_ones_desc().collect();
    let mut expected: Vec<usize> = bits.to_vec();
    expected.reverse();
    assert_eq!(seen, expected);
}

#[test]
fn density_reflects_width() {
    let mut row = BitRow::new();
    row.set(0);
    row.grow_to_words(4);
    assert!((row.density() - 1.0 / 256.0).abs() < 1e-9);
}

#[test]
fn compact_pads_rows_to_common_power_of_two() {
    let mut mat = BitMat::new(4);
    mat.set(0, 5);
    mat.set(1, 300); // 5 words, pads to 8
    mat.set(2, 64);

    mat.compact(0.30, 0.80);
    assert!(mat.is_compacted());

    // Sparse rows collapse all the way down.
    for r in 0..3 {
        assert_eq!(mat.ranked_row(r).bits.len_words(), 1);
    }
}

#[test]
fn compact_keeps_dense_rows_wide_until_density_exceeds_target() {
    let mut mat = BitMat::new(1);
    // Fill ~half the bits of a 2-word row: density 0.5 > 0.30, so the row
    // must not halve.
    for bit in 0..64 {
        mat.set(0, bit * 2);
    }

    mat.compact(0.30, 0.80);
    let row = mat.ranked_row(0);
    assert_eq!(row.rank, 0);
    assert_eq!(row.bits.len_words(), 2);
}

#[test]
fn compact_collapses_very_dense_rows_to_one_word() {
    let mut mat = BitMat::new(1);
    for bit in 0..240 {
        mat.set(0, bit);
    }

    // Density 240/256 > 0.80: collapse to a single word regardless.
    mat.compact(0.30, 0.80);
    let row = mat.ranked_row(0);
    assert_eq!(row.bits.len_words(), 1);
    assert_eq!(row.rank, 2);
}

#[test]
fn rank_membership_covers_all_original_positions() {
    let mut mat = BitMat::new(1);
    let positions = [3, 130, 258, 400];
    for &p in &positions {
        mat.set(0, p);
    }

    mat.compact(0.30, 0.80);
    let row = mat.ranked_row(0);

    let candidates = row.candidates_desc(512);
    for &p in &positions {
        assert!(candidates.contains(&p), "position {p} lost by compaction");
    }
    // Descending order.
    for w in candidates.windows(2) {
        assert!(w[0] > w[1]);
    }
}

#[test]
fn cross_rank_and_preserves_common_positions() {
    // Row a stays wide (rank 0), row b collapses. Their AND must still
    // contain every position present in both originals.
    let mut a = BitRow::new();
    let mut b = BitRow::new();
    for bit in 0..128 {
        if bit % 2 == 0 {
            a.set(bit);
        }
    }
    a.set(77);
    b.set(77);
    b.set(200);
    a.grow_to_words(4);
    b.grow_to_words(4);

    let mut ra = RankedRow { bits: a, rank: 0 };
    let mut rb = RankedRow { bits: b, rank: 0 };
    // Manually compact b twice: 4 words -> 1 word, rank 2.
    rb.bits.halve();
    rb.bits.halve();
    rb.rank = 2;

    ra.and_with(&rb);
    assert_eq!(ra.rank, 0);
    assert!(ra.bits.get(77));
}

#[test]
fn or_with_unions_across_ranks() {
    let mut a = BitRow::new();
    a.set(10);
    a.grow_to_words(2);

    let mut b = BitRow::new();
    b.set(64 + 30);
    b.grow_to_words(2);
    let mut rb = RankedRow { bits: b, rank: 0 };
    rb.bits.halve();
    rb.rank = 1;

    let mut ra = RankedRow { bits: a, rank: 0 };
    ra.or_with(&rb);

    let candidates = ra.candidates_desc(128);
    assert!(candidates.contains(&10));
    // b's bit 94 survives as a candidate (in either segment).
    assert!(candidates.contains(&30) || candidates.contains(&(64 + 30)));
}

#[test]
fn empty_result_rows_report_all_zero() {
    let mut a = BitRow::new();
    a.set(3);
    let mut b = BitRow::new();
    b.set(4);

    a.and_assign(&b);
    assert!(a.is_all_zero());
}
