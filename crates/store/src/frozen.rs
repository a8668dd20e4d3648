use hashbrown::HashMap;
use log::warn;

use sift_codec::varint::{read_uvarint, write_uvarint};
use sift_engine::{DrainConfig, DrainMiner, TemplateToken, tokenize};

use crate::encode::{
    Dicts, decode_open, delta_ts, read_extra, read_positions, read_var_value, write_extra,
    write_positions, write_var_value,
};
use crate::error::StoreError;
use crate::record::{Level, Record};
use crate::segment::{ClusterSummary, SealedStorage, Segment};
use crate::templates::TemplateRegistry;

/// Encode a record in the frozen (packed-segment) format. Domain, level,
/// and source live in the segment header and are not repeated here.
pub fn encode_frozen(
    rec: &Record,
    tokens: &[String],
    template_id: u64,
    wildcards: &[usize],
    base_ts: i64,
    dicts: &Dicts,
) -> Vec<u8> {
    let mut buf = Vec::with_capacity(32);

    write_uvarint(&mut buf, delta_ts(rec.ts_ms, base_ts));
    write_uvarint(&mut buf, template_id);
    write_positions(&mut buf, wildcards);
    write_extra(&mut buf, rec.extra.as_ref(), dicts);
    for &pos in wildcards {
        write_var_value(&mut buf, &tokens[pos], dicts);
    }

    buf
}

/// Decode one frozen record against a segment's header and the sealed
/// store's frozen tables.
pub fn decode_frozen(
    seq: u64,
    mut input: &[u8],
    level: Level,
    source: String,
    storage: &SealedStorage,
) -> Result<Record, StoreError> {
    let input = &mut input;

    let delta = read_uvarint(input)?;
    let template_id = read_uvarint(input)?;
    let positions = read_positions(input)?;
    let extra = read_extra(input, storage)?;

    let mut values = Vec::with_capacity(positions.len());
    for _ in 0..positions.len() {
        values.push(read_var_value(input, storage)?);
    }

    let tokens = storage
        .templates
        .get(&template_id)
        .ok_or(StoreError::UnknownTemplate(template_id))?;
    let message = crate::encode::rebuild_message(tokens, None, &positions, &values)?;

    Ok(Record {
        seq,
        ts_ms: storage.base_ts + delta as i64,
        level,
        source,
        message,
        extra,
    })
}

/// Seal-time compaction: decode the open map, re-mine templates from
/// scratch, re-encode every record in the frozen format, and pack the
/// result into per-(domain, level, source) segments.
///
/// Records that fail to decode are dropped with a warning; the seal
/// itself still succeeds.
pub fn build_sealed(
    entries: Vec<(u64, Vec<u8>)>,
    templates: &TemplateRegistry,
    dicts: &Dicts,
    base_ts: i64,
    drain: DrainConfig,
) -> SealedStorage {
    // Pass 1: decode with the open-state templates.
    let mut records: Vec<Record> = Vec::with_capacity(entries.len());
    for (id, bytes) in &entries {
        match decode_open(*id, bytes, templates, dicts, base_ts) {
            Ok(rec) => records.push(rec),
            Err(err) => warn!("seal: dropping record {id}: {err}"),
        }
    }

    // Pass 2: a fresh miner over the final corpus collapses templates
    // whose early wildcard decisions no longer minimize cluster count.
    let mut miner = DrainMiner::new(drain);
    let final_templates = TemplateRegistry::new();
    let mut assignments: Vec<(Vec<String>, u64)> = Vec::with_capacity(records.len());
    let mut first_seen: HashMap<u64, (Level, String)> = HashMap::new();

    for rec in &records {
        let tokens = tokenize(&rec.message);
        let outcome = miner.learn(&tokens);
        final_templates.apply(&outcome);
        first_seen
            .entry(outcome.template_id)
            .or_insert_with(|| (rec.level, rec.source.clone()));
        assignments.push((tokens, outcome.template_id));
    }

    let frozen_templates = final_templates.freeze();

    // Pass 3: frozen re-encode, grouped by segment key. Iterating records
    // in ascending id order keeps every group ascending too.
    let mut groups: HashMap<(u64, u8, u32), Vec<(u64, i64, Vec<u8>)>> = HashMap::new();
    for (rec, (tokens, template_id)) in records.iter().zip(&assignments) {
        let wildcards: Vec<usize> = frozen_templates
            .get(template_id)
            .map(|tokens| wildcard_positions(tokens))
            .unwrap_or_default();

        let bytes = encode_frozen(rec, tokens, *template_id, &wildcards, base_ts, dicts);
        let source_id = dicts.strings.intern(&rec.source);
        let key = (rec.domain().tag(), rec.level.ordinal(), source_id);
        groups.entry(key).or_default().push((rec.seq, rec.ts_ms, bytes));
    }

    let mut keys: Vec<(u64, u8, u32)> = groups.keys().copied().collect();
    keys.sort_unstable();

    let mut segments = Vec::with_capacity(keys.len());
    for key in keys {
        let (domain_tag, level_ord, source_id) = key;
        let group = &groups[&key];
        let domain = crate::record::DomainKind::from_tag(domain_tag).expect("own tag");
        let level = Level::from_ordinal(u64::from(level_ord)).expect("own ordinal");
        let mut segment = Segment::build(domain, level, source_id, group);
        // Flush the timestamp column so persisted images can take its
        // packed bytes without re-encoding.
        segment.timestamps_mut().compressed_data();
        segments.push(segment);
    }

    let clusters = summarize_clusters(&miner, &first_seen);

    SealedStorage {
        segments,
        strings: dicts.strings.freeze(),
        uuids: dicts.uuids.freeze(),
        templates: frozen_templates,
        clusters,
        base_ts,
    }
}

/// Roll the miner's clusters up into summaries, most common first.
pub fn summarize_clusters(
    miner: &DrainMiner,
    first_seen: &HashMap<u64, (Level, String)>,
) -> Vec<ClusterSummary> {
    let mut out: Vec<ClusterSummary> = miner
        .clusters()
        .map(|c| {
            let (level, source) = first_seen
                .get(&c.template_id)
                .cloned()
                .unwrap_or((Level::Unknown, String::new()));
            ClusterSummary {
                count: c.seen,
                level,
                template: c.template_text(),
                source,
            }
        })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.template.cmp(&b.template)));
    out
}

/// Tokens' wildcard positions, used by callers that hold a frozen table.
pub fn wildcard_positions(tokens: &[TemplateToken]) -> Vec<usize> {
    tokens
        .iter()
        .enumerate()
        .filter(|(_, t)| t.is_wildcard())
        .map(|(i, _)| i)
        .collect()
}
