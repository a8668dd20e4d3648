use uuid::Uuid;

use sift_codec::DecodeError;
use sift_codec::varint::{
    read_str, read_uvarint, read_uvarint32, read_varlong, write_str, write_uvarint, write_varlong,
};
use sift_engine::{TemplateToken, is_uuid_shaped, join_tokens};

use crate::dict::{StringDict, UuidDict};
use crate::error::StoreError;
use crate::record::{BrokerExtra, DomainKind, Extra, Level, LogExtra, NewRecord, Record};
use crate::templates::TemplateRegistry;

/// The live dictionaries, shared by the writer and the sealer.
pub struct Dicts {
    pub strings: StringDict,
    pub uuids: UuidDict,
}

impl Dicts {
    pub fn new() -> Self {
        Self {
            strings: StringDict::new(),
            uuids: UuidDict::new(),
        }
    }
}

impl Default for Dicts {
    fn default() -> Self {
        Self::new()
    }
}

/// Dictionary read side, satisfied by both the live dictionaries and the
/// frozen arrays of a sealed store.
pub trait DictRead {
    fn string(&self, id: u32) -> Option<String>;
    fn uuid(&self, id: u32) -> Option<Uuid>;
}

impl DictRead for Dicts {
    fn string(&self, id: u32) -> Option<String> {
        self.strings.get(id).map(|s| s.to_string())
    }

    fn uuid(&self, id: u32) -> Option<Uuid> {
        self.uuids.get(id)
    }
}

/// Encode a record in the open (mutable-map) format:
///
///   domain_tag, delta_ts, template_id, var_count, pos deltas,
///   level, source_id, extra block, var values
///
/// `tokens` is the tokenized message and `wildcards` the template's
/// wildcard positions at this moment; the values stored are the message
/// tokens at those positions.
pub fn encode_open(
    rec: &NewRecord,
    tokens: &[String],
    template_id: u64,
    wildcards: &[usize],
    base_ts: i64,
    dicts: &Dicts,
) -> Vec<u8> {
    let mut buf = Vec::with_capacity(64);

    write_uvarint(&mut buf, rec.domain().tag());
    write_uvarint(&mut buf, delta_ts(rec.ts_ms, base_ts));
    write_uvarint(&mut buf, template_id);
    write_positions(&mut buf, wildcards);
    write_uvarint(&mut buf, u64::from(rec.level.ordinal()));
    write_uvarint(&mut buf, u64::from(dicts.strings.intern(&rec.source)));
    write_extra(&mut buf, rec.extra.as_ref(), dicts);
    for &pos in wildcards {
        write_var_value(&mut buf, &tokens[pos], dicts);
    }

    buf
}

/// Decode one open-format record. The message is rebuilt from the
/// template registry; wildcard positions the record itself did not store
/// were literals at encode time and resolve through the template's
/// replaced-literal map.
pub fn decode_open(
    seq: u64,
    mut input: &[u8],
    templates: &TemplateRegistry,
    dicts: &dyn DictRead,
    base_ts: i64,
) -> Result<Record, StoreError> {
    let input = &mut input;

    let domain_tag = read_uvarint(input)?;
    DomainKind::from_tag(domain_tag).ok_or(DecodeError::UnknownTag(domain_tag))?;

    let delta = read_uvarint(input)?;
    let template_id = read_uvarint(input)?;
    let positions = read_positions(input)?;

    let level_ord = read_uvarint(input)?;
    let level = Level::from_ordinal(level_ord).ok_or(DecodeError::UnknownTag(level_ord))?;

    let source_id = read_uvarint32(input)?;
    let source = dicts
        .string(source_id)
        .ok_or(DecodeError::ValueOutOfRange(u64::from(source_id)))?;

    let extra = read_extra(input, dicts)?;

    let mut values = Vec::with_capacity(positions.len());
    for _ in 0..positions.len() {
        values.push(read_var_value(input, dicts)?);
    }

    let template = templates
        .get(template_id)
        .ok_or(StoreError::UnknownTemplate(template_id))?;
    let message = rebuild_message(&template.tokens, Some(&template.replaced), &positions, &values)?;

    Ok(Record {
        seq,
        ts_ms: base_ts + delta as i64,
        level,
        source,
        message,
        extra,
    })
}

#[inline]
pub fn delta_ts(ts_ms: i64, base_ts: i64) -> u64 {
    // Timestamps before the first-seen base clamp to it.
    ts_ms.saturating_sub(base_ts).max(0) as u64
}

/// Variable positions as count + gap-encoded deltas (first absolute).
pub fn write_positions(buf: &mut Vec<u8>, positions: &[usize]) {
    write_uvarint(buf, positions.len() as u64);
    let mut prev = 0usize;
    for (i, &pos) in positions.iter().enumerate() {
        let delta = if i == 0 { pos } else { pos - prev };
        write_uvarint(buf, delta as u64);
        prev = pos;
    }
}

pub fn read_positions(input: &mut &[u8]) -> Result<Vec<usize>, DecodeError> {
    let count = read_uvarint(input)? as usize;
    if count > input.len() {
        // Each position takes at least one byte; anything wider is junk.
        return Err(DecodeError::ValueOutOfRange(count as u64));
    }

    let mut positions = Vec::with_capacity(count);
    let mut pos = 0usize;
    for i in 0..count {
        let delta = read_uvarint(input)? as usize;
        pos = if i == 0 { delta } else { pos + delta };
        positions.push(pos);
    }
    Ok(positions)
}

/// Rebuild a message from template tokens and the record's stored values.
pub fn rebuild_message(
    tokens: &[TemplateToken],
    replaced: Option<&hashbrown::HashMap<usize, String>>,
    positions: &[usize],
    values: &[String],
) -> Result<String, StoreError> {
    debug_assert_eq!(positions.len(), values.len());

    let mut out: Vec<&str> = Vec::with_capacity(tokens.len());
    let mut stored = positions.iter().zip(values).peekable();

    for (i, token) in tokens.iter().enumerate() {
        if let Some(&(&pos, value)) = stored.peek()
            && pos == i
        {
            out.push(value);
            stored.next();
            continue;
        }
        match token {
            TemplateToken::Literal(l) => out.push(l),
            TemplateToken::Wildcard => {
                // Wildcarded after this record was encoded; the original
                // literal lives in the template's replaced map.
                let literal = replaced
                    .and_then(|r| r.get(&i))
                    .ok_or(DecodeError::ValueOutOfRange(i as u64))?;
                out.push(literal);
            }
        }
    }

    if stored.next().is_some() {
        // A stored position pointed past the template.
        return Err(StoreError::Corrupt(DecodeError::ValueOutOfRange(
            tokens.len() as u64,
        )));
    }

    Ok(join_tokens(&out))
}

// Tagged variable values.

const VALUE_LONG: u64 = 1;
const VALUE_UUID: u64 = 2;
const VALUE_STRING: u64 = 3;

/// Encode one variable token. Numbers and UUIDs only take the compact
/// form when re-rendering them reproduces the token byte-for-byte;
/// anything else stays a string.
pub fn write_var_value(buf: &mut Vec<u8>, token: &str, dicts: &Dicts) {
    if let Ok(v) = token.parse::<i64>()
        && v.to_string() == token
    {
        write_uvarint(buf, VALUE_LONG);
        write_varlong(buf, v);
        return;
    }

    if is_uuid_shaped(token)
        && let Ok(u) = Uuid::try_parse(token)
        && u.hyphenated().to_string() == token
    {
        write_uvarint(buf, VALUE_UUID);
        write_uvarint(buf, u64::from(dicts.uuids.intern(u)));
        return;
    }

    write_uvarint(buf, VALUE_STRING);
    write_str(buf, token);
}

pub fn read_var_value(input: &mut &[u8], dicts: &dyn DictRead) -> Result<String, StoreError> {
    let tag = read_uvarint(input)?;
    match tag {
        VALUE_LONG => Ok(read_varlong(input)?.to_string()),
        VALUE_UUID => {
            let id = read_uvarint32(input)?;
            let u = dicts
                .uuid(id)
                .ok_or(DecodeError::ValueOutOfRange(u64::from(id)))?;
            Ok(u.hyphenated().to_string())
        }
        VALUE_STRING => Ok(read_str(input)?),
        other => Err(StoreError::Corrupt(DecodeError::UnknownTag(other))),
    }
}

// Nullable references: 0 null, 1 uuid dict id, 2 string dict id.

const REF_NULL: u64 = 0;
const REF_UUID: u64 = 1;
const REF_STRING: u64 = 2;

pub fn write_nullable(buf: &mut Vec<u8>, value: Option<&str>, dicts: &Dicts) {
    let Some(s) = value else {
        write_uvarint(buf, REF_NULL);
        return;
    };

    if is_uuid_shaped(s)
        && let Ok(u) = Uuid::try_parse(s)
        && u.hyphenated().to_string() == s
    {
        write_uvarint(buf, REF_UUID);
        write_uvarint(buf, u64::from(dicts.uuids.intern(u)));
        return;
    }

    write_uvarint(buf, REF_STRING);
    write_uvarint(buf, u64::from(dicts.strings.intern(s)));
}

pub fn read_nullable(
    input: &mut &[u8],
    dicts: &dyn DictRead,
) -> Result<Option<String>, StoreError> {
    let tag = read_uvarint(input)?;
    match tag {
        REF_NULL => Ok(None),
        REF_UUID => {
            let id = read_uvarint32(input)?;
            let u = dicts
                .uuid(id)
                .ok_or(DecodeError::ValueOutOfRange(u64::from(id)))?;
            Ok(Some(u.hyphenated().to_string()))
        }
        REF_STRING => {
            let id = read_uvarint32(input)?;
            let s = dicts
                .string(id)
                .ok_or(DecodeError::ValueOutOfRange(u64::from(id)))?;
            Ok(Some(s))
        }
        other => Err(StoreError::Corrupt(DecodeError::UnknownTag(other))),
    }
}

fn write_string_ref(buf: &mut Vec<u8>, s: &str, dicts: &Dicts) {
    write_uvarint(buf, u64::from(dicts.strings.intern(s)));
}

fn read_string_ref(input: &mut &[u8], dicts: &dyn DictRead) -> Result<String, StoreError> {
    let id = read_uvarint32(input)?;
    dicts
        .string(id)
        .ok_or_else(|| StoreError::Corrupt(DecodeError::ValueOutOfRange(u64::from(id))))
}

// Extra blocks, shared between the open and frozen formats.

const EXTRA_ABSENT: u64 = 0;
const EXTRA_PRESENT: u64 = 1;

pub fn write_extra(buf: &mut Vec<u8>, extra: Option<&Extra>, dicts: &Dicts) {
    let Some(extra) = extra else {
        write_uvarint(buf, EXTRA_ABSENT);
        return;
    };
    write_uvarint(buf, EXTRA_PRESENT);
    write_uvarint(buf, extra.domain().tag());

    match extra {
        Extra::Log(log) => {
            write_string_ref(buf, &log.thread, dicts);
            write_string_ref(buf, &log.service, dicts);
            write_string_ref(buf, &log.service_version, dicts);
            write_string_ref(buf, &log.logger, dicts);
            write_nullable(buf, log.correlation_id.as_deref(), dicts);
            write_nullable(buf, log.request_id.as_deref(), dicts);
            write_nullable(buf, log.error_message.as_deref(), dicts);
            write_nullable(buf, log.stack_trace.as_deref(), dicts);
        }
        Extra::Broker(msg) => {
            write_string_ref(buf, &msg.topic, dicts);
            write_nullable(buf, msg.key.as_deref(), dicts);
            write_varlong(buf, msg.offset);
            write_varlong(buf, i64::from(msg.partition));
            write_string_ref(buf, &msg.headers, dicts);
            write_nullable(buf, msg.correlation_id.as_deref(), dicts);
            write_nullable(buf, msg.request_id.as_deref(), dicts);
            write_string_ref(buf, &msg.event_id, dicts);
        }
    }
}

pub fn read_extra(input: &mut &[u8], dicts: &dyn DictRead) -> Result<Option<Extra>, StoreError> {
    let tag = read_uvarint(input)?;
    match tag {
        EXTRA_ABSENT => return Ok(None),
        EXTRA_PRESENT => {}
        other => return Err(StoreError::Corrupt(DecodeError::UnknownTag(other))),
    }

    let kind = read_uvarint(input)?;
    let kind = DomainKind::from_tag(kind).ok_or(DecodeError::UnknownTag(kind))?;

    let extra = match kind {
        DomainKind::Log => Extra::Log(LogExtra {
            thread: read_string_ref(input, dicts)?,
            service: read_string_ref(input, dicts)?,
            service_version: read_string_ref(input, dicts)?,
            logger: read_string_ref(input, dicts)?,
            correlation_id: read_nullable(input, dicts)?,
            request_id: read_nullable(input, dicts)?,
            error_message: read_nullable(input, dicts)?,
            stack_trace: read_nullable(input, dicts)?,
        }),
        DomainKind::Broker => Extra::Broker(BrokerExtra {
            topic: read_string_ref(input, dicts)?,
            key: read_nullable(input, dicts)?,
            offset: read_varlong(input)?,
            partition: read_varlong(input)? as i32,
            headers: read_string_ref(input, dicts)?,
            correlation_id: read_nullable(input, dicts)?,
            request_id: read_nullable(input, dicts)?,
            event_id: read_string_ref(input, dicts)?,
        }),
    };

    Ok(Some(extra))
}

#[cfg(test)]
#[path = "encode_tests.rs"]
mod tests;
