use std::{
    fs::{self, File},
    io::{self, BufWriter, Error, ErrorKind, Write},
    mem,
    path::Path,
};

use bytemuck::{Pod, Zeroable, bytes_of, cast_slice, from_bytes};
use crc32fast::Hasher;
use hashbrown::HashMap;
use memmap2::MmapOptions;
use tempfile::NamedTempFile;
use uuid::Uuid;

use sift_codec::T64;
use sift_codec::varint::{read_str, read_uvarint, write_str, write_uvarint};
use sift_engine::TemplateToken;

use crate::record::{DomainKind, Level};
use crate::segment::{ClusterSummary, SealedStorage, Segment};

/// Magic number: "SIFT" in little-endian.
pub const IMAGE_MAGIC: u32 = 0x5446_4953;

pub const IMAGE_VERSION: u32 = 1;

/// Alignment for sections holding u32/u64 arrays read via `cast_slice`.
const SECTION_ALIGNMENT: u64 = 8;

/// Align `value` up to the next multiple of `alignment`.
#[inline]
fn align_up(value: u64, alignment: u64) -> u64 {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}

/// Describes a section within the image file. All offsets are absolute
/// byte offsets from file start; aligned sections start at 8-byte
/// boundaries.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct SectionDesc {
    pub offset: u64,
    pub len: u64,
    pub flags: u32,
    pub _reserved: u32,
}

impl SectionDesc {
    #[inline]
    fn new(offset: u64, len: u64) -> Self {
        Self {
            offset,
            len,
            flags: 0,
            _reserved: 0,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ImageHeader {
    /// Magic number (IMAGE_MAGIC).
    pub magic: u32,
    pub version: u32,
    /// Size of this header in bytes, for forward compatibility.
    pub header_size: u32,
    /// CRC32 of the header bytes with this field set to 0.
    pub header_crc32: u32,
    pub flags_bits: u32,
    pub segment_count: u32,
    pub record_count: u64,
    /// Delta base for every timestamp in the image.
    pub base_ts: i64,
    pub reserved: [u8; 16],
    /// Varint-framed string dictionary.
    pub strings: SectionDesc,
    /// Packed 16-byte UUID dictionary.
    pub uuids: SectionDesc,
    /// Varint-framed frozen template table.
    pub templates: SectionDesc,
    /// Varint-framed cluster summaries.
    pub clusters: SectionDesc,
    /// [SegmentMeta] array.
    pub segment_metas: SectionDesc,
}

/// Fixed-size descriptor of one packed segment; its sections point into
/// the tail of the file.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct SegmentMeta {
    pub domain_tag: u32,
    pub level: u32,
    pub source_id: u32,
    pub record_count: u32,
    pub blob: SectionDesc,
    /// u32 LE record offsets, `record_count + 1` entries.
    pub offsets: SectionDesc,
    /// u64 LE checkpoint ids.
    pub checkpoint_ids: SectionDesc,
    /// u32 LE delta-stream offsets, one per checkpoint.
    pub checkpoint_offsets: SectionDesc,
    /// Varint gap stream.
    pub delta_stream: SectionDesc,
    /// Packed T64 timestamp column.
    pub timestamps: SectionDesc,
}

fn encode_strings(strings: &[String]) -> Vec<u8> {
    let mut buf = Vec::new();
    write_uvarint(&mut buf, strings.len() as u64);
    for s in strings {
        write_str(&mut buf, s);
    }
    buf
}

fn encode_uuids(uuids: &[Uuid]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(uuids.len() * 16);
    for u in uuids {
        buf.extend_from_slice(u.as_bytes());
    }
    buf
}

const TOKEN_LITERAL: u64 = 0;
const TOKEN_WILDCARD: u64 = 1;

fn encode_templates(templates: &HashMap<u64, Vec<TemplateToken>>) -> Vec<u8> {
    // Deterministic output: sort by id.
    let mut ids: Vec<u64> = templates.keys().copied().collect();
    ids.sort_unstable();

    let mut buf = Vec::new();
    write_uvarint(&mut buf, ids.len() as u64);
    for id in ids {
        write_uvarint(&mut buf, id);
        let tokens = &templates[&id];
        write_uvarint(&mut buf, tokens.len() as u64);
        for token in tokens {
            match token {
                TemplateToken::Literal(l) => {
                    write_uvarint(&mut buf, TOKEN_LITERAL);
                    write_str(&mut buf, l);
                }
                TemplateToken::Wildcard => write_uvarint(&mut buf, TOKEN_WILDCARD),
            }
        }
    }
    buf
}

fn encode_clusters(clusters: &[ClusterSummary]) -> Vec<u8> {
    let mut buf = Vec::new();
    write_uvarint(&mut buf, clusters.len() as u64);
    for c in clusters {
        write_uvarint(&mut buf, c.count);
        write_uvarint(&mut buf, u64::from(c.level.ordinal()));
        write_str(&mut buf, &c.template);
        write_str(&mut buf, &c.source);
    }
    buf
}

/// Write a sealed store image to an open file positioned at start.
pub fn write_image_to(file: &File, storage: &SealedStorage) -> io::Result<()> {
    let mut writer = BufWriter::new(file);

    let strings_bytes = encode_strings(&storage.strings);
    let uuids_bytes = encode_uuids(&storage.uuids);
    let templates_bytes = encode_templates(&storage.templates);
    let clusters_bytes = encode_clusters(&storage.clusters);

    let header_size = mem::size_of::<ImageHeader>() as u64;
    let meta_size = mem::size_of::<SegmentMeta>() as u64;

    // Lay out the leading sections.
    let mut offset = header_size;
    let strings_section = SectionDesc::new(offset, strings_bytes.len() as u64);
    offset += strings_section.len;
    let uuids_section = SectionDesc::new(offset, uuids_bytes.len() as u64);
    offset += uuids_section.len;
    let templates_section = SectionDesc::new(offset, templates_bytes.len() as u64);
    offset += templates_section.len;
    let clusters_section = SectionDesc::new(offset, clusters_bytes.len() as u64);
    offset += clusters_section.len;

    offset = align_up(offset, SECTION_ALIGNMENT);
    let segment_metas_section =
        SectionDesc::new(offset, storage.segments.len() as u64 * meta_size);
    offset += segment_metas_section.len;

    // Lay out each segment's payload sections.
    let mut metas = Vec::with_capacity(storage.segments.len());
    for seg in &storage.segments {
        let blob = SectionDesc::new(offset, seg.blob().len() as u64);
        offset += blob.len;

        offset = align_up(offset, SECTION_ALIGNMENT);
        let offsets = SectionDesc::new(offset, (seg.offsets().len() * 4) as u64);
        offset += offsets.len;

        offset = align_up(offset, SECTION_ALIGNMENT);
        let checkpoint_ids = SectionDesc::new(offset, (seg.checkpoint_ids().len() * 8) as u64);
        offset += checkpoint_ids.len;

        offset = align_up(offset, SECTION_ALIGNMENT);
        let checkpoint_offsets =
            SectionDesc::new(offset, (seg.checkpoint_offsets().len() * 4) as u64);
        offset += checkpoint_offsets.len;

        let delta_stream = SectionDesc::new(offset, seg.delta_stream().len() as u64);
        offset += delta_stream.len;

        let timestamps = SectionDesc::new(offset, seg.timestamps().flushed_bytes().len() as u64);
        offset += timestamps.len;

        metas.push(SegmentMeta {
            domain_tag: seg.domain.tag() as u32,
            level: u32::from(seg.level.ordinal()),
            source_id: seg.source_id,
            record_count: seg.record_count() as u32,
            blob,
            offsets,
            checkpoint_ids,
            checkpoint_offsets,
            delta_stream,
            timestamps,
        });
    }

    let mut header = ImageHeader {
        magic: IMAGE_MAGIC,
        version: IMAGE_VERSION,
        header_size: header_size as u32,
        header_crc32: 0,
        flags_bits: 0,
        segment_count: storage.segments.len() as u32,
        record_count: storage.record_count() as u64,
        base_ts: storage.base_ts,
        reserved: [0u8; 16],
        strings: strings_section,
        uuids: uuids_section,
        templates: templates_section,
        clusters: clusters_section,
        segment_metas: segment_metas_section,
    };

    let mut hasher = Hasher::new();
    hasher.update(bytes_of(&header));
    header.header_crc32 = hasher.finalize();

    const ZERO_PAD: [u8; SECTION_ALIGNMENT as usize] = [0u8; SECTION_ALIGNMENT as usize];

    #[inline]
    fn write_padding<W: Write>(writer: &mut W, current: u64, target: u64) -> io::Result<u64> {
        debug_assert!(target >= current);
        let padding = (target - current) as usize;
        if padding > 0 {
            writer.write_all(&ZERO_PAD[..padding])?;
        }
        Ok(target)
    }

    let mut pos = 0u64;
    writer.write_all(bytes_of(&header))?;
    pos += header_size;

    writer.write_all(&strings_bytes)?;
    writer.write_all(&uuids_bytes)?;
    writer.write_all(&templates_bytes)?;
    writer.write_all(&clusters_bytes)?;
    pos += (strings_bytes.len() + uuids_bytes.len() + templates_bytes.len() + clusters_bytes.len())
        as u64;

    pos = write_padding(&mut writer, pos, segment_metas_section.offset)?;
    writer.write_all(cast_slice(&metas))?;
    pos += segment_metas_section.len;

    for (seg, meta) in storage.segments.iter().zip(&metas) {
        writer.write_all(seg.blob())?;
        pos += meta.blob.len;

        pos = write_padding(&mut writer, pos, meta.offsets.offset)?;
        writer.write_all(cast_slice(seg.offsets()))?;
        pos += meta.offsets.len;

        pos = write_padding(&mut writer, pos, meta.checkpoint_ids.offset)?;
        writer.write_all(cast_slice(seg.checkpoint_ids()))?;
        pos += meta.checkpoint_ids.len;

        pos = write_padding(&mut writer, pos, meta.checkpoint_offsets.offset)?;
        writer.write_all(cast_slice(seg.checkpoint_offsets()))?;
        pos += meta.checkpoint_offsets.len;

        writer.write_all(seg.delta_stream())?;
        pos += meta.delta_stream.len;

        writer.write_all(seg.timestamps().flushed_bytes())?;
        pos += meta.timestamps.len;
    }

    writer.flush()?;
    Ok(())
}

/// Atomic image write: temp file in the target directory, then rename.
pub fn write_image_atomic(path: &Path, storage: &SealedStorage) -> io::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;

    let tmp = NamedTempFile::new_in(parent)?;
    write_image_to(tmp.as_file(), storage)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;

    Ok(())
}

fn corrupt(what: &str) -> Error {
    Error::new(ErrorKind::InvalidData, format!("invalid store image: {what}"))
}

fn section<'a>(data: &'a [u8], desc: &SectionDesc) -> io::Result<&'a [u8]> {
    let start = desc.offset as usize;
    let end = start
        .checked_add(desc.len as usize)
        .ok_or_else(|| corrupt("section length overflow"))?;
    data.get(start..end)
        .ok_or_else(|| corrupt("section lies outside the file"))
}

fn decode_strings(mut input: &[u8]) -> io::Result<Vec<String>> {
    let input = &mut input;
    let count = read_uvarint(input).map_err(|_| corrupt("string count"))? as usize;
    let mut out = Vec::with_capacity(count.min(1 << 20));
    for _ in 0..count {
        out.push(read_str(input).map_err(|_| corrupt("string entry"))?);
    }
    Ok(out)
}

fn decode_uuids(input: &[u8]) -> io::Result<Vec<Uuid>> {
    if input.len() % 16 != 0 {
        return Err(corrupt("uuid section size"));
    }
    Ok(input
        .chunks_exact(16)
        .map(|c| Uuid::from_bytes(c.try_into().expect("chunk is 16 bytes")))
        .collect())
}

fn decode_templates(mut input: &[u8]) -> io::Result<HashMap<u64, Vec<TemplateToken>>> {
    let input = &mut input;
    let count = read_uvarint(input).map_err(|_| corrupt("template count"))? as usize;

    let mut out = HashMap::with_capacity(count.min(1 << 20));
    for _ in 0..count {
        let id = read_uvarint(input).map_err(|_| corrupt("template id"))?;
        let token_count = read_uvarint(input).map_err(|_| corrupt("token count"))? as usize;
        let mut tokens = Vec::with_capacity(token_count.min(1 << 16));
        for _ in 0..token_count {
            let tag = read_uvarint(input).map_err(|_| corrupt("token tag"))?;
            tokens.push(match tag {
                TOKEN_LITERAL => {
                    TemplateToken::Literal(read_str(input).map_err(|_| corrupt("token literal"))?)
                }
                TOKEN_WILDCARD => TemplateToken::Wildcard,
                _ => return Err(corrupt("token tag value")),
            });
        }
        out.insert(id, tokens);
    }
    Ok(out)
}

fn decode_clusters(mut input: &[u8]) -> io::Result<Vec<ClusterSummary>> {
    let input = &mut input;
    let count = read_uvarint(input).map_err(|_| corrupt("cluster count"))? as usize;

    let mut out = Vec::with_capacity(count.min(1 << 20));
    for _ in 0..count {
        let seen = read_uvarint(input).map_err(|_| corrupt("cluster seen"))?;
        let level_ord = read_uvarint(input).map_err(|_| corrupt("cluster level"))?;
        let level = Level::from_ordinal(level_ord).ok_or_else(|| corrupt("cluster level value"))?;
        let template = read_str(input).map_err(|_| corrupt("cluster template"))?;
        let source = read_str(input).map_err(|_| corrupt("cluster source"))?;
        out.push(ClusterSummary {
            count: seen,
            level,
            template,
            source,
        });
    }
    Ok(out)
}

/// Read an LE array section into an owned vector. Explicit per-element
/// decoding, so nothing here depends on the mmap base address alignment.
fn read_u32_section(data: &[u8], desc: &SectionDesc) -> io::Result<Vec<u32>> {
    let bytes = section(data, desc)?;
    if bytes.len() % 4 != 0 {
        return Err(corrupt("u32 section size"));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes(c.try_into().expect("chunk is 4 bytes")))
        .collect())
}

fn read_u64_section(data: &[u8], desc: &SectionDesc) -> io::Result<Vec<u64>> {
    let bytes = section(data, desc)?;
    if bytes.len() % 8 != 0 {
        return Err(corrupt("u64 section size"));
    }
    Ok(bytes
        .chunks_exact(8)
        .map(|c| u64::from_le_bytes(c.try_into().expect("chunk is 8 bytes")))
        .collect())
}

/// Open a persisted image and rebuild the sealed storage.
// TODO: keep the mmap alive and serve blob/offset sections zero-copy
// instead of copying them into owned vectors.
pub fn open_image(path: &Path) -> io::Result<SealedStorage> {
    let file = File::open(path)?;
    let mmap = unsafe { MmapOptions::new().map(&file)? };
    let data: &[u8] = &mmap;

    let header_size = mem::size_of::<ImageHeader>();
    if data.len() < header_size {
        return Err(corrupt("file too small for header"));
    }
    let header: ImageHeader = *from_bytes(&data[..header_size]);

    if header.magic != IMAGE_MAGIC {
        return Err(corrupt("bad magic"));
    }
    if header.version != IMAGE_VERSION {
        return Err(corrupt("version mismatch"));
    }

    let mut check = header;
    check.header_crc32 = 0;
    let mut hasher = Hasher::new();
    hasher.update(bytes_of(&check));
    if hasher.finalize() != header.header_crc32 {
        return Err(corrupt("header checksum mismatch"));
    }

    let strings = decode_strings(section(data, &header.strings)?)?;
    let uuids = decode_uuids(section(data, &header.uuids)?)?;
    let templates = decode_templates(section(data, &header.templates)?)?;
    let clusters = decode_clusters(section(data, &header.clusters)?)?;

    let metas_bytes = section(data, &header.segment_metas)?;
    if metas_bytes.len() != header.segment_count as usize * mem::size_of::<SegmentMeta>() {
        return Err(corrupt("segment meta section size"));
    }

    let mut segments = Vec::with_capacity(header.segment_count as usize);
    for chunk in metas_bytes.chunks_exact(mem::size_of::<SegmentMeta>()) {
        let meta: SegmentMeta = *from_bytes(chunk);

        let domain = DomainKind::from_tag(u64::from(meta.domain_tag))
            .ok_or_else(|| corrupt("segment domain"))?;
        let level = Level::from_ordinal(u64::from(meta.level))
            .ok_or_else(|| corrupt("segment level"))?;

        let blob = section(data, &meta.blob)?.to_vec();
        let offsets = read_u32_section(data, &meta.offsets)?;
        let checkpoint_ids = read_u64_section(data, &meta.checkpoint_ids)?;
        let checkpoint_offsets = read_u32_section(data, &meta.checkpoint_offsets)?;
        let delta_stream = section(data, &meta.delta_stream)?.to_vec();
        let timestamps = T64::from_compressed(section(data, &meta.timestamps)?.to_vec())
            .map_err(|_| corrupt("timestamp column"))?;

        let segment = Segment::from_parts(
            domain,
            level,
            meta.source_id,
            blob,
            offsets,
            checkpoint_ids,
            checkpoint_offsets,
            delta_stream,
            timestamps,
        )
        .ok_or_else(|| corrupt("segment structure"))?;

        if segment.record_count() != meta.record_count as usize {
            return Err(corrupt("segment record count"));
        }
        segments.push(segment);
    }

    Ok(SealedStorage {
        segments,
        strings,
        uuids,
        templates,
        clusters,
        base_ts: header.base_ts,
    })
}

#[cfg(test)]
#[path = "persist_tests.rs"]
mod tests;
