use smallvec::SmallVec;

const INLINE: usize = 64;

const FNV_OFFSET: u32 = 0x811C_9DC5;
const FNV_PRIME: u32 = 0x0100_0193;

/// Seed byte folded in front of short-string hashes. Window hashes only
/// ever cover alphanumeric bytes, so the seeded prefix keeps short strings
/// out of the same preimage space.
const SHORT_HASH_SEED: u8 = 0x1D;

#[inline]
fn fnv1a(seed: u32, bytes: &[u8]) -> u32 {
    let mut h = seed;
    for &b in bytes {
        h ^= u32::from(b);
        h = h.wrapping_mul(FNV_PRIME);
    }
    h
}

/// Normalize text for trigram hashing.
///
/// ASCII letters are lowercased, digits kept, everything else (including
/// multi-byte UTF-8) dropped. Substring search over log lines only needs
/// the alphanumeric skeleton; punctuation would blow up the trigram count
/// without adding selectivity.
fn normalize(text: &str) -> SmallVec<[u8; INLINE]> {
    let mut out: SmallVec<[u8; INLINE]> = SmallVec::with_capacity(text.len());
    for b in text.bytes() {
        if b.is_ascii_alphanumeric() {
            out.push(b.to_ascii_lowercase());
        }
    }
    out
}

/// The sorted, deduplicated set of 32-bit trigram hashes for `text`.
///
/// Each 3-byte window of the normalized text is hashed with FNV-1a. Inputs
/// that normalize to one or two bytes produce a single distinguished
/// short-string hash; inputs that normalize to nothing produce an empty
/// set, which callers treat as "not indexable".
pub fn trigram_set(text: &str) -> Vec<u32> {
    let norm = normalize(text);

    if norm.is_empty() {
        return Vec::new();
    }
    if norm.len() < 3 {
        return vec![short_hash(&norm)];
    }

    let mut hashes: Vec<u32> = norm.windows(3).map(|w| fnv1a(FNV_OFFSET, w)).collect();
    hashes.sort_unstable();
    hashes.dedup();
    hashes
}

/// Hash for normalized inputs shorter than one window.
fn short_hash(norm: &[u8]) -> u32 {
    let seeded = fnv1a(FNV_OFFSET, &[SHORT_HASH_SEED]);
    fnv1a(seeded, norm)
}

#[cfg(test)]
#[path = "trigram_tests.rs"]
mod tests;
