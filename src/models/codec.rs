//! Block codec for (docID, score) batches.
//!
//! Values are processed in chunks of [`CHUNK_SIZE`] integers. Each full chunk
//! is bit-packed at a single width chosen to minimise its encoded size; values
//! wider than that width are patched in as exceptions (position byte plus the
//! high bits as a varint). A trailing partial chunk is stored as plain
//! varints. The chunk layout keeps every value of a chunk at a fixed stride,
//! which is what vectorized unpackers operate on.
//!
//! DocIDs are delta-encoded before packing; scores are packed as-is. Encoded
//! output is padded to whole 32-bit words because that is the unit the
//! segment pool stores.

use thiserror::Error;

use super::types::BLOCK_SIZE;

pub const CHUNK_SIZE: usize = 32;

const MAX_VARINT_BYTES: usize = 5;
/// Header (width + exception count) plus a chunk packed at full width.
const MAX_CHUNK_BYTES: usize = 2 + CHUNK_SIZE * 4;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("compressed data ends after {0} bytes")]
    Truncated(usize),

    #[error("invalid bit width {0}")]
    InvalidBitWidth(u8),

    #[error("exception position {0} outside of chunk")]
    InvalidExceptionPosition(u8),

    #[error("chunk declares {0} exceptions")]
    TooManyExceptions(usize),

    #[error("varint longer than 5 bytes or wider than 32 bits")]
    VarintOverflow,

    #[error("decoded docID overflows u32")]
    DocIdOverflow,

    #[error("block count {0} is out of range")]
    CountOutOfRange(usize),
}

/// Upper bound on the number of words [`encode_doc_ids`] or [`encode_scores`]
/// produce for `count` values.
pub fn max_encoded_words(count: usize) -> usize {
    let chunks = count / CHUNK_SIZE;
    let tail = count % CHUNK_SIZE;
    (chunks * MAX_CHUNK_BYTES + tail * MAX_VARINT_BYTES).div_ceil(4)
}

#[inline]
pub fn bits_needed(max_val: u32) -> u8 {
    if max_val == 0 {
        0
    } else {
        32 - max_val.leading_zeros() as u8
    }
}

#[inline]
fn width_mask(bit_width: u8) -> u32 {
    if bit_width >= 32 {
        u32::MAX
    } else {
        (1u32 << bit_width) - 1
    }
}

#[inline]
fn varint_len(mut value: u32) -> usize {
    let mut len = 1;
    while value >= 0x80 {
        value >>= 7;
        len += 1;
    }
    len
}

fn write_varint(mut value: u32, out: &mut Vec<u8>) {
    while value >= 0x80 {
        out.push((value as u8) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn u8(&mut self) -> Result<u8, CodecError> {
        let byte = *self
            .bytes
            .get(self.pos)
            .ok_or(CodecError::Truncated(self.pos))?;
        self.pos += 1;
        Ok(byte)
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        let end = self.pos + len;
        let slice = self
            .bytes
            .get(self.pos..end)
            .ok_or(CodecError::Truncated(self.bytes.len()))?;
        self.pos = end;
        Ok(slice)
    }

    fn varint(&mut self) -> Result<u32, CodecError> {
        let mut value = 0u32;
        for i in 0..MAX_VARINT_BYTES {
            let byte = self.u8()?;
            let low = (byte & 0x7F) as u32;
            if i == MAX_VARINT_BYTES - 1 && low > 0x0F {
                return Err(CodecError::VarintOverflow);
            }
            value |= low << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(CodecError::VarintOverflow)
    }
}

/// Picks the width with the smallest packed-plus-exceptions size.
fn choose_bit_width(values: &[u32]) -> u8 {
    let mut best_width = 32u8;
    let mut best_cost = usize::MAX;
    for width in 0..=32u8 {
        let mut cost = CHUNK_SIZE * width as usize / 8;
        for &value in values {
            if bits_needed(value) > width {
                cost += 1 + varint_len(value >> width);
            }
        }
        if cost < best_cost {
            best_cost = cost;
            best_width = width;
        }
    }
    best_width
}

fn pack_chunk(values: &[u32], out: &mut Vec<u8>) {
    debug_assert_eq!(values.len(), CHUNK_SIZE);
    let width = choose_bit_width(values);
    let mask = width_mask(width);
    let exceptions: Vec<(u8, u32)> = values
        .iter()
        .enumerate()
        .filter(|(_, &value)| bits_needed(value) > width)
        .map(|(pos, &value)| (pos as u8, value >> width))
        .collect();

    out.push(width);
    out.push(exceptions.len() as u8);

    let mut acc = 0u64;
    let mut bits = 0u32;
    for &value in values {
        acc |= ((value & mask) as u64) << bits;
        bits += width as u32;
        while bits >= 8 {
            out.push(acc as u8);
            acc >>= 8;
            bits -= 8;
        }
    }
    debug_assert_eq!(bits, 0);

    for (pos, high) in exceptions {
        out.push(pos);
        write_varint(high, out);
    }
}

fn unpack_chunk(reader: &mut ByteReader<'_>, out: &mut [u32]) -> Result<(), CodecError> {
    let width = reader.u8()?;
    if width > 32 {
        return Err(CodecError::InvalidBitWidth(width));
    }
    let exception_count = reader.u8()? as usize;
    if exception_count > CHUNK_SIZE {
        return Err(CodecError::TooManyExceptions(exception_count));
    }

    let mask = width_mask(width) as u64;
    let packed = reader.take(CHUNK_SIZE * width as usize / 8)?;
    let mut bytes = packed.iter();
    let mut acc = 0u64;
    let mut bits = 0u32;
    for slot in out.iter_mut() {
        while bits < width as u32 {
            // `take` already guaranteed the exact byte count.
            let byte = bytes.next().copied().unwrap_or(0);
            acc |= (byte as u64) << bits;
            bits += 8;
        }
        *slot = (acc & mask) as u32;
        acc >>= width;
        bits -= width as u32;
    }

    for _ in 0..exception_count {
        let pos = reader.u8()?;
        let slot = out
            .get_mut(pos as usize)
            .ok_or(CodecError::InvalidExceptionPosition(pos))?;
        // A full-width chunk never carries exceptions.
        if width == 32 {
            return Err(CodecError::InvalidBitWidth(width));
        }
        let high = reader.varint()?;
        let shifted = high << width;
        if shifted >> width != high {
            return Err(CodecError::VarintOverflow);
        }
        *slot |= shifted;
    }
    Ok(())
}

fn pack(values: &[u32]) -> Vec<u32> {
    let mut bytes = Vec::with_capacity(max_encoded_words(values.len()) * 4);
    let mut chunks = values.chunks_exact(CHUNK_SIZE);
    for chunk in &mut chunks {
        pack_chunk(chunk, &mut bytes);
    }
    for &value in chunks.remainder() {
        write_varint(value, &mut bytes);
    }
    bytes
        .chunks(4)
        .map(|word| {
            let mut buf = [0u8; 4];
            buf[..word.len()].copy_from_slice(word);
            u32::from_le_bytes(buf)
        })
        .collect()
}

fn unpack(words: &[u32], count: usize, out: &mut Vec<u32>) -> Result<(), CodecError> {
    if count > BLOCK_SIZE {
        return Err(CodecError::CountOutOfRange(count));
    }
    let bytes: Vec<u8> = words.iter().flat_map(|word| word.to_le_bytes()).collect();
    let mut reader = ByteReader::new(&bytes);

    out.clear();
    out.resize(count, 0);
    let full = count / CHUNK_SIZE * CHUNK_SIZE;
    for chunk in out[..full].chunks_exact_mut(CHUNK_SIZE) {
        unpack_chunk(&mut reader, chunk)?;
    }
    for slot in out[full..].iter_mut() {
        *slot = reader.varint()?;
    }
    Ok(())
}

/// Encodes docIDs given in traversal order: strictly ascending for forward
/// lists, strictly descending when `reverse` is set.
pub fn encode_doc_ids(doc_ids: &[u32], reverse: bool) -> Vec<u32> {
    let mut ascending = doc_ids.to_vec();
    if reverse {
        ascending.reverse();
    }
    debug_assert!(ascending.windows(2).all(|w| w[0] < w[1]));

    let mut prev = 0u32;
    for doc in ascending.iter_mut() {
        let current = *doc;
        *doc = current - prev;
        prev = current;
    }
    pack(&ascending)
}

/// Inverse of [`encode_doc_ids`]; `out` receives the docIDs in traversal
/// order.
pub fn decode_doc_ids(
    words: &[u32],
    count: usize,
    reverse: bool,
    out: &mut Vec<u32>,
) -> Result<(), CodecError> {
    unpack(words, count, out)?;
    let mut prev = 0u32;
    for doc in out.iter_mut() {
        prev = prev.checked_add(*doc).ok_or(CodecError::DocIdOverflow)?;
        *doc = prev;
    }
    if reverse {
        out.reverse();
    }
    Ok(())
}

pub fn encode_scores(scores: &[u32]) -> Vec<u32> {
    pack(scores)
}

pub fn decode_scores(words: &[u32], count: usize, out: &mut Vec<u32>) -> Result<(), CodecError> {
    unpack(words, count, out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::{Arbitrary, Gen};
    use quickcheck_macros::quickcheck;

    #[derive(Clone, Debug)]
    struct PostingBatch {
        doc_ids: Vec<u32>,
        scores: Vec<u32>,
    }

    impl Arbitrary for PostingBatch {
        fn arbitrary(g: &mut Gen) -> Self {
            let len = usize::arbitrary(g) % BLOCK_SIZE + 1;
            // Mix of tiny gaps and the occasional huge one to force exceptions.
            let mut doc = u32::arbitrary(g) % 1000;
            let mut doc_ids = Vec::with_capacity(len);
            for _ in 0..len {
                doc_ids.push(doc);
                let gap = if u8::arbitrary(g) % 16 == 0 {
                    u32::arbitrary(g) % 5_000_000 + 1
                } else {
                    u32::arbitrary(g) % 8 + 1
                };
                doc = doc.saturating_add(gap);
                if doc == u32::MAX {
                    break;
                }
            }
            let scores = doc_ids.iter().map(|_| u32::arbitrary(g)).collect();
            PostingBatch { doc_ids, scores }
        }
    }

    #[quickcheck]
    fn prop_forward_round_trip(batch: PostingBatch) -> bool {
        let docs = encode_doc_ids(&batch.doc_ids, false);
        let scores = encode_scores(&batch.scores);
        let mut decoded_docs = Vec::new();
        let mut decoded_scores = Vec::new();
        decode_doc_ids(&docs, batch.doc_ids.len(), false, &mut decoded_docs).unwrap();
        decode_scores(&scores, batch.scores.len(), &mut decoded_scores).unwrap();
        decoded_docs == batch.doc_ids && decoded_scores == batch.scores
    }

    #[quickcheck]
    fn prop_reverse_round_trip(batch: PostingBatch) -> bool {
        let mut descending = batch.doc_ids.clone();
        descending.reverse();
        let docs = encode_doc_ids(&descending, true);
        let mut decoded = Vec::new();
        decode_doc_ids(&docs, descending.len(), true, &mut decoded).unwrap();
        decoded == descending
    }

    #[quickcheck]
    fn prop_encoded_size_is_bounded(batch: PostingBatch) -> bool {
        encode_doc_ids(&batch.doc_ids, false).len() <= max_encoded_words(batch.doc_ids.len())
            && encode_scores(&batch.scores).len() <= max_encoded_words(batch.scores.len())
    }

    #[test]
    fn test_bits_needed() {
        assert_eq!(bits_needed(0), 0);
        assert_eq!(bits_needed(1), 1);
        assert_eq!(bits_needed(255), 8);
        assert_eq!(bits_needed(256), 9);
        assert_eq!(bits_needed(u32::MAX), 32);
    }

    #[test]
    fn test_dense_ids_pack_tightly() {
        let docs: Vec<u32> = (0..BLOCK_SIZE as u32).collect();
        // 4 chunks of 1-bit gaps: 2 header bytes + 4 packed bytes each.
        let words = encode_doc_ids(&docs, false);
        assert_eq!(words.len(), 6);
    }

    #[test]
    fn test_outlier_goes_to_exception() {
        let mut scores = vec![3u32; CHUNK_SIZE];
        scores[17] = u32::MAX;
        let words = encode_scores(&scores);
        let mut decoded = Vec::new();
        decode_scores(&words, CHUNK_SIZE, &mut decoded).unwrap();
        assert_eq!(decoded, scores);
        assert!(words.len() < max_encoded_words(CHUNK_SIZE));
    }

    #[test]
    fn test_truncated_input_is_rejected() {
        let scores: Vec<u32> = (0..BLOCK_SIZE as u32).map(|i| i * 7919).collect();
        let words = encode_scores(&scores);
        let mut decoded = Vec::new();
        let err = decode_scores(&words[..words.len() / 2], BLOCK_SIZE, &mut decoded);
        assert!(matches!(err, Err(CodecError::Truncated(_))));
    }

    #[test]
    fn test_invalid_width_is_rejected() {
        let mut words = encode_scores(&[1u32; CHUNK_SIZE]);
        words[0] = (words[0] & !0xFF) | 40;
        let mut decoded = Vec::new();
        assert_eq!(
            decode_scores(&words, CHUNK_SIZE, &mut decoded),
            Err(CodecError::InvalidBitWidth(40))
        );
    }

    #[test]
    fn test_exception_count_above_chunk_is_rejected() {
        let mut words = encode_scores(&[1u32; CHUNK_SIZE]);
        words[0] = (words[0] & !0xFF00) | (200 << 8);
        let mut decoded = Vec::new();
        assert_eq!(
            decode_scores(&words, CHUNK_SIZE, &mut decoded),
            Err(CodecError::TooManyExceptions(200))
        );
    }

    #[test]
    fn test_count_above_block_size_is_rejected() {
        let mut decoded = Vec::new();
        assert_eq!(
            decode_scores(&[], BLOCK_SIZE + 1, &mut decoded),
            Err(CodecError::CountOutOfRange(BLOCK_SIZE + 1))
        );
    }
}
