mod dictionary;
mod head_pointers;
mod posting_buffer;
mod segment_pool;

#[cfg(test)]
mod tests;

use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::config_loader::IndexConfig;

use super::{
    attr_score_index::{AttrScoreInvertedIndex, Counters, IndexInner},
    common::{corrupt, IndexError},
    dictionary::TermDictionary,
    head_pointers::HeadPointers,
    ordering::{DocOrder, Forward, Orientation, Reverse},
    posting_buffer::PostingBuffers,
    segment_pool::{SegmentPool, RECORD_OVERHEAD},
    types::{TermId, BLOCK_SIZE},
};

pub const MAGIC: &[u8; 4] = b"ASII";
pub const FORMAT_VERSION: u32 = 1;

/// Binary form of one index component.
///
/// Each component is written as a self-contained section; `deserialize`
/// receives exactly the bytes of its section and must consume all of them.
pub trait IndexSerialize: Sized {
    type Context;

    fn serialize<W: Write>(&self, writer: &mut W) -> io::Result<()>;

    fn deserialize(
        reader: &mut SectionReader<'_>,
        ctx: Self::Context,
    ) -> Result<Self, IndexError>;
}

/// Bounds-checked reader over one section's bytes.
pub struct SectionReader<'a> {
    section: &'static str,
    rest: &'a [u8],
}

impl<'a> SectionReader<'a> {
    pub fn new(section: &'static str, bytes: &'a [u8]) -> Self {
        Self {
            section,
            rest: bytes,
        }
    }

    pub fn remaining(&self) -> usize {
        self.rest.len()
    }

    fn truncated(&self) -> IndexError {
        corrupt(format!("{} section is truncated", self.section))
    }

    pub fn u8(&mut self) -> Result<u8, IndexError> {
        self.rest.read_u8().map_err(|_| self.truncated())
    }

    pub fn u32(&mut self) -> Result<u32, IndexError> {
        self.rest
            .read_u32::<LittleEndian>()
            .map_err(|_| self.truncated())
    }

    pub fn u64(&mut self) -> Result<u64, IndexError> {
        self.rest
            .read_u64::<LittleEndian>()
            .map_err(|_| self.truncated())
    }

    pub fn bool(&mut self) -> Result<bool, IndexError> {
        match self.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(corrupt(format!(
                "{} section has invalid flag {}",
                self.section, other
            ))),
        }
    }

    pub fn bytes(&mut self, len: usize) -> Result<&'a [u8], IndexError> {
        if len > self.rest.len() {
            return Err(self.truncated());
        }
        let (head, tail) = self.rest.split_at(len);
        self.rest = tail;
        Ok(head)
    }

    /// Reads `count` words, refusing counts the section cannot hold before
    /// allocating anything.
    pub fn words(&mut self, count: usize) -> Result<Vec<u32>, IndexError> {
        let len = count.checked_mul(4).ok_or_else(|| self.truncated())?;
        let bytes = self.bytes(len)?;
        Ok(bytes
            .chunks_exact(4)
            .map(|word| u32::from_le_bytes([word[0], word[1], word[2], word[3]]))
            .collect())
    }

    /// Checks a declared element count against the bytes left, given the
    /// smallest encoding of one element.
    pub fn check_count(&self, count: usize, min_element_bytes: usize) -> Result<(), IndexError> {
        match count.checked_mul(min_element_bytes) {
            Some(needed) if needed <= self.rest.len() => Ok(()),
            _ => Err(corrupt(format!(
                "{} section declares {} entries but holds {} bytes",
                self.section,
                count,
                self.rest.len()
            ))),
        }
    }

    pub fn finish(self) -> Result<(), IndexError> {
        if self.rest.is_empty() {
            Ok(())
        } else {
            Err(corrupt(format!(
                "{} section has {} trailing bytes",
                self.section,
                self.rest.len()
            )))
        }
    }
}

fn write_section<W: Write, T: IndexSerialize>(writer: &mut W, item: &T) -> io::Result<()> {
    let mut bytes = Vec::new();
    item.serialize(&mut bytes)?;
    writer.write_u64::<LittleEndian>(bytes.len() as u64)?;
    writer.write_all(&bytes)
}

/// Reads one length-prefixed section. The buffer only grows as bytes
/// actually arrive, so a forged length cannot force a huge allocation.
fn read_section<R: Read>(reader: &mut R, section: &'static str) -> Result<Vec<u8>, IndexError> {
    let len = reader
        .read_u64::<LittleEndian>()
        .map_err(|_| corrupt(format!("missing {} section", section)))?;
    let mut bytes = Vec::new();
    reader.by_ref().take(len).read_to_end(&mut bytes)?;
    if bytes.len() as u64 != len {
        return Err(corrupt(format!(
            "{} section declares {} bytes, found {}",
            section,
            len,
            bytes.len()
        )));
    }
    Ok(bytes)
}

fn read_component<R: Read, T: IndexSerialize>(
    reader: &mut R,
    section: &'static str,
    ctx: T::Context,
) -> Result<T, IndexError> {
    let bytes = read_section(reader, section)?;
    let mut section_reader = SectionReader::new(section, &bytes);
    let item = T::deserialize(&mut section_reader, ctx)?;
    section_reader.finish()?;
    Ok(item)
}

impl IndexSerialize for Counters {
    type Context = ();

    fn serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u64::<LittleEndian>(self.num_docs)?;
        writer.write_u8(self.max_doc_id.is_some() as u8)?;
        writer.write_u32::<LittleEndian>(self.max_doc_id.unwrap_or_default())
    }

    fn deserialize(reader: &mut SectionReader<'_>, _: ()) -> Result<Self, IndexError> {
        let num_docs = reader.u64()?;
        let has_max = reader.bool()?;
        let max_doc_id = reader.u32()?;
        Ok(Self {
            num_docs,
            max_doc_id: has_max.then_some(max_doc_id),
        })
    }
}

impl AttrScoreInvertedIndex {
    /// Writes the whole index. Insertions wait until the image is complete.
    pub fn save<W: Write>(&self, writer: &mut W) -> Result<(), IndexError> {
        let inner = self.inner();
        let _guard = inner.write_lock.lock();

        writer.write_all(MAGIC)?;
        writer.write_u32::<LittleEndian>(FORMAT_VERSION)?;
        writer.write_u8(inner.orientation.is_reverse() as u8)?;
        write_section(writer, &inner.buffers)?;
        write_section(writer, &inner.pool)?;
        write_section(writer, &*inner.dictionary.read())?;
        write_section(writer, &inner.heads)?;
        write_section(writer, &*inner.counters.lock())?;
        Ok(())
    }

    pub fn load<R: Read>(reader: &mut R, config: &IndexConfig) -> Result<Self, IndexError> {
        let mut magic = [0u8; 4];
        reader
            .read_exact(&mut magic)
            .map_err(|_| corrupt("file too short for header"))?;
        if &magic != MAGIC {
            return Err(corrupt("bad magic"));
        }
        let version = reader
            .read_u32::<LittleEndian>()
            .map_err(|_| corrupt("file too short for header"))?;
        if version != FORMAT_VERSION {
            return Err(corrupt(format!("unsupported format version {}", version)));
        }
        let reverse = match reader
            .read_u8()
            .map_err(|_| corrupt("file too short for header"))?
        {
            0 => false,
            1 => true,
            other => return Err(corrupt(format!("invalid orientation flag {}", other))),
        };
        let orientation = Orientation::from_reverse(reverse);

        let buffers: PostingBuffers =
            read_component(reader, "posting buffer", config.initial_buffer_capacity)?;
        let pool: SegmentPool = read_component(reader, "segment pool", ())?;
        if pool.orientation() != orientation {
            return Err(corrupt("segment pool orientation disagrees with header"));
        }
        let dictionary: TermDictionary = read_component(reader, "dictionary", config.max_terms)?;
        let heads: HeadPointers = read_component(reader, "head pointer", ())?;
        let counters: Counters = read_component(reader, "counters", ())?;

        if buffers.terms().len() != heads.len() {
            return Err(corrupt(format!(
                "{} posting buffers but {} head pointers",
                buffers.terms().len(),
                heads.len()
            )));
        }

        let config = IndexConfig {
            reverse,
            max_pool_size: pool.max_pool_size(),
            number_of_pools: pool.number_of_pools(),
            ..config.clone()
        };
        config.validate()?;

        let inner = IndexInner {
            config,
            orientation,
            pool,
            buffers,
            heads,
            dictionary: parking_lot::RwLock::new(dictionary),
            counters: parking_lot::Mutex::new(counters),
            write_lock: parking_lot::Mutex::new(()),
        };
        match orientation {
            Orientation::Forward => validate_lists::<Forward>(&inner)?,
            Orientation::Reverse => validate_lists::<Reverse>(&inner)?,
        }
        Ok(Self::from_inner(inner))
    }
}

/// Walks every postings list of a freshly loaded index and checks it against
/// its head pointer: the chain must stay within written pool data and end
/// where `last` says, and the decoded list must be strictly ordered and as
/// long as the document frequency.
fn validate_lists<O: DocOrder>(inner: &IndexInner) -> Result<(), IndexError> {
    let max_doc_id = inner.counters.lock().max_doc_id;
    // Every record takes at least its header, which bounds the chain length
    // before any chain is walked.
    let max_blocks = inner.pool.used_words() / RECORD_OVERHEAD as u64;

    for id in 0..inner.heads.len() {
        let term = TermId(id as u32);
        let head = inner.heads.state_of(term);
        let (buffered, last_doc_id) = inner
            .buffers
            .terms()
            .get(term)
            .map(|buffer| {
                let buffer = buffer.read();
                (buffer.len() as u64, buffer.last_doc_id())
            })
            .unwrap_or_default();

        if head.block_count as u64 > max_blocks
            || head.document_frequency as u64
                > head.block_count as u64 * BLOCK_SIZE as u64 + buffered
        {
            return Err(corrupt(format!(
                "term {} claims {} postings in {} blocks",
                term, head.document_frequency, head.block_count
            )));
        }
        if (head.block_count == 0) != head.entry.is_undefined()
            || head.entry.is_undefined() != head.last.is_undefined()
        {
            return Err(corrupt(format!(
                "term {} has {} blocks but inconsistent pointers",
                term, head.block_count
            )));
        }
        inner.pool.validate_pointer(head.last)?;

        let mut ptr = head.entry;
        let mut tail = head.entry;
        for _ in 0..head.block_count {
            if ptr.is_undefined() {
                return Err(corrupt(format!("block chain of term {} ends early", term)));
            }
            inner.pool.validate_pointer(ptr)?;
            tail = ptr;
            ptr = inner.pool.next_pointer(ptr)?;
        }
        if !ptr.is_undefined() {
            return Err(corrupt(format!(
                "block chain of term {} is longer than recorded",
                term
            )));
        }
        let newest = if O::REVERSE { head.entry } else { tail };
        if newest != head.last {
            return Err(corrupt(format!(
                "last block pointer of term {} is not the newest block",
                term
            )));
        }

        let postings = inner.postings::<O>(term)?;
        if postings.len() != head.document_frequency as usize {
            return Err(corrupt(format!(
                "term {} holds {} postings, document frequency is {}",
                term,
                postings.len(),
                head.document_frequency
            )));
        }
        if head.collection_frequency < head.document_frequency as u64 {
            return Err(corrupt(format!(
                "term {} has collection frequency below its document frequency",
                term
            )));
        }
        if postings
            .windows(2)
            .any(|pair| !O::before(pair[0].doc_id, pair[1].doc_id))
        {
            return Err(corrupt(format!("postings of term {} are out of order", term)));
        }
        let largest = postings.iter().map(|posting| posting.doc_id).max();
        if largest != last_doc_id || largest > max_doc_id {
            return Err(corrupt(format!(
                "last docID of term {} disagrees with its postings",
                term
            )));
        }
    }
    Ok(())
}
