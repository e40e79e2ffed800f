use std::io::{self, Write};

use byteorder::{LittleEndian, WriteBytesExt};

use super::{IndexSerialize, SectionReader};
use crate::models::{
    common::{corrupt, IndexError},
    posting_buffer::{PostingBuffer, PostingBuffers},
    types::BLOCK_SIZE,
};

// Per term: has_last:u8, last_doc_id:u32, len:u32, len docIDs, len scores.
const MIN_BUFFER_BYTES: usize = 9;

impl IndexSerialize for PostingBuffers {
    /// Initial capacity of buffers created after loading.
    type Context = usize;

    fn serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let buffers = self.terms().to_list();
        writer.write_u32::<LittleEndian>(buffers.len() as u32)?;
        for buffer in buffers {
            let buffer = buffer.read();
            writer.write_u8(buffer.last_doc_id().is_some() as u8)?;
            writer.write_u32::<LittleEndian>(buffer.last_doc_id().unwrap_or_default())?;
            writer.write_u32::<LittleEndian>(buffer.len() as u32)?;
            for &doc_id in buffer.doc_ids() {
                writer.write_u32::<LittleEndian>(doc_id)?;
            }
            for &score in buffer.scores() {
                writer.write_u32::<LittleEndian>(score)?;
            }
        }
        Ok(())
    }

    fn deserialize(
        reader: &mut SectionReader<'_>,
        initial_capacity: usize,
    ) -> Result<Self, IndexError> {
        let count = reader.u32()? as usize;
        reader.check_count(count, MIN_BUFFER_BYTES)?;

        let mut buffers = Vec::with_capacity(count);
        for term in 0..count {
            let has_last = reader.bool()?;
            let last_doc_id = reader.u32()?;
            let len = reader.u32()? as usize;
            // A full buffer is always sealed before it is observable.
            if len >= BLOCK_SIZE {
                return Err(corrupt(format!(
                    "posting buffer of term {} holds {} postings",
                    term, len
                )));
            }
            let doc_ids = reader.words(len)?;
            let scores = reader.words(len)?;

            if doc_ids.windows(2).any(|pair| pair[0] >= pair[1]) {
                return Err(corrupt(format!(
                    "posting buffer of term {} is not ascending",
                    term
                )));
            }
            let last_doc_id = has_last.then_some(last_doc_id);
            if !doc_ids.is_empty() && doc_ids.last().copied() != last_doc_id {
                return Err(corrupt(format!(
                    "posting buffer of term {} does not end at its last docID",
                    term
                )));
            }
            buffers.push(PostingBuffer::from_parts(doc_ids, scores, last_doc_id));
        }
        Ok(PostingBuffers::from_buffers(initial_capacity, buffers))
    }
}
