use std::io::{self, Write};

use byteorder::{LittleEndian, WriteBytesExt};

use super::{IndexSerialize, SectionReader};
use crate::models::{
    common::IndexError,
    head_pointers::{HeadPointer, HeadPointers, HeadState},
    types::BlockPointer,
};

// Per term: df:u32, cf:u64, entry:u32, last:u32, block_count:u32.
const HEAD_BYTES: usize = 24;

impl IndexSerialize for HeadPointers {
    type Context = ();

    fn serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let heads = self.to_list();
        writer.write_u32::<LittleEndian>(heads.len() as u32)?;
        for head in heads {
            let state = head.state();
            writer.write_u32::<LittleEndian>(state.document_frequency)?;
            writer.write_u64::<LittleEndian>(state.collection_frequency)?;
            writer.write_u32::<LittleEndian>(state.entry.raw())?;
            writer.write_u32::<LittleEndian>(state.last.raw())?;
            writer.write_u32::<LittleEndian>(state.block_count)?;
        }
        Ok(())
    }

    fn deserialize(reader: &mut SectionReader<'_>, _: ()) -> Result<Self, IndexError> {
        let count = reader.u32()? as usize;
        reader.check_count(count, HEAD_BYTES)?;

        let mut heads = Vec::with_capacity(count);
        for _ in 0..count {
            let state = HeadState {
                document_frequency: reader.u32()?,
                collection_frequency: reader.u64()?,
                entry: BlockPointer::from_raw(reader.u32()?),
                last: BlockPointer::from_raw(reader.u32()?),
                block_count: reader.u32()?,
            };
            heads.push(HeadPointer::from_state(state));
        }
        Ok(HeadPointers::from_slots(heads))
    }
}
