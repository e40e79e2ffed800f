use std::io::{self, Write};

use byteorder::{LittleEndian, WriteBytesExt};

use super::{IndexSerialize, SectionReader};
use crate::models::{
    common::{corrupt, IndexError},
    ordering::Orientation,
    segment_pool::SegmentPool,
};

// Layout:
//   max_pool_size:u32, number_of_pools:u32, segment_count:u32,
//   tail_offset:u32, reverse:u8,
//   segment_count arenas of max_pool_size words,
//   tail_offset words of the arena being filled.
impl IndexSerialize for SegmentPool {
    type Context = ();

    fn serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let cursor = self.cursor();
        writer.write_u32::<LittleEndian>(self.max_pool_size())?;
        writer.write_u32::<LittleEndian>(self.number_of_pools())?;
        writer.write_u32::<LittleEndian>(cursor.segment)?;
        writer.write_u32::<LittleEndian>(cursor.offset)?;
        writer.write_u8(self.orientation().is_reverse() as u8)?;

        let to_io = |err: IndexError| io::Error::new(io::ErrorKind::InvalidData, err.to_string());
        for segment in 0..cursor.segment {
            for word in self.arena_words(segment, self.max_pool_size()).map_err(to_io)? {
                writer.write_u32::<LittleEndian>(word)?;
            }
        }
        for word in self
            .arena_words(cursor.segment, cursor.offset)
            .map_err(to_io)?
        {
            writer.write_u32::<LittleEndian>(word)?;
        }
        Ok(())
    }

    fn deserialize(reader: &mut SectionReader<'_>, _: ()) -> Result<Self, IndexError> {
        let max_pool_size = reader.u32()?;
        let number_of_pools = reader.u32()?;
        let segment_count = reader.u32()?;
        let tail_offset = reader.u32()?;
        let orientation = Orientation::from_reverse(reader.bool()?);

        SegmentPool::validate_geometry(max_pool_size, number_of_pools)
            .map_err(|err| corrupt(err.to_string()))?;
        if segment_count >= number_of_pools {
            return Err(corrupt(format!(
                "segment pool has {} full arenas out of {}",
                segment_count, number_of_pools
            )));
        }

        let mut arenas = Vec::with_capacity(segment_count as usize + 1);
        for _ in 0..segment_count {
            arenas.push(reader.words(max_pool_size as usize)?);
        }
        arenas.push(reader.words(tail_offset as usize)?);
        SegmentPool::from_parts(max_pool_size, number_of_pools, orientation, arenas, tail_offset)
    }
}
