use std::io::{self, Write};

use byteorder::{LittleEndian, WriteBytesExt};

use super::{IndexSerialize, SectionReader};
use crate::models::{
    common::{corrupt, IndexError},
    dictionary::TermDictionary,
};

impl IndexSerialize for TermDictionary {
    /// Term limit of the loaded dictionary; not persisted.
    type Context = Option<usize>;

    fn serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u32::<LittleEndian>(self.terms().len() as u32)?;
        for term in self.terms() {
            writer.write_u32::<LittleEndian>(term.len() as u32)?;
            writer.write_all(term.as_bytes())?;
        }
        Ok(())
    }

    fn deserialize(
        reader: &mut SectionReader<'_>,
        max_terms: Option<usize>,
    ) -> Result<Self, IndexError> {
        let count = reader.u32()? as usize;
        reader.check_count(count, 4)?;

        let mut terms = Vec::with_capacity(count);
        for id in 0..count {
            let len = reader.u32()? as usize;
            let bytes = reader.bytes(len)?;
            let term = std::str::from_utf8(bytes)
                .map_err(|_| corrupt(format!("term {} is not valid UTF-8", id)))?;
            terms.push(term.to_owned());
        }
        TermDictionary::from_terms(terms, max_terms)
            .ok_or_else(|| corrupt("dictionary contains a term twice"))
    }
}
