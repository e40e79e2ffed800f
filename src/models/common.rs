use std::io;

use thiserror::Error;

use super::codec::CodecError;
use super::types::{DocId, TermId};

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("segment pool exhausted: all {pools} pools of {pool_size} words are in use")]
    OutOfCapacity { pools: u32, pool_size: u32 },

    #[error("corrupt index: {0}")]
    CorruptIndex(String),

    #[error("document `{doc}` is not after `{last}` in the postings of term `{term}`")]
    OutOfOrder {
        term: TermId,
        last: DocId,
        doc: DocId,
    },

    #[error("term dictionary is full")]
    DictionaryFull,

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("the index writer has already been taken")]
    WriterTaken,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl From<CodecError> for IndexError {
    fn from(error: CodecError) -> Self {
        Self::CorruptIndex(error.to_string())
    }
}

/// Shorthand used by the validation paths that guard persisted or
/// arena-resident data.
pub(crate) fn corrupt(msg: impl Into<String>) -> IndexError {
    IndexError::CorruptIndex(msg.into())
}
