pub mod args;
pub mod config_loader;
pub mod models;

pub use models::{
    attr_score_index::{AttrScoreInvertedIndex, IndexReader, IndexStats, IndexWriter},
    common::IndexError,
    dictionary::{Dictionary, TermDictionary},
    filter::{BitsetFilter, Filter, PredicateFilter},
    intersection::{Algorithm, RetrieveResult},
    types::{DocId, Posting, Score, TermId, Weight},
};
