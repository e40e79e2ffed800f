pub mod attr_score_index;
pub mod bench_common;
pub mod codec;
pub mod common;
pub mod dictionary;
pub mod filter;
pub mod head_pointers;
pub mod intersection;
pub mod ordering;
pub mod posting_buffer;
pub mod segment_pool;
pub mod serializer;
pub mod term_directory;
pub mod types;
