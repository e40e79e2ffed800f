use std::io::Cursor;

use rand::{rngs::StdRng, Rng, SeedableRng};
use tempfile::tempdir;

use crate::config_loader::IndexConfig;
use crate::models::{
    attr_score_index::AttrScoreInvertedIndex,
    common::IndexError,
    filter::BitsetFilter,
    intersection::Algorithm,
    types::{DocId, Score, Weight},
};

const VOCABULARY: [&str; 6] = ["alpha", "beta", "gamma", "delta", "eps", "zeta"];

fn config(reverse: bool) -> IndexConfig {
    IndexConfig {
        reverse,
        max_pool_size: 1 << 12,
        number_of_pools: 32,
        ..Default::default()
    }
}

/// Zipf-ish corpus: term `i` lands in about one document out of `i + 1`, so
/// early terms span several blocks and late ones stay in their buffers.
fn random_index(rng: &mut StdRng, reverse: bool, docs: DocId) -> AttrScoreInvertedIndex {
    let index = AttrScoreInvertedIndex::new(config(reverse)).unwrap();
    let mut writer = index.writer().unwrap();
    for doc in 0..docs {
        let terms: Vec<(&str, Score)> = VOCABULARY
            .iter()
            .enumerate()
            .filter_map(|(i, term)| {
                (rng.gen_range(0..=i) == 0).then(|| (*term, rng.gen_range(0..1000)))
            })
            .collect();
        writer.insert_doc(doc * 3, &terms).unwrap();
    }
    index
}

fn random_queries(rng: &mut StdRng, count: usize) -> Vec<Vec<(&'static str, Weight)>> {
    (0..count)
        .map(|_| {
            let len = rng.gen_range(1..=3);
            (0..len)
                .map(|_| {
                    (
                        VOCABULARY[rng.gen_range(0..VOCABULARY.len())],
                        rng.gen_range(1..5),
                    )
                })
                .collect()
        })
        .collect()
}

fn save_to_vec(index: &AttrScoreInvertedIndex) -> Vec<u8> {
    let mut bytes = Vec::new();
    index.save(&mut bytes).unwrap();
    bytes
}

fn load_from_slice(bytes: &[u8]) -> Result<AttrScoreInvertedIndex, IndexError> {
    AttrScoreInvertedIndex::load(&mut Cursor::new(bytes), &IndexConfig::default())
}

#[test]
fn test_save_load_preserves_results() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for reverse in [false, true] {
        let index = random_index(&mut rng, reverse, 2000);
        let loaded = load_from_slice(&save_to_vec(&index)).unwrap();
        assert_eq!(loaded.stats(), index.stats());
        assert_eq!(loaded.orientation(), index.orientation());

        let before = index.reader();
        let after = loaded.reader();
        let filter = BitsetFilter::from_ids(6000, (0..6000).filter(|d| d % 7 != 0));
        for query in random_queries(&mut rng, 50) {
            for algorithm in [Algorithm::SvS, Algorithm::SvSRanked] {
                for hits in [1, 10, usize::MAX] {
                    assert_eq!(
                        before.retrieve(algorithm, &query, None, hits).unwrap(),
                        after.retrieve(algorithm, &query, None, hits).unwrap()
                    );
                    assert_eq!(
                        before.retrieve(algorithm, &query, Some(&filter), hits).unwrap(),
                        after.retrieve(algorithm, &query, Some(&filter), hits).unwrap()
                    );
                }
            }
        }
        for term in VOCABULARY {
            let id = before.term_id(term).unwrap();
            assert_eq!(after.term_id(term), Some(id));
            assert_eq!(before.postings(id).unwrap(), after.postings(id).unwrap());
            assert_eq!(
                before.collection_frequency(id),
                after.collection_frequency(id)
            );
        }

        // The image is stable across a second round trip.
        assert_eq!(save_to_vec(&loaded), save_to_vec(&index));
    }
}

#[test]
fn test_loaded_index_keeps_growing() {
    let mut rng = StdRng::seed_from_u64(11);
    let index = random_index(&mut rng, false, 500);
    let loaded = load_from_slice(&save_to_vec(&index)).unwrap();
    let mut writer = loaded.writer().unwrap();
    for doc in 500..1000 {
        writer.insert_doc(doc * 3, &[("alpha", 1)]).unwrap();
    }
    let reader = loaded.reader();
    let alpha = reader.term_id("alpha").unwrap();
    let postings = reader.postings(alpha).unwrap();
    assert_eq!(postings.len(), 1000);
    assert!(postings.windows(2).all(|w| w[0].doc_id < w[1].doc_id));
    assert!(matches!(
        writer.insert_doc(0, &[("alpha", 1)]),
        Err(IndexError::OutOfOrder { .. })
    ));
}

#[test]
fn test_save_to_path() {
    let mut rng = StdRng::seed_from_u64(3);
    let index = random_index(&mut rng, true, 700);
    let dir = tempdir().unwrap();
    let path = dir.path().join("index.bin");
    index.save_to_path(&path).unwrap();
    let loaded = AttrScoreInvertedIndex::load_from_path(&path, &IndexConfig::default()).unwrap();
    assert_eq!(loaded.stats(), index.stats());
    assert!(loaded.config().reverse);
    assert_eq!(loaded.config().max_pool_size, 1 << 12);
}

#[test]
fn test_empty_index_round_trip() {
    let index = AttrScoreInvertedIndex::new(config(false)).unwrap();
    let loaded = load_from_slice(&save_to_vec(&index)).unwrap();
    assert_eq!(loaded.stats(), index.stats());
    assert!(loaded
        .reader()
        .retrieve(Algorithm::SvS, &[("alpha", 1)], None, 10)
        .unwrap()
        .is_empty());
}

#[test]
fn test_header_is_checked() {
    let index = AttrScoreInvertedIndex::new(config(false)).unwrap();
    let bytes = save_to_vec(&index);

    let mut bad_magic = bytes.clone();
    bad_magic[0] = b'X';
    assert!(matches!(
        load_from_slice(&bad_magic),
        Err(IndexError::CorruptIndex(_))
    ));

    let mut bad_version = bytes.clone();
    bad_version[4] = 9;
    assert!(matches!(
        load_from_slice(&bad_version),
        Err(IndexError::CorruptIndex(_))
    ));

    // Header says reverse, pool section says forward.
    let mut bad_orientation = bytes.clone();
    bad_orientation[8] = 1;
    assert!(matches!(
        load_from_slice(&bad_orientation),
        Err(IndexError::CorruptIndex(_))
    ));
}

#[test]
fn test_truncation_is_detected_everywhere() {
    let mut rng = StdRng::seed_from_u64(5);
    let index = random_index(&mut rng, false, 400);
    let bytes = save_to_vec(&index);
    for len in (0..bytes.len()).step_by(97).chain([bytes.len() - 1]) {
        assert!(
            matches!(
                load_from_slice(&bytes[..len]),
                Err(IndexError::CorruptIndex(_))
            ),
            "truncation at {} was accepted",
            len
        );
    }
}

#[test]
fn test_random_corruption_never_panics() {
    let mut rng = StdRng::seed_from_u64(99);
    let index = random_index(&mut rng, true, 600);
    let bytes = save_to_vec(&index);
    for _ in 0..300 {
        let mut corrupted = bytes.clone();
        for _ in 0..rng.gen_range(1..4) {
            let at = rng.gen_range(0..corrupted.len());
            corrupted[at] ^= 1 << rng.gen_range(0..8);
        }
        // Either rejected or loaded; a loaded index must still answer.
        if let Ok(loaded) = load_from_slice(&corrupted) {
            let reader = loaded.reader();
            for term in VOCABULARY {
                let _ = reader.retrieve(Algorithm::SvSRanked, &[(term, 1)], None, 5);
            }
        }
    }
}

#[test]
fn test_forged_section_length_is_rejected() {
    let index = AttrScoreInvertedIndex::new(config(false)).unwrap();
    let mut bytes = save_to_vec(&index);
    // First section length sits right after the 9-byte header.
    bytes[9..17].copy_from_slice(&u64::MAX.to_le_bytes());
    assert!(matches!(
        load_from_slice(&bytes),
        Err(IndexError::CorruptIndex(_))
    ));
}

#[test]
fn test_counters_section_closes_the_image() {
    let index = AttrScoreInvertedIndex::new(config(false)).unwrap();
    let mut writer = index.writer().unwrap();
    writer.insert_doc(4, &[("alpha", 1)]).unwrap();
    writer.insert_doc(9, &[("beta", 1)]).unwrap();

    let bytes = save_to_vec(&index);
    let tail = &bytes[bytes.len() - 21..];
    assert_eq!(tail[..8], 13u64.to_le_bytes());
    assert_eq!(tail[8..16], 2u64.to_le_bytes());
    assert_eq!(tail[16], 1);
    assert_eq!(tail[17..], 9u32.to_le_bytes());
}
