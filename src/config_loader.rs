use serde::Deserialize;
use std::{fs, io, path::Path};

use crate::models::{
    common::IndexError,
    segment_pool::SegmentPool,
    types::BLOCK_SIZE,
};

#[derive(Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub index: IndexConfig,
}

#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct IndexConfig {
    /// Store postings lists in descending docID order.
    pub reverse: bool,
    /// Words per segment pool arena.
    pub max_pool_size: u32,
    pub number_of_pools: u32,
    /// Capacity a term's posting buffer starts with before doubling.
    pub initial_buffer_capacity: usize,
    /// `flush` seals buffers holding at least this many postings.
    pub flush_min_postings: usize,
    pub max_terms: Option<usize>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            reverse: false,
            max_pool_size: 1 << 20,
            number_of_pools: 16,
            initial_buffer_capacity: 4,
            flush_min_postings: BLOCK_SIZE,
            max_terms: None,
        }
    }
}

impl IndexConfig {
    pub fn validate(&self) -> Result<(), IndexError> {
        SegmentPool::validate_geometry(self.max_pool_size, self.number_of_pools)?;
        if !(1..=BLOCK_SIZE).contains(&self.initial_buffer_capacity) {
            return Err(IndexError::InvalidConfig(format!(
                "initial_buffer_capacity must be within 1..={}, got {}",
                BLOCK_SIZE, self.initial_buffer_capacity
            )));
        }
        if self.flush_min_postings == 0 {
            return Err(IndexError::InvalidConfig(
                "flush_min_postings must be at least 1".to_string(),
            ));
        }
        if self.max_terms == Some(0) {
            return Err(IndexError::InvalidConfig(
                "max_terms must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }
}

/// Reads the `[index]` table of a TOML file. A missing file yields the
/// defaults.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, IndexError> {
    let config_contents = match fs::read_to_string(path.as_ref()) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            log::info!(
                "config file {} not found, using defaults",
                path.as_ref().display()
            );
            return Ok(Config::default());
        }
        Err(err) => return Err(err.into()),
    };
    let config: Config = toml::from_str(&config_contents)
        .map_err(|err| IndexError::InvalidConfig(err.to_string()))?;
    config.index.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert!(config.index.validate().is_ok());
    }

    #[test]
    fn test_partial_table_keeps_other_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[index]\nreverse = true\nnumber_of_pools = 4").unwrap();
        let config = load_config(file.path()).unwrap();
        assert!(config.index.reverse);
        assert_eq!(config.index.number_of_pools, 4);
        assert_eq!(config.index.max_pool_size, 1 << 20);
        assert_eq!(config.index.flush_min_postings, BLOCK_SIZE);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[index]\nmax_pool_size = 100").unwrap();
        assert!(matches!(
            load_config(file.path()),
            Err(IndexError::InvalidConfig(_))
        ));

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[index]\nunknown_knob = 1").unwrap();
        assert!(matches!(
            load_config(file.path()),
            Err(IndexError::InvalidConfig(_))
        ));
    }
}
