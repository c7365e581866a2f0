//! Index configuration.
//!
//! Configuration is plain data: it can be built in code through
//! [`IndexConfig::builder`] or loaded from a JSON file, with every omitted
//! field falling back to its default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LoupeError, Result};

/// Configuration for the whole index: locations plus per-component settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Directory holding the journal pages.
    pub journal_dir: PathBuf,
    /// Directory holding the live index generation.
    pub index_dir: PathBuf,
    /// Directory the next generation is built into before publication.
    /// Defaults to `index_dir/staging`.
    #[serde(default)]
    pub staging_dir: Option<PathBuf>,
    #[serde(default)]
    pub journal: JournalConfig,
    #[serde(default)]
    pub reverse: ReverseIndexConfig,
    #[serde(default)]
    pub query: QueryConfig,
}

impl IndexConfig {
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(journal_dir: P, index_dir: Q) -> Self {
        IndexConfig {
            journal_dir: journal_dir.into(),
            index_dir: index_dir.into(),
            staging_dir: None,
            journal: JournalConfig::default(),
            reverse: ReverseIndexConfig::default(),
            query: QueryConfig::default(),
        }
    }

    pub fn builder<P: Into<PathBuf>, Q: Into<PathBuf>>(
        journal_dir: P,
        index_dir: Q,
    ) -> IndexConfigBuilder {
        IndexConfigBuilder {
            config: IndexConfig::new(journal_dir, index_dir),
        }
    }

    /// Load from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let config: IndexConfig = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(path, data)?;
        Ok(())
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.staging_dir
            .clone()
            .unwrap_or_else(|| self.index_dir.join("staging"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.journal.records_per_page == 0 {
            return Err(LoupeError::invalid_argument(
                "journal.records_per_page must be positive",
            ));
        }
        if self.reverse.block_size < 2 {
            return Err(LoupeError::invalid_argument(
                "reverse.block_size must be at least 2",
            ));
        }
        if self.query.buffer_size == 0 {
            return Err(LoupeError::invalid_argument(
                "query.buffer_size must be positive",
            ));
        }
        if self.query.coherence_window == 0 {
            return Err(LoupeError::invalid_argument(
                "query.coherence_window must be positive",
            ));
        }
        Ok(())
    }
}

/// Journal writer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalConfig {
    /// Records per journal page before the paging writer rolls over.
    pub records_per_page: u64,
    /// Size of the record staging buffer in bytes.
    pub buffer_size: usize,
    /// zstd compression level for journal pages.
    pub compression_level: i32,
}

impl Default for JournalConfig {
    fn default() -> Self {
        JournalConfig {
            records_per_page: 100_000,
            buffer_size: 64 * 1024,
            compression_level: 3,
        }
    }
}

/// Reverse index construction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReverseIndexConfig {
    /// Postings per skip-list block; a checkpoint is stored for each block.
    pub block_size: usize,
}

impl Default for ReverseIndexConfig {
    fn default() -> Self {
        ReverseIndexConfig { block_size: 64 }
    }
}

/// Query execution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Capacity of the id buffer each source fills per round.
    pub buffer_size: usize,
    /// Budget applied when a query does not carry its own timeout.
    pub default_timeout_ms: u64,
    /// Default number of results to collect.
    pub default_fetch_size: usize,
    /// Good-priority queries are skipped once more than `fetch_size / good_divisor` results exist.
    pub good_divisor: usize,
    /// Fallback-priority queries are skipped once more than `fetch_size / fallback_divisor` results exist.
    pub fallback_divisor: usize,
    /// Width in token positions of one coherence bucket.
    pub coherence_window: usize,
    /// Priority-tier queries are only generated up to this many subqueries.
    pub max_priority_subqueries: usize,
}

impl QueryConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        QueryConfig {
            buffer_size: 512,
            default_timeout_ms: 150,
            default_fetch_size: 100,
            good_divisor: 4,
            fallback_divisor: 8,
            coherence_window: 4,
            max_priority_subqueries: 4,
        }
    }
}

/// Builder for [`IndexConfig`].
pub struct IndexConfigBuilder {
    config: IndexConfig,
}

impl IndexConfigBuilder {
    pub fn staging_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.config.staging_dir = Some(dir.into());
        self
    }

    pub fn records_per_page(mut self, records: u64) -> Self {
        self.config.journal.records_per_page = records;
        self
    }

    pub fn journal_buffer_size(mut self, bytes: usize) -> Self {
        self.config.journal.buffer_size = bytes;
        self
    }

    pub fn compression_level(mut self, level: i32) -> Self {
        self.config.journal.compression_level = level;
        self
    }

    pub fn block_size(mut self, postings: usize) -> Self {
        self.config.reverse.block_size = postings;
        self
    }

    pub fn query_buffer_size(mut self, size: usize) -> Self {
        self.config.query.buffer_size = size;
        self
    }

    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.config.query.default_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn default_fetch_size(mut self, size: usize) -> Self {
        self.config.query.default_fetch_size = size;
        self
    }

    pub fn coherence_window(mut self, positions: usize) -> Self {
        self.config.query.coherence_window = positions;
        self
    }

    pub fn build(self) -> Result<IndexConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
