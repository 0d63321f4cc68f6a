// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use std::path::PathBuf;

use crate::config::MapConfig;

/// Safety limits applied while unpacking an untrusted archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionLimits {
    /// Absolute cap on decompressed bytes
    pub max_total_bytes: u64,

    /// Maximum number of entries
    pub max_entries: usize,

    /// Decompressed byte count after which the ratio check applies
    pub ratio_threshold_bytes: u64,

    /// Maximum ratio of decompressed to compressed bytes
    pub max_ratio: u64,
}

impl From<&MapConfig> for ExtractionLimits {
    fn from(config: &MapConfig) -> Self {
        Self {
            max_total_bytes: config.max_extraction_size_bytes,
            max_entries: config.max_extraction_file_count,
            ratio_threshold_bytes: config.zip_bomb_byte_threshold,
            max_ratio: config.zip_bomb_max_ratio,
        }
    }
}

impl Default for ExtractionLimits {
    fn default() -> Self {
        (&MapConfig::default()).into()
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ExtractError {
    #[error("decompression bomb detected: {0}")]
    DecompressionBomb(String),

    #[error("invalid archive: {0}")]
    InvalidArchive(String),

    #[error("failed to write extracted content: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait Extractor: Send + Sync {
    /// Unpack `data` into `dest`, creating it if needed
    async fn extract(&self, data: Vec<u8>, dest: PathBuf) -> Result<(), ExtractError>;
}
