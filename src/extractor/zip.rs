// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use std::fs::File;
use std::io::{self, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use crate::extractor::{ExtractError, ExtractionLimits, Extractor};
use zip::ZipArchive;

pub struct ZipExtractor {
    limits: ExtractionLimits,
}

impl ZipExtractor {
    pub fn new(limits: ExtractionLimits) -> Self {
        Self { limits }
    }
}

/// Tracks decompressed bytes against the configured limits
struct BombGuard {
    limits: ExtractionLimits,
    compressed_bytes: u64,
    written_bytes: u64,
}

impl BombGuard {
    fn record(&mut self, count: usize) -> Result<(), ExtractError> {
        self.written_bytes += count as u64;

        if self.written_bytes > self.limits.max_total_bytes {
            return Err(ExtractError::DecompressionBomb(format!(
                "decompressed size exceeds {} bytes",
                self.limits.max_total_bytes
            )));
        }

        if self.written_bytes > self.limits.ratio_threshold_bytes
            && self.written_bytes / self.compressed_bytes.max(1) > self.limits.max_ratio
        {
            return Err(ExtractError::DecompressionBomb(format!(
                "compression ratio exceeds {} ({} bytes from {} compressed)",
                self.limits.max_ratio, self.written_bytes, self.compressed_bytes
            )));
        }

        Ok(())
    }
}

fn extract_blocking(data: Vec<u8>, dest: &Path, limits: ExtractionLimits) -> Result<u64, ExtractError> {
    let mut guard = BombGuard {
        limits,
        compressed_bytes: data.len() as u64,
        written_bytes: 0,
    };

    let mut archive = ZipArchive::new(Cursor::new(data))
        .map_err(|e| ExtractError::InvalidArchive(e.to_string()))?;

    if archive.len() > limits.max_entries {
        return Err(ExtractError::DecompressionBomb(format!(
            "archive has {} entries, limit is {}",
            archive.len(),
            limits.max_entries
        )));
    }

    let mut buffer = [0u8; 8192];
    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| ExtractError::InvalidArchive(e.to_string()))?;

        // Entries with absolute paths or '..' components never leave dest
        let outpath = match file.enclosed_name() {
            Some(path) => dest.join(path),
            None => {
                warn!(entry = %file.name(), "Rejecting archive entry outside of the extraction root");
                return Err(ExtractError::InvalidArchive(format!(
                    "entry '{}' escapes the extraction root",
                    file.name()
                )));
            }
        };

        if file.is_dir() {
            std::fs::create_dir_all(&outpath).map_err(|e| layout_error(file.name(), e))?;
            continue;
        }

        if let Some(parent) = outpath.parent() {
            std::fs::create_dir_all(parent).map_err(|e| layout_error(file.name(), e))?;
        }
        let mut outfile = File::create(&outpath).map_err(|e| layout_error(file.name(), e))?;

        loop {
            let count = file
                .read(&mut buffer)
                .map_err(|e| ExtractError::InvalidArchive(format!("{}: {}", file.name(), e)))?;
            if count == 0 {
                break;
            }
            guard.record(count)?;
            outfile.write_all(&buffer[..count])?;
        }
        debug!(path = %outpath.display(), "Extracted entry");
    }

    Ok(guard.written_bytes)
}

/// Entries that collide with each other (a file where a directory is needed,
/// or the other way round) make the archive invalid. Other failures are I/O.
fn layout_error(entry: &str, err: io::Error) -> ExtractError {
    match err.kind() {
        io::ErrorKind::AlreadyExists | io::ErrorKind::NotADirectory | io::ErrorKind::IsADirectory => {
            ExtractError::InvalidArchive(format!("entry '{}' conflicts with another entry: {}", entry, err))
        }
        _ => ExtractError::Io(err),
    }
}

#[async_trait]
impl Extractor for ZipExtractor {
    async fn extract(&self, data: Vec<u8>, dest: PathBuf) -> Result<(), ExtractError> {
        info!(dest = %dest.display(), compressed_bytes = data.len(), "Extracting ZIP archive");

        tokio::fs::create_dir_all(&dest).await?;

        let limits = self.limits;
        let dest_clone = dest.clone();
        let written = tokio::task::spawn_blocking(move || extract_blocking(data, &dest_clone, limits))
            .await
            .map_err(|e| ExtractError::Io(std::io::Error::other(e)))??;

        info!(dest = %dest.display(), decompressed_bytes = written, "ZIP extraction completed");
        Ok(())
    }
}

impl Default for ZipExtractor {
    fn default() -> Self {
        Self::new(ExtractionLimits::default())
    }
}
