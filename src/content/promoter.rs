// SPDX-License-Identifier: GPL-3.0-only
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use anyhow::Context;
use tracing::{debug, info, warn};
use tokio::io::AsyncWriteExt;
use walkdir::WalkDir;

use crate::utils::{create_dirs, decode_preview_name, set_default_file_permission, validate_relative_path};

/// Pick a name for `archive` that is still free in `target_dir`
///
/// The first upload keeps its name, later ones get `.v0002`, `.v0003` ...
/// inserted before the extension.
pub fn versioned_archive_name(target_dir: &Path, archive: &str) -> String {
    if !target_dir.join(archive).exists() {
        return archive.to_string();
    }

    let (basename, extension) = match archive.rsplit_once('.') {
        Some((base, ext)) => (base, Some(ext)),
        None => (archive, None),
    };

    let mut version: u32 = 2;
    loop {
        let candidate = match extension {
            Some(ext) => format!("{}.v{:04}.{}", basename, version, ext),
            None => format!("{}.v{:04}", basename, version),
        };
        if !target_dir.join(&candidate).exists() {
            return candidate;
        }
        version += 1;
    }
}

/// Copy the validated archive into the content store under `archive_name`
pub async fn copy_map_archive(source: &Path, target_dir: &Path, archive_name: &str) -> anyhow::Result<PathBuf> {
    validate_relative_path(Path::new(archive_name))?;
    create_dirs(target_dir).await?;

    let final_path = target_dir.join(archive_name);

    // Never replace an archive that appeared after the name was chosen
    let mut destination = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&final_path)
        .await
        .with_context(|| format!("Failed to create {}", final_path.display()))?;

    let copied = async {
        let mut input = tokio::fs::File::open(source).await?;
        tokio::io::copy(&mut input, &mut destination).await?;
        destination.flush().await
    }
    .await;
    if let Err(e) = copied {
        drop(destination);
        if let Err(remove_err) = tokio::fs::remove_file(&final_path).await {
            warn!(path = %final_path.display(), error = %remove_err, "Unable to remove partial archive");
        }
        return Err(anyhow::Error::new(e)
            .context(format!("Failed to copy {} to {}", source.display(), final_path.display())));
    }
    drop(destination);
    set_default_file_permission(&final_path).await?;

    info!(path = %final_path.display(), "Map archive promoted");
    Ok(final_path)
}

/// Regular files below `mini_dir`, keyed by their decoded file name
pub fn present_previews(mini_dir: &Path) -> Vec<(PathBuf, String)> {
    WalkDir::new(mini_dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| {
            let decoded = decode_preview_name(&entry.file_name().to_string_lossy());
            (entry.into_path(), decoded)
        })
        .collect()
}

/// Copy the previews named in `expected` into `preview_dir`
///
/// Failures are logged and skipped. Returns how many files were copied.
pub async fn copy_previews(mini_dir: &Path, preview_dir: &Path, expected: &BTreeSet<String>) -> anyhow::Result<usize> {
    create_dirs(preview_dir).await?;

    let mut copied = 0;
    for (source, name) in present_previews(mini_dir) {
        if !expected.contains(&name) {
            continue;
        }

        let destination = preview_dir.join(&name);
        let result = async {
            validate_relative_path(Path::new(&name))?;
            tokio::fs::copy(&source, &destination).await?;
            set_default_file_permission(&destination).await
        }
        .await;

        match result {
            Ok(()) => {
                debug!(preview = %name, "Preview copied");
                copied += 1;
            }
            Err(e) => {
                warn!(
                    source = %source.display(),
                    destination = %destination.display(),
                    error = %e,
                    "Unable to copy preview image"
                );
            }
        }
    }

    Ok(copied)
}
