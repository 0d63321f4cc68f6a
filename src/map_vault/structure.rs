// SPDX-License-Identifier: GPL-3.0-only
use std::path::{Path, PathBuf};

use crate::error::{UploadError, Violation};
use crate::map_vault::naming::FILE_ENDING_MAP;

/// Directory inside a map package holding the preview images
pub const DIRECTORY_MINIMAPS: &str = "mini";

/// Name suffixes that must be present among a map folder's children
pub const MANDATORY_FILES: [&str; 2] = [DIRECTORY_MINIMAPS, FILE_ENDING_MAP];

/// Archive names shipped with the game itself
pub const OFFICIAL_ARCHIVES: [&str; 32] = [
    "btdata.ccx", "btmaps.ccx", "ccdata.ccx", "ccmaps.ccx", "ccmiss.ccx", "cdmaps.ccx", "rev31.gp3",
    "tactics1.hpi", "tactics2.hpi", "tactics3.hpi", "tactics4.hpi", "tactics5.hpi", "tactics6.hpi",
    "tactics7.hpi", "tactics8.hpi", "totala1.hpi", "totala2.hpi", "totala3.hpi", "totala4.hpi",
    "worlds.hpi", "afark.ufo", "aflea.ufo", "ascarab.ufo", "cometctr.ufo", "cormabm.ufo",
    "cornecro.ufo", "corplas.ufo", "evadrivd.ufo", "example.ufo", "floggen.ufo", "mndsmars.ufo",
    "tademo.ufo",
];

/// Case-insensitive check against [`OFFICIAL_ARCHIVES`]
pub fn is_official_archive(archive_name: &str) -> bool {
    OFFICIAL_ARCHIVES
        .iter()
        .any(|official| official.eq_ignore_ascii_case(archive_name))
}

/// Exact check, used for archive names already stored on map versions
pub fn is_exact_official_archive(archive_name: &str) -> bool {
    OFFICIAL_ARCHIVES.contains(&archive_name)
}

fn list_dir(dir: &Path) -> Result<Vec<PathBuf>, UploadError> {
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        entries.push(entry?.path());
    }
    entries.sort();
    Ok(entries)
}

/// Find the single map folder of an extracted package
///
/// The package must hold exactly one top-level directory, and that directory
/// must contain a regular file with the directory's own name.
pub fn validate_map_folder_structure(extracted_root: &Path) -> Result<PathBuf, UploadError> {
    let entries = list_dir(extracted_root)?;

    let map_folder = entries
        .iter()
        .find(|path| path.is_dir())
        .cloned()
        .ok_or(UploadError::MissingMapFolder)?;

    if entries.len() != 1 {
        return Err(UploadError::InvalidArchiveStructure);
    }

    let archive_name = archive_name_of(&map_folder)?;
    if !map_folder.join(&archive_name).is_file() {
        return Err(UploadError::MissingArchiveInsideFolder(archive_name));
    }

    Ok(map_folder)
}

/// The folder's own name, which is also the name of the archive inside it
pub fn archive_name_of(map_folder: &Path) -> Result<String, UploadError> {
    map_folder
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| UploadError::InvalidArchive(format!("unusable folder name {}", map_folder.display())))
}

/// Every mandatory suffix that no direct child of `map_folder` ends with
pub fn validate_required_files(map_folder: &Path) -> Result<Vec<Violation>, UploadError> {
    let names: Vec<String> = list_dir(map_folder)?
        .iter()
        .filter_map(|path| path.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .collect();

    Ok(MANDATORY_FILES
        .iter()
        .filter(|suffix| !names.iter().any(|name| name.ends_with(*suffix)))
        .map(|suffix| Violation::MissingRequiredFile {
            suffix: suffix.to_string(),
        })
        .collect())
}
