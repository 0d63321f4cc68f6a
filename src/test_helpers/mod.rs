// SPDX-License-Identifier: GPL-3.0-only
use std::io::{Cursor, Write};
use std::path::Path;
use zip::write::{FileOptions, ZipWriter};

use crate::config::Config;
use crate::content::DiskSpace;
use crate::registry::SqliteRegistry;

/// Create a file-backed SQLite registry inside a fresh temp directory
///
/// In-memory databases are per connection, so a pool would see several.
pub async fn setup_test_database() -> anyhow::Result<(SqliteRegistry, tempfile::TempDir)> {
    let temp_dir = create_temp_dir();
    let registry = SqliteRegistry::new(&temp_dir.path().join("test_registry.db")).await?;
    Ok((registry, temp_dir))
}

/// Create a test configuration with every directory below `root`
pub fn create_test_config(root: &Path) -> Config {
    let mut config = Config {
        registry_db_path: root.join("test_registry.db"),
        temp_dir: root.join("tmp"),
        log_level: "error".to_string(), // Reduce log noise in tests
        ..Config::default()
    };
    config.map.target_directory = root.join("maps");
    config.map.preview_directory = root.join("maps").join("mini");
    config.map.download_url_format = "http://content.test/maps/{}".to_string();
    config.map.previews_url_format = "http://content.test/maps/mini/{}".to_string();
    config.game_logs.target_directory = root.join("game-logs");
    config.replay.download_url_format = "http://content.test/replays/{}".to_string();
    config
}

/// Create a temporary directory for tests
pub fn create_temp_dir() -> tempfile::TempDir {
    tempfile::TempDir::new().expect("Failed to create temp directory")
}

/// Build a ZIP archive in memory. Names ending in '/' become directories.
pub fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in entries {
        if name.ends_with('/') {
            zip.add_directory(*name, FileOptions::default()).expect("add directory");
        } else {
            zip.start_file(*name, FileOptions::default()).expect("start file");
            zip.write_all(data).expect("write entry");
        }
    }
    zip.finish().expect("finish zip").into_inner()
}

/// Free space probe that always reports the same number
pub struct FixedDiskSpace(pub u64);

impl DiskSpace for FixedDiskSpace {
    fn free_space(&self, _path: &Path) -> anyhow::Result<u64> {
        Ok(self.0)
    }
}
