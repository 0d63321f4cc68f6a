// SPDX-License-Identifier: GPL-3.0-only
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use anyhow::{Context, Result};

/// rw-r--r--
pub const DEFAULT_FILE_MODE: u32 = 0o644;

/// rwxr-xr-x
pub const DEFAULT_DIR_MODE: u32 = 0o755;

/// Create a directory and its parents with [`DEFAULT_DIR_MODE`]
pub async fn create_dirs(path: &Path) -> Result<()> {
    tokio::fs::DirBuilder::new()
        .recursive(true)
        .mode(DEFAULT_DIR_MODE)
        .create(path)
        .await
        .with_context(|| format!("Failed to create directory {}", path.display()))
}

/// Reset a promoted file to [`DEFAULT_FILE_MODE`]
pub async fn set_default_file_permission(path: &Path) -> Result<()> {
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(DEFAULT_FILE_MODE))
        .await
        .with_context(|| format!("Failed to set permissions on {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_default_file_permission() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("map.ufo");
        std::fs::write(&file, b"data").unwrap();
        std::fs::set_permissions(&file, std::fs::Permissions::from_mode(0o777)).unwrap();

        set_default_file_permission(&file).await.unwrap();

        let mode = std::fs::metadata(&file).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[tokio::test]
    async fn test_create_dirs_nested() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("a").join("b").join("c");

        create_dirs(&nested).await.unwrap();
        create_dirs(&nested).await.unwrap();

        assert!(nested.is_dir());
        let mode = std::fs::metadata(&nested).unwrap().permissions().mode();
        assert_eq!(mode & 0o700, 0o700);
        assert_eq!(mode & 0o022, 0);
    }
}
