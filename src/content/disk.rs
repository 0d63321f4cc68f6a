// SPDX-License-Identifier: GPL-3.0-only
use std::path::Path;
use anyhow::Context;

/// Reports free space of the volume holding a path
pub trait DiskSpace: Send + Sync {
    fn free_space(&self, path: &Path) -> anyhow::Result<u64>;
}

/// Free space as reported by statvfs(3) for unprivileged users
#[derive(Debug, Default, Clone, Copy)]
pub struct StatvfsDiskSpace;

impl DiskSpace for StatvfsDiskSpace {
    fn free_space(&self, path: &Path) -> anyhow::Result<u64> {
        // Content directories may not exist before the first upload
        let existing = path
            .ancestors()
            .find(|p| p.exists())
            .unwrap_or_else(|| Path::new("."));

        let stat = nix::sys::statvfs::statvfs(existing)
            .with_context(|| format!("statvfs failed for {}", existing.display()))?;

        #[allow(clippy::unnecessary_cast)]
        Ok(stat.blocks_available() as u64 * stat.fragment_size() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_free_space_of_temp_dir() {
        let temp_dir = TempDir::new().unwrap();
        let free = StatvfsDiskSpace.free_space(temp_dir.path()).unwrap();
        assert!(free > 0);
    }

    #[test]
    fn test_free_space_of_missing_dir_uses_ancestor() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("not").join("created").join("yet");
        let free = StatvfsDiskSpace.free_space(&missing).unwrap();
        assert!(free > 0);
    }
}
