// SPDX-License-Identifier: GPL-3.0-only
pub mod disk;
pub mod promoter;

pub use disk::{DiskSpace, StatvfsDiskSpace};
pub use promoter::{copy_map_archive, copy_previews, present_previews, versioned_archive_name};
