// SPDX-License-Identifier: GPL-3.0-only
pub mod path_sanitizer;
pub mod permissions;
pub mod preview_name;
pub mod template;

pub use path_sanitizer::{file_extension, sanitize_filename, sanitize_path_segment, validate_relative_path};
pub use permissions::{create_dirs, set_default_file_permission};
pub use preview_name::decode_preview_name;
pub use template::fill_template;
