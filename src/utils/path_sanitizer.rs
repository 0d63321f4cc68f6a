// SPDX-License-Identifier: GPL-3.0-only
use std::path::{Component, Path};
use anyhow::Result;

/// Sanitize a single path segment supplied by a client
///
/// Keeps letters, digits, '-' and '_'. Fails if nothing is left, so the
/// result can always be joined onto a base directory as one component.
pub fn sanitize_path_segment(segment: &str) -> Result<String> {
    let sanitized: String = segment
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();

    if sanitized.is_empty() {
        return Err(anyhow::anyhow!("Path segment '{}' is empty after sanitization", segment));
    }

    if sanitized.len() > 64 {
        return Err(anyhow::anyhow!("Path segment too long (max 64 characters)"));
    }

    Ok(sanitized)
}

/// Sanitize a filename taken from a multipart upload
///
/// Drops any directory parts and unsafe characters.
pub fn sanitize_filename(filename: &str) -> String {
    let filename_only = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(filename);

    let sanitized: String = filename_only
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_' || *c == '.' || *c == ' ')
        .collect();

    sanitized.trim().to_string()
}

/// Lower-cased extension of a filename, if it has one
pub fn file_extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

/// Reject relative paths that would escape the directory they are joined onto
///
/// Works for paths that do not exist yet.
pub fn validate_relative_path(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(anyhow::anyhow!("Path is empty"));
    }

    for component in path.components() {
        match component {
            Component::Normal(_) => {}
            Component::ParentDir => {
                return Err(anyhow::anyhow!(
                    "Path {} contains parent directory reference (..)",
                    path.display()
                ));
            }
            _ => {
                return Err(anyhow::anyhow!("Path {} is not relative", path.display()));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path_segment_basic() {
        assert_eq!(sanitize_path_segment("coop").unwrap(), "coop");
        assert_eq!(sanitize_path_segment("ad-hoc_2").unwrap(), "ad-hoc_2");
    }

    #[test]
    fn test_sanitize_path_segment_strips_traversal() {
        assert_eq!(sanitize_path_segment("../../etc").unwrap(), "etc");
        assert!(sanitize_path_segment("../..").is_err());
        assert!(sanitize_path_segment("").is_err());
    }

    #[test]
    fn test_sanitize_path_segment_too_long() {
        assert!(sanitize_path_segment(&"a".repeat(65)).is_err());
    }

    #[test]
    fn test_sanitize_filename_with_path() {
        assert_eq!(sanitize_filename("/path/to/game.zip"), "game.zip");
    }

    #[test]
    fn test_sanitize_filename_with_unsafe_chars() {
        let result = sanitize_filename("file<script>.zip");
        assert!(!result.contains('<') && !result.contains('>'));
    }

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("game.ZIP").as_deref(), Some("zip"));
        assert_eq!(file_extension("archive.tar.gz").as_deref(), Some("gz"));
        assert_eq!(file_extension("noext"), None);
    }

    #[test]
    fn test_validate_relative_path() {
        assert!(validate_relative_path(Path::new("Beta Tropics (Coasts).png")).is_ok());
        assert!(validate_relative_path(Path::new("coop(1)/coop(1)-x.zip")).is_ok());
        assert!(validate_relative_path(Path::new("../escape.png")).is_err());
        assert!(validate_relative_path(Path::new("/etc/passwd")).is_err());
        assert!(validate_relative_path(Path::new("")).is_err());
    }
}
