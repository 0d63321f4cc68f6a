// SPDX-License-Identifier: GPL-3.0-only
use std::fmt;

use crate::extractor::ExtractError;

/// Coarse classification of an upload failure, used by callers to pick a
/// response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Conflict,
    ResourceExhausted,
    Forbidden,
    Structural,
    NotFound,
    Internal,
}

/// A single rule violation. Validation failures collect these and report
/// them together.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    #[error("map name may only contain letters, digits, '-' and spaces")]
    InvalidCharacter,

    #[error("map name must be at least {min} characters long, was {actual}")]
    TooShort { min: usize, actual: usize },

    #[error("map name must be at most {max} characters long, was {actual}")]
    TooLong { max: usize, actual: usize },

    #[error("map name must not contain more than {max} '-' characters")]
    InvalidMinusOccurrence { max: usize },

    #[error("map name must start with a letter")]
    DoesNotStartWithLetter,

    #[error("map package is missing a required file ending with '{suffix}'")]
    MissingRequiredFile { suffix: String },

    #[error("map details must not be empty")]
    EmptyDetailList,

    #[error("details of map '{map}' are missing key '{key}'")]
    MissingKey { map: String, key: String },

    #[error("details of map '{map}' have invalid {key} '{value}': {rule}")]
    BadKey {
        map: String,
        key: String,
        value: String,
        rule: String,
    },

    #[error("map package is missing {} preview image(s): {missing:?}", .missing.len())]
    MissingPreview { missing: Vec<String> },
}

impl Violation {
    pub fn code(&self) -> &'static str {
        match self {
            Violation::InvalidCharacter => "INVALID_CHARACTER",
            Violation::TooShort { .. } => "TOO_SHORT",
            Violation::TooLong { .. } => "TOO_LONG",
            Violation::InvalidMinusOccurrence { .. } => "INVALID_MINUS_OCCURRENCE",
            Violation::DoesNotStartWithLetter => "DOES_NOT_START_WITH_LETTER",
            Violation::MissingRequiredFile { .. } => "MISSING_REQUIRED_FILE",
            Violation::EmptyDetailList => "EMPTY_DETAIL_LIST",
            Violation::MissingKey { .. } => "MISSING_KEY",
            Violation::BadKey { .. } => "BAD_KEY",
            Violation::MissingPreview { .. } => "MISSING_PREVIEW",
        }
    }
}

/// Wrapper so an aggregated failure prints every violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violations(pub Vec<Violation>);

impl fmt::Display for Violations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, violation) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", violation)?;
        }
        Ok(())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum UploadError {
    #[error("validation failed: {0}")]
    Validation(Violations),

    #[error("archive '{0}' is reserved for official content")]
    OfficialArchive(String),

    #[error("map '{0}' belongs to a different author")]
    NotOriginalAuthor(String),

    #[error("details of map '{map}' name archive '{claimed}' but the package contains '{actual}'")]
    ArchiveNameMismatch {
        map: String,
        claimed: String,
        actual: String,
    },

    #[error("not enough free disk space to process the upload")]
    DiskFull,

    #[error("uploaded file exceeds the size limit of {max} bytes (was {actual})")]
    FileSizeExceeded { max: u64, actual: u64 },

    #[error("archive rejected as a decompression bomb: {0}")]
    DecompressionBomb(String),

    #[error("upload forbidden: {0}")]
    Forbidden(String),

    #[error("archive must contain exactly one top-level entry")]
    InvalidArchiveStructure,

    #[error("archive does not contain a map folder")]
    MissingMapFolder,

    #[error("map folder does not contain the archive '{0}'")]
    MissingArchiveInsideFolder(String),

    #[error("invalid archive: {0}")]
    InvalidArchive(String),

    #[error("map '{0}' not found")]
    MapNotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl UploadError {
    /// Build an aggregated validation failure. Returns `Ok` when nothing fired.
    pub fn check(violations: Vec<Violation>) -> Result<(), UploadError> {
        if violations.is_empty() {
            Ok(())
        } else {
            Err(UploadError::Validation(Violations(violations)))
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            UploadError::Validation(_)
            | UploadError::FileSizeExceeded { .. }
            | UploadError::InvalidArgument(_) => ErrorKind::Validation,
            UploadError::OfficialArchive(_)
            | UploadError::NotOriginalAuthor(_)
            | UploadError::ArchiveNameMismatch { .. } => ErrorKind::Conflict,
            UploadError::DiskFull | UploadError::DecompressionBomb(_) => ErrorKind::ResourceExhausted,
            UploadError::Forbidden(_) => ErrorKind::Forbidden,
            UploadError::InvalidArchiveStructure
            | UploadError::MissingMapFolder
            | UploadError::MissingArchiveInsideFolder(_)
            | UploadError::InvalidArchive(_) => ErrorKind::Structural,
            UploadError::MapNotFound(_) => ErrorKind::NotFound,
            UploadError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            UploadError::Validation(_) => "VALIDATION_FAILED",
            UploadError::OfficialArchive(_) => "OFFICIAL_ARCHIVE_REJECTED",
            UploadError::NotOriginalAuthor(_) => "NOT_ORIGINAL_AUTHOR",
            UploadError::ArchiveNameMismatch { .. } => "ARCHIVE_NAME_MISMATCH",
            UploadError::DiskFull => "DISK_FULL",
            UploadError::FileSizeExceeded { .. } => "FILE_SIZE_EXCEEDED",
            UploadError::DecompressionBomb(_) => "DECOMPRESSION_BOMB",
            UploadError::Forbidden(_) => "FORBIDDEN",
            UploadError::InvalidArchiveStructure => "INVALID_ARCHIVE_STRUCTURE",
            UploadError::MissingMapFolder => "MISSING_MAP_FOLDER",
            UploadError::MissingArchiveInsideFolder(_) => "MISSING_ARCHIVE_INSIDE_FOLDER",
            UploadError::InvalidArchive(_) => "INVALID_ARCHIVE",
            UploadError::MapNotFound(_) => "MAP_NOT_FOUND",
            UploadError::InvalidArgument(_) => "INVALID_ARGUMENT",
            UploadError::Internal(_) => "INTERNAL",
        }
    }

    /// Violations carried by an aggregated failure, empty for every other kind.
    pub fn violations(&self) -> &[Violation] {
        match self {
            UploadError::Validation(v) => &v.0,
            _ => &[],
        }
    }

    /// Codes of every violation, or the error's own code when it is not aggregated.
    pub fn codes(&self) -> Vec<&'static str> {
        match self {
            UploadError::Validation(v) => v.0.iter().map(Violation::code).collect(),
            other => vec![other.code()],
        }
    }
}

impl From<std::io::Error> for UploadError {
    fn from(err: std::io::Error) -> Self {
        UploadError::Internal(err.into())
    }
}

impl From<ExtractError> for UploadError {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::DecompressionBomb(reason) => UploadError::DecompressionBomb(reason),
            ExtractError::InvalidArchive(reason) => UploadError::InvalidArchive(reason),
            ExtractError::Io(e) => UploadError::Internal(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_empty_is_ok() {
        assert!(UploadError::check(Vec::new()).is_ok());
    }

    #[test]
    fn test_check_keeps_every_violation() {
        let err = UploadError::check(vec![
            Violation::InvalidCharacter,
            Violation::TooLong { max: 50, actual: 81 },
        ])
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.codes(), vec!["INVALID_CHARACTER", "TOO_LONG"]);
        let message = err.to_string();
        assert!(message.contains("letters, digits"));
        assert!(message.contains("at most 50"));
    }

    #[test]
    fn test_kinds() {
        assert_eq!(UploadError::DiskFull.kind(), ErrorKind::ResourceExhausted);
        assert_eq!(UploadError::OfficialArchive("tademo.ufo".into()).kind(), ErrorKind::Conflict);
        assert_eq!(UploadError::MissingMapFolder.kind(), ErrorKind::Structural);
        assert_eq!(UploadError::Forbidden("banned".into()).kind(), ErrorKind::Forbidden);
        assert_eq!(UploadError::from(anyhow::anyhow!("boom")).kind(), ErrorKind::Internal);
        assert_eq!(UploadError::MapNotFound("Setons".into()).kind(), ErrorKind::NotFound);
        assert_eq!(UploadError::InvalidArgument("id".into()).kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_extract_error_mapping() {
        let bomb: UploadError = ExtractError::DecompressionBomb("ratio".into()).into();
        assert_eq!(bomb.code(), "DECOMPRESSION_BOMB");
        assert_eq!(bomb.kind(), ErrorKind::ResourceExhausted);

        let invalid: UploadError = ExtractError::InvalidArchive("crc".into()).into();
        assert_eq!(invalid.kind(), ErrorKind::Structural);
    }

    #[test]
    fn test_missing_preview_message_counts() {
        let violation = Violation::MissingPreview {
            missing: vec!["A.png".to_string(), "B.png".to_string()],
        };
        assert_eq!(violation.code(), "MISSING_PREVIEW");
        assert!(violation.to_string().contains("A.png"));
        assert!(violation.to_string().contains("missing 2 preview"));
    }
}
