// SPDX-License-Identifier: GPL-3.0-only
use std::sync::LazyLock;
use regex::Regex;
use serde::Serialize;

use crate::error::Violation;

pub const MAP_NAME_MIN_LENGTH: usize = 4;
pub const MAP_NAME_MAX_LENGTH: usize = 50;
pub const MAP_NAME_MINUS_MAX_OCCURRENCE: usize = 3;

pub const FILE_ENDING_MAP: &str = ".ufo";
pub const FILE_ENDING_SCENARIO: &str = "_scenario.lua";
pub const FILE_ENDING_SCRIPT: &str = "_script.lua";
pub const FILE_ENDING_SAVE: &str = "_save.lua";

static VALID_CHARACTERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9\- ]+$").expect("static regex"));
static LEADING_NON_LETTERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^a-zA-Z]+").expect("static regex"));

/// Lowercase `name`, trim it and collapse whitespace runs into one space
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Check a map title against every naming rule
///
/// All rules are evaluated, the result lists every one that fired.
pub fn validate_map_name(name: &str) -> Vec<Violation> {
    let mut violations = Vec::new();
    let length = name.chars().count();

    if !VALID_CHARACTERS.is_match(name) {
        violations.push(Violation::InvalidCharacter);
    }

    if length < MAP_NAME_MIN_LENGTH {
        violations.push(Violation::TooShort {
            min: MAP_NAME_MIN_LENGTH,
            actual: length,
        });
    }

    if length > MAP_NAME_MAX_LENGTH {
        violations.push(Violation::TooLong {
            max: MAP_NAME_MAX_LENGTH,
            actual: length,
        });
    }

    if name.matches('-').count() > MAP_NAME_MINUS_MAX_OCCURRENCE {
        violations.push(Violation::InvalidMinusOccurrence {
            max: MAP_NAME_MINUS_MAX_OCCURRENCE,
        });
    }

    if LEADING_NON_LETTERS.is_match(name) {
        violations.push(Violation::DoesNotStartWithLetter);
    }

    violations
}

/// Derives folder and file names from a map's display name
#[derive(Debug, Clone)]
pub struct MapNameBuilder {
    display_name: String,
    normalized: String,
}

impl MapNameBuilder {
    pub fn new(display_name: impl Into<String>) -> Self {
        let display_name = display_name.into();
        let normalized = normalize_name(&display_name);
        Self {
            display_name,
            normalized,
        }
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn normalized_name(&self) -> &str {
        &self.normalized
    }

    /// `{normalized}.v0007`
    pub fn folder_name(&self, version: u32) -> String {
        format!("{}.v{:04}", self.normalized, version)
    }

    pub fn file_name(&self, suffix: &str) -> String {
        format!("{}{}", self.normalized, suffix)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileNames {
    pub scmap: String,
    pub scenario_lua: String,
    pub script_lua: String,
    pub save_lua: String,
}

/// Suggested names for the next version of a map
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapNameValidation {
    pub display_name: String,
    pub next_version: u32,
    pub folder_name: String,
    pub file_names: FileNames,
}

impl MapNameValidation {
    pub fn new(builder: &MapNameBuilder, next_version: u32) -> Self {
        Self {
            display_name: builder.display_name().to_string(),
            next_version,
            folder_name: builder.folder_name(next_version),
            file_names: FileNames {
                scmap: builder.file_name(FILE_ENDING_MAP),
                scenario_lua: builder.file_name(FILE_ENDING_SCENARIO),
                script_lua: builder.file_name(FILE_ENDING_SCRIPT),
                save_lua: builder.file_name(FILE_ENDING_SAVE),
            },
        }
    }
}
