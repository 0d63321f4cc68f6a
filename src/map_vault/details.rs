// SPDX-License-Identifier: GPL-3.0-only
use std::collections::HashMap;
use std::sync::LazyLock;
use regex::Regex;

use crate::error::{UploadError, Violation};

/// Caller supplied metadata for one map inside an uploaded package
pub type MapDetails = HashMap<String, String>;

pub const KEY_NAME: &str = "name";
pub const KEY_ARCHIVE: &str = "archive";
pub const KEY_CRC: &str = "crc";
pub const KEY_DESCRIPTION: &str = "description";
pub const KEY_SIZE: &str = "size";
pub const KEY_PLAYERS: &str = "players";

const UNKNOWN_MAP: &str = "<unknown>";
const DEFAULT_MAP_SIZE: (u32, u32) = (8, 8);
const DEFAULT_MAX_PLAYERS: u32 = 10;

struct DetailRule {
    key: &'static str,
    pattern: Regex,
    description: &'static str,
}

static MANDATORY_MAP_DETAILS: LazyLock<[DetailRule; 4]> = LazyLock::new(|| {
    [
        DetailRule {
            key: KEY_NAME,
            pattern: Regex::new(r"^[^/]{1,64}$").expect("static regex"),
            description: "map names contain no slashes ('/') and are between 1 and 64 characters long",
        },
        DetailRule {
            key: KEY_ARCHIVE,
            pattern: Regex::new(r"^[0-9A-Za-z \(\)\-_+=\[\]\{\}',.]{1,64}\.(ccx|ufo|hpi)$").expect("static regex"),
            description: "archive filenames have .ccx, .ufo or .hpi extension; contain only characters 0-9, A-Z, a-z, ()[]{}+-=_,. or space; and are between 1 and 64 characters long",
        },
        DetailRule {
            key: KEY_CRC,
            pattern: Regex::new(r"^[0-9a-f]{8}$").expect("static regex"),
            description: "crc is exactly 8 characters long and consists of lower-case hexidecimal digits (0-9, a-f) only",
        },
        // Unanchored: any value with at least one character passes, longer
        // descriptions are stored as given
        DetailRule {
            key: KEY_DESCRIPTION,
            pattern: Regex::new(r".{1,128}").expect("static regex"),
            description: "map's description is not empty",
        },
    ]
});

static MAP_SIZE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]{1,3})[ xX]{1,3}([0-9]{1,3})").expect("static regex"));
static PLAYERS_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^0-9v]+").expect("static regex"));

/// Value of `key`, empty when absent
pub fn detail<'a>(details: &'a MapDetails, key: &str) -> &'a str {
    details.get(key).map(String::as_str).unwrap_or_default()
}

/// Reject an empty batch of detail records
pub fn validate_details_batch(details: &[MapDetails]) -> Result<(), UploadError> {
    if details.is_empty() {
        return UploadError::check(vec![Violation::EmptyDetailList]);
    }
    Ok(())
}

/// Validate one detail record
///
/// Missing keys are reported first. Values are only checked once every
/// mandatory key is present.
pub fn validate_map_details(details: &MapDetails) -> Result<(), UploadError> {
    let map_name = details
        .get(KEY_NAME)
        .map(String::as_str)
        .unwrap_or(UNKNOWN_MAP);

    let missing = MANDATORY_MAP_DETAILS
        .iter()
        .filter(|rule| !details.contains_key(rule.key))
        .map(|rule| Violation::MissingKey {
            map: map_name.to_string(),
            key: rule.key.to_string(),
        })
        .collect();
    UploadError::check(missing)?;

    let bad = MANDATORY_MAP_DETAILS
        .iter()
        .filter_map(|rule| {
            let value = detail(details, rule.key);
            (!rule.pattern.is_match(value)).then(|| Violation::BadKey {
                map: map_name.to_string(),
                key: rule.key.to_string(),
                value: value.to_string(),
                rule: rule.description.to_string(),
            })
        })
        .collect();
    UploadError::check(bad)
}

/// Check a single value against the rule for `key`
pub fn validate_detail_value(map_name: &str, key: &str, value: &str) -> Result<(), UploadError> {
    let violations = MANDATORY_MAP_DETAILS
        .iter()
        .filter(|rule| rule.key == key && !rule.pattern.is_match(value))
        .map(|rule| Violation::BadKey {
            map: map_name.to_string(),
            key: rule.key.to_string(),
            value: value.to_string(),
            rule: rule.description.to_string(),
        })
        .collect();
    UploadError::check(violations)
}

/// Width and height from the `size` hint, falling back to the description
pub fn map_size(size: &str, description: &str) -> (u32, u32) {
    for candidate in [size, description] {
        if let Some(captures) = MAP_SIZE.captures(candidate) {
            let width = captures.get(1).and_then(|m| m.as_str().parse().ok());
            let height = captures.get(2).and_then(|m| m.as_str().parse().ok());
            if let (Some(width), Some(height)) = (width, height) {
                return (width, height);
            }
        }
    }
    DEFAULT_MAP_SIZE
}

/// Largest player count found in free-form text such as "2,4,6" or "1v1 or 2v2"
pub fn max_players(players: &str) -> u32 {
    let max = PLAYERS_SEPARATOR
        .replace_all(players, ",")
        .split(',')
        .map(|token| {
            token
                .split('v')
                .map(|part| part.parse::<u32>().unwrap_or(0))
                .fold(0u32, u32::saturating_add)
        })
        .max()
        .unwrap_or(0);

    if max >= 2 { max } else { DEFAULT_MAX_PLAYERS }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_details() -> MapDetails {
        [
            (KEY_NAME, "Beta Tropics (Coasts)"),
            (KEY_ARCHIVE, "Beta Tropics (Coasts).ufo"),
            (KEY_CRC, "deadbeef"),
            (KEY_DESCRIPTION, "a map"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn test_valid_details() {
        assert!(validate_map_details(&valid_details()).is_ok());
    }

    #[test]
    fn test_empty_batch() {
        let err = validate_details_batch(&[]).unwrap_err();
        assert_eq!(err.codes(), vec!["EMPTY_DETAIL_LIST"]);
        assert!(validate_details_batch(&[valid_details()]).is_ok());
    }

    #[test]
    fn test_missing_keys_reported_together() {
        let mut details = valid_details();
        details.remove(KEY_CRC);
        details.remove(KEY_DESCRIPTION);
        // a bad archive is not reported while keys are missing
        details.insert(KEY_ARCHIVE.to_string(), "bad.zip".to_string());

        let err = validate_map_details(&details).unwrap_err();
        assert_eq!(err.codes(), vec!["MISSING_KEY", "MISSING_KEY"]);
        assert_eq!(
            err.violations()[0],
            Violation::MissingKey {
                map: "Beta Tropics (Coasts)".to_string(),
                key: "crc".to_string(),
            }
        );
    }

    #[test]
    fn test_missing_name_uses_placeholder() {
        let mut details = valid_details();
        details.remove(KEY_NAME);

        let err = validate_map_details(&details).unwrap_err();
        assert_eq!(
            err.violations(),
            &[Violation::MissingKey {
                map: "<unknown>".to_string(),
                key: "name".to_string(),
            }]
        );
    }

    #[test]
    fn test_bad_keys() {
        for (key, value) in [
            (KEY_NAME, "Beta/Tropics"),
            (KEY_NAME, ""),
            (KEY_ARCHIVE, "Beta Tropics (Coasts).zip"),
            (KEY_ARCHIVE, "Beta Tropics <Coasts>.ufo"),
            (KEY_CRC, "DEADBEEF"),
            (KEY_CRC, "deadbeef0"),
            (KEY_DESCRIPTION, ""),
        ] {
            let mut details = valid_details();
            details.insert(key.to_string(), value.to_string());

            let err = validate_map_details(&details).unwrap_err();
            assert_eq!(err.codes(), vec!["BAD_KEY"], "{}={:?}", key, value);
            match &err.violations()[0] {
                Violation::BadKey { key: bad_key, value: bad_value, .. } => {
                    assert_eq!(bad_key, key);
                    assert_eq!(bad_value, value);
                }
                other => panic!("unexpected violation {:?}", other),
            }
        }
    }

    #[test]
    fn test_bad_key_rule_text() {
        let mut details = valid_details();
        details.insert(KEY_CRC.to_string(), "xyz".to_string());

        let err = validate_map_details(&details).unwrap_err();
        assert!(err.to_string().contains("lower-case hexidecimal digits"));
    }

    #[test]
    fn test_validate_detail_value() {
        assert!(validate_detail_value("Map", KEY_DESCRIPTION, "new text").is_ok());
        assert!(validate_detail_value("Map", KEY_DESCRIPTION, "").is_err());
    }

    #[test]
    fn test_long_description_accepted() {
        let long = "d".repeat(300);
        assert!(validate_detail_value("Map", KEY_DESCRIPTION, &long).is_ok());
    }

    #[test]
    fn test_map_size() {
        assert_eq!(map_size("20x20", ""), (20, 20));
        assert_eq!(map_size("10 X 15 km", ""), (10, 15));
        assert_eq!(map_size("", "12 x 8, lots of metal"), (12, 8));
        assert_eq!(map_size("huge", "no size here"), (8, 8));
        assert_eq!(map_size("size 20x20", ""), (8, 8));
        assert_eq!(map_size("5x5", "30x30"), (5, 5));
    }

    #[test]
    fn test_max_players() {
        assert_eq!(max_players("10"), 10);
        assert_eq!(max_players("2,4,6,8"), 8);
        assert_eq!(max_players("1v1 or 2v2"), 4);
        assert_eq!(max_players("3v3v3"), 9);
        assert_eq!(max_players("1"), 10);
        assert_eq!(max_players(""), 10);
        assert_eq!(max_players("lots"), 10);
    }

    #[test]
    fn test_derivation_is_stable() {
        for _ in 0..3 {
            assert_eq!(map_size("16x16", "desc"), (16, 16));
            assert_eq!(max_players("4v4"), 8);
        }
    }
}
