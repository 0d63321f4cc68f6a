// SPDX-License-Identifier: GPL-3.0-only
use serde::Serialize;

use crate::config::MapConfig;
use crate::registry::{Map, MapVersion};
use crate::utils::fill_template;

/// A map version as returned to clients, with derived links
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapVersionView {
    pub version: u32,
    pub description: String,
    pub width: u32,
    pub height: u32,
    pub max_players: u32,
    pub ranked: bool,
    pub hidden: bool,
    pub filename: String,
    pub archive_name: String,
    pub name: String,
    pub crc: String,
    pub download_url: String,
    pub thumbnail_url: String,
}

impl MapVersionView {
    pub fn from_version(version: &MapVersion, config: &MapConfig) -> Self {
        let mut parts = version.filename.splitn(3, '/');
        let archive_name = parts.next().unwrap_or_default().to_string();
        let name = parts.next().unwrap_or_default().to_string();
        let crc = parts.next().unwrap_or_default().to_string();

        Self {
            version: version.version,
            description: version.description.clone(),
            width: version.width,
            height: version.height,
            max_players: version.max_players,
            ranked: version.ranked,
            hidden: version.hidden,
            filename: version.filename.clone(),
            download_url: fill_template(&config.download_url_format, &archive_name),
            thumbnail_url: fill_template(&config.previews_url_format, &format!("{}.png", name)),
            archive_name,
            name,
            crc,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapView {
    pub display_name: String,
    pub author: Option<i64>,
    pub map_type: String,
    pub battle_type: String,
    pub versions: Vec<MapVersionView>,
}

impl MapView {
    pub fn from_map(map: &Map, config: &MapConfig) -> Self {
        let mut versions: Vec<MapVersionView> = map
            .versions
            .iter()
            .map(|version| MapVersionView::from_version(version, config))
            .collect();
        versions.sort_by_key(|v| v.version);

        Self {
            display_name: map.display_name.clone(),
            author: map.author,
            map_type: map.map_type.clone(),
            battle_type: map.battle_type.clone(),
            versions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MapConfig {
        MapConfig {
            download_url_format: "https://content.example/maps/{}".to_string(),
            previews_url_format: "https://content.example/maps/mini/{}".to_string(),
            ..MapConfig::default()
        }
    }

    #[test]
    fn test_from_version_derives_links() {
        let mut version = MapVersion::new(3, "deadbeef");
        version.filename = "Beta Tropics (Coasts).v0002.ufo/Beta Tropics (Coasts)/deadbeef".to_string();

        let view = MapVersionView::from_version(&version, &config());

        assert_eq!(view.archive_name, "Beta Tropics (Coasts).v0002.ufo");
        assert_eq!(view.name, "Beta Tropics (Coasts)");
        assert_eq!(view.crc, "deadbeef");
        assert_eq!(view.download_url, "https://content.example/maps/Beta Tropics (Coasts).v0002.ufo");
        assert_eq!(view.thumbnail_url, "https://content.example/maps/mini/Beta Tropics (Coasts).png");
    }

    #[test]
    fn test_from_version_short_filename() {
        let mut version = MapVersion::new(1, "deadbeef");
        version.filename = "legacy.hpi".to_string();

        let view = MapVersionView::from_version(&version, &config());
        assert_eq!(view.archive_name, "legacy.hpi");
        assert_eq!(view.name, "");
        assert_eq!(view.thumbnail_url, "https://content.example/maps/mini/.png");
    }

    #[test]
    fn test_map_view_sorted_versions() {
        let mut map = Map::new("Beta", Some(1));
        map.versions.push(MapVersion::new(2, "00000002"));
        map.versions.push(MapVersion::new(1, "00000001"));

        let view = MapView::from_map(&map, &config());
        let versions: Vec<u32> = view.versions.iter().map(|v| v.version).collect();
        assert_eq!(versions, vec![1, 2]);

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["displayName"], "Beta");
        assert!(json["versions"][0]["downloadUrl"].is_string());
    }
}
