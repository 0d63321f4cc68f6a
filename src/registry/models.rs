// SPDX-License-Identifier: GPL-3.0-only
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BanLevel {
    Global,
    Chat,
    Vault,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BanDurationType {
    Permanent,
    Temporary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BanInfo {
    pub level: BanLevel,

    pub duration: BanDurationType,

    /// End of a temporary ban
    pub expires_at: Option<DateTime<Utc>>,

    /// Set when a moderator lifted the ban early
    pub revoked_at: Option<DateTime<Utc>>,
}

impl BanInfo {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        if self.revoked_at.is_some_and(|revoked| revoked <= now) {
            return false;
        }
        match self.duration {
            BanDurationType::Permanent => true,
            BanDurationType::Temporary => self.expires_at.is_some_and(|expires| expires > now),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: i64,

    pub login: String,

    /// May manage any map, regardless of authorship
    #[serde(default)]
    pub is_admin: bool,

    #[serde(default)]
    pub bans: Vec<BanInfo>,
}

impl Player {
    pub fn new(id: i64, login: impl Into<String>) -> Self {
        Self {
            id,
            login: login.into(),
            is_admin: false,
            bans: Vec::new(),
        }
    }

    /// The currently active ban of the given level, if any
    pub fn active_ban_of(&self, level: BanLevel) -> Option<&BanInfo> {
        let now = Utc::now();
        self.bans
            .iter()
            .find(|ban| ban.level == level && ban.is_active(now))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapVersion {
    /// Database id, `None` until saved
    pub id: Option<i64>,

    /// 1, 2, 3 ... never reused within a map
    pub version: u32,

    /// Content hash, the de-duplication key of a version
    pub crc: String,

    pub description: String,

    pub width: u32,

    pub height: u32,

    pub max_players: u32,

    pub ranked: bool,

    pub hidden: bool,

    /// "{archive}/{map name}/{crc}"
    pub filename: String,
}

impl MapVersion {
    pub fn new(version: u32, crc: impl Into<String>) -> Self {
        Self {
            id: None,
            version,
            crc: crc.into(),
            description: String::new(),
            width: 8,
            height: 8,
            max_players: 10,
            ranked: false,
            hidden: false,
            filename: String::new(),
        }
    }

    /// The archive segment of `filename`
    pub fn archive_name(&self) -> &str {
        self.filename.split('/').next().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Map {
    /// Database id, `None` until saved
    pub id: Option<i64>,

    /// Unique within the store
    pub display_name: String,

    /// Player id of the first uploader
    pub author: Option<i64>,

    pub map_type: String,

    pub battle_type: String,

    pub versions: Vec<MapVersion>,
}

impl Map {
    pub fn new(display_name: impl Into<String>, author: Option<i64>) -> Self {
        Self {
            id: None,
            display_name: display_name.into(),
            author,
            map_type: String::from("FFA"),
            battle_type: String::from("skirmish"),
            versions: Vec::new(),
        }
    }

    /// Highest version number, 0 when there are none
    pub fn max_version(&self) -> u32 {
        self.versions.iter().map(|v| v.version).max().unwrap_or(0)
    }

    pub fn version_by_crc_mut(&mut self, crc: &str) -> Option<&mut MapVersion> {
        self.versions.iter_mut().find(|v| v.crc == crc)
    }

    pub fn version_mut(&mut self, version: u32) -> Option<&mut MapVersion> {
        self.versions.iter_mut().find(|v| v.version == version)
    }
}
