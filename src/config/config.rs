// SPDX-License-Identifier: GPL-3.0-only
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::logging::LogFormat;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database path for the map registry
    pub registry_db_path: PathBuf,

    /// HTTP API bind address (e.g., "127.0.0.1:8080")
    pub api_bind: SocketAddr,

    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Log line format ("pretty" or "json")
    pub log_format: LogFormat,

    /// Root under which per-upload scratch workspaces are created
    pub temp_dir: PathBuf,

    pub map: MapConfig,

    pub game_logs: GameLogsConfig,

    pub replay: ReplayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Content store for map archives
    pub target_directory: PathBuf,

    /// Content store for preview images
    pub preview_directory: PathBuf,

    /// Download link template, `{}` is replaced by the archive name
    pub download_url_format: String,

    /// Thumbnail link template, `{}` is replaced by the preview file name
    pub previews_url_format: String,

    /// Largest request body accepted by the upload endpoint
    pub max_upload_size_bytes: usize,

    /// Absolute cap on decompressed bytes per upload
    pub max_extraction_size_bytes: u64,

    /// Maximum number of entries in an uploaded archive
    pub max_extraction_file_count: usize,

    /// Decompressed byte count after which the ratio check applies
    pub zip_bomb_byte_threshold: u64,

    /// Maximum ratio of decompressed to compressed bytes
    pub zip_bomb_max_ratio: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameLogsConfig {
    pub target_directory: PathBuf,

    pub max_file_size_bytes: u64,

    /// File extensions accepted by the log upload endpoint
    pub allowed_extensions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Replay link template, `{}` is replaced by the sharded replay path
    pub download_url_format: String,
}

impl Config {
    /// Load configuration from TOML file with environment variable overrides
    pub fn load() -> anyhow::Result<Self> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Same as [`Config::load`], reading variables through `env`.
    pub fn load_with(env: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let config_path = env("MAPVAULT_CONFIG").unwrap_or_else(|| "config.toml".to_string());

        let mut config: Config = if Path::new(&config_path).exists() {
            let contents = std::fs::read_to_string(&config_path)?;
            toml::from_str(&contents)?
        } else {
            Config::default()
        };

        if let Some(val) = env("MAPVAULT_REGISTRY_DB_PATH") {
            config.registry_db_path = PathBuf::from(val);
        }
        if let Some(val) = env("MAPVAULT_API_BIND") {
            config.api_bind = SocketAddr::from_str(&val)?;
        }
        if let Some(val) = env("MAPVAULT_LOG_LEVEL") {
            config.log_level = val;
        }
        if let Some(val) = env("MAPVAULT_LOG_FORMAT") {
            config.log_format = match val.to_lowercase().as_str() {
                "json" => LogFormat::Json,
                "pretty" => LogFormat::Pretty,
                other => anyhow::bail!("Unknown log format: {}", other),
            };
        }
        if let Some(val) = env("MAPVAULT_TEMP_DIR") {
            config.temp_dir = PathBuf::from(val);
        }
        if let Some(val) = env("MAPVAULT_MAP_TARGET_DIRECTORY") {
            config.map.target_directory = PathBuf::from(val);
        }
        if let Some(val) = env("MAPVAULT_MAP_PREVIEW_DIRECTORY") {
            config.map.preview_directory = PathBuf::from(val);
        }
        if let Some(val) = env("MAPVAULT_MAP_DOWNLOAD_URL_FORMAT") {
            config.map.download_url_format = val;
        }
        if let Some(val) = env("MAPVAULT_MAP_PREVIEWS_URL_FORMAT") {
            config.map.previews_url_format = val;
        }
        if let Some(val) = env("MAPVAULT_MAP_MAX_UPLOAD_SIZE_BYTES") {
            config.map.max_upload_size_bytes = val.parse()?;
        }
        if let Some(val) = env("MAPVAULT_GAME_LOGS_TARGET_DIRECTORY") {
            config.game_logs.target_directory = PathBuf::from(val);
        }
        if let Some(val) = env("MAPVAULT_REPLAY_DOWNLOAD_URL_FORMAT") {
            config.replay.download_url_format = val;
        }

        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            registry_db_path: PathBuf::from("registry.db"),
            api_bind: SocketAddr::from((Ipv4Addr::LOCALHOST, 8080)),
            log_level: String::from("info"),
            log_format: LogFormat::Pretty,
            temp_dir: std::env::temp_dir().join("mapvault"),
            map: MapConfig::default(),
            game_logs: GameLogsConfig::default(),
            replay: ReplayConfig::default(),
        }
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            target_directory: PathBuf::from("/opt/mapvault/maps"),
            preview_directory: PathBuf::from("/opt/mapvault/maps/mini"),
            download_url_format: String::from("http://localhost:8080/maps/{}"),
            previews_url_format: String::from("http://localhost:8080/maps/mini/{}"),
            max_upload_size_bytes: 256 * 1024 * 1024, // 256MB
            max_extraction_size_bytes: 1024 * 1024 * 1024, // 1GB
            max_extraction_file_count: 10000,
            zip_bomb_byte_threshold: 5_000_000,
            zip_bomb_max_ratio: 200,
        }
    }
}

impl Default for GameLogsConfig {
    fn default() -> Self {
        Self {
            target_directory: PathBuf::from("/opt/mapvault/game-logs"),
            max_file_size_bytes: 1_000_000,
            allowed_extensions: vec![String::from("zip")],
        }
    }
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            download_url_format: String::from("http://localhost:8080/replays/{}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::NamedTempFile;

    fn env_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.registry_db_path, PathBuf::from("registry.db"));
        assert_eq!(config.api_bind, SocketAddr::from_str("127.0.0.1:8080").unwrap());
        assert_eq!(config.log_level, "info");
        assert_eq!(config.map.zip_bomb_byte_threshold, 5_000_000);
        assert_eq!(config.map.zip_bomb_max_ratio, 200);
        assert_eq!(config.map.max_upload_size_bytes, 256 * 1024 * 1024);
        assert_eq!(config.game_logs.max_file_size_bytes, 1_000_000);
        assert_eq!(config.game_logs.allowed_extensions, vec!["zip".to_string()]);
    }

    #[test]
    fn test_load_missing_config_file() {
        let config = Config::load_with(env_from(&[("MAPVAULT_CONFIG", "/does/not/exist.toml")])).unwrap();
        assert_eq!(config.registry_db_path, PathBuf::from("registry.db"));
        assert_eq!(config.map.target_directory, PathBuf::from("/opt/mapvault/maps"));
    }

    #[test]
    fn test_load_from_toml() {
        let temp_file = NamedTempFile::new().unwrap();
        let config_content = r#"
registry_db_path = "/custom/registry.db"
api_bind = "0.0.0.0:9000"
log_level = "debug"
log_format = "json"
temp_dir = "/custom/tmp"

[map]
target_directory = "/custom/maps"
preview_directory = "/custom/maps/mini"
download_url_format = "https://content.example.com/maps/{}"
previews_url_format = "https://content.example.com/maps/mini/{}"

[game_logs]
target_directory = "/custom/logs"
allowed_extensions = ["zip", "log"]

[replay]
download_url_format = "https://replay.example.com/{}"
"#;
        fs::write(temp_file.path(), config_content).unwrap();
        let path = temp_file.path().to_str().unwrap().to_string();

        let config = Config::load_with(env_from(&[("MAPVAULT_CONFIG", path.as_str())])).unwrap();
        assert_eq!(config.registry_db_path, PathBuf::from("/custom/registry.db"));
        assert_eq!(config.api_bind, SocketAddr::from_str("0.0.0.0:9000").unwrap());
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.temp_dir, PathBuf::from("/custom/tmp"));
        assert_eq!(config.map.target_directory, PathBuf::from("/custom/maps"));
        assert_eq!(config.map.download_url_format, "https://content.example.com/maps/{}");
        assert_eq!(config.game_logs.allowed_extensions, vec!["zip".to_string(), "log".to_string()]);
        assert_eq!(config.replay.download_url_format, "https://replay.example.com/{}");
        // omitted keys keep their defaults
        assert_eq!(config.map.zip_bomb_max_ratio, 200);
        assert_eq!(config.game_logs.max_file_size_bytes, 1_000_000);
    }

    #[test]
    fn test_env_var_overrides() {
        let config = Config::load_with(env_from(&[
            ("MAPVAULT_CONFIG", "/does/not/exist.toml"),
            ("MAPVAULT_REGISTRY_DB_PATH", "/env/registry.db"),
            ("MAPVAULT_API_BIND", "192.168.1.1:9090"),
            ("MAPVAULT_LOG_LEVEL", "trace"),
            ("MAPVAULT_MAP_TARGET_DIRECTORY", "/env/maps"),
            ("MAPVAULT_MAP_PREVIEW_DIRECTORY", "/env/previews"),
            ("MAPVAULT_MAP_MAX_UPLOAD_SIZE_BYTES", "1048576"),
        ]))
        .unwrap();

        assert_eq!(config.registry_db_path, PathBuf::from("/env/registry.db"));
        assert_eq!(config.api_bind, SocketAddr::from_str("192.168.1.1:9090").unwrap());
        assert_eq!(config.log_level, "trace");
        assert_eq!(config.map.target_directory, PathBuf::from("/env/maps"));
        assert_eq!(config.map.preview_directory, PathBuf::from("/env/previews"));
        assert_eq!(config.map.max_upload_size_bytes, 1_048_576);
    }

    #[test]
    fn test_env_var_invalid_bind_address() {
        let result = Config::load_with(env_from(&[
            ("MAPVAULT_CONFIG", "/does/not/exist.toml"),
            ("MAPVAULT_API_BIND", "not-an-address"),
        ]));
        assert!(result.is_err());
    }
}
