// SPDX-License-Identifier: GPL-3.0-only
use std::path::PathBuf;
use std::sync::Arc;
use anyhow::Context;
use chrono::{DateTime, Utc};
use tracing::info;

use crate::config::{Config, GameLogsConfig, ReplayConfig};
use crate::content::{DiskSpace, StatvfsDiskSpace};
use crate::error::UploadError;
use crate::registry::Player;
use crate::utils::{create_dirs, fill_template, sanitize_path_segment};

const FREE_SPACE_FACTOR: u64 = 10;

pub struct GameService {
    logs: GameLogsConfig,
    replay: ReplayConfig,
    disk_space: Arc<dyn DiskSpace>,
}

impl GameService {
    pub fn new(config: &Config) -> Self {
        Self {
            logs: config.game_logs.clone(),
            replay: config.replay.clone(),
            disk_space: Arc::new(StatvfsDiskSpace),
        }
    }

    /// Replace the free space probe
    pub fn with_disk_space(mut self, disk_space: Arc<dyn DiskSpace>) -> Self {
        self.disk_space = disk_space;
        self
    }

    pub fn logs_config(&self) -> &GameLogsConfig {
        &self.logs
    }

    /// Public download link of a replay
    ///
    /// Replays are sharded by the first eight digits of the zero padded id,
    /// so replay 1234567 lives at `0/1/23/45/1234567.zip`.
    pub fn replay_download_url(&self, replay_id: i64) -> Result<String, UploadError> {
        if replay_id <= 0 {
            return Err(UploadError::InvalidArgument(format!(
                "replay id must be positive, was {}",
                replay_id
            )));
        }

        let padded = format!("{:010}", replay_id);
        let mut path = String::new();
        for i in 0..4 {
            let segment: u32 = padded[i * 2..i * 2 + 2]
                .parse()
                .with_context(|| format!("Unexpected replay id {}", padded))?;
            path.push_str(&format!("{}/", segment));
        }
        path.push_str(&format!("{}.zip", replay_id));

        Ok(fill_template(&self.replay.download_url_format, &path))
    }

    /// Store the log archive of one game run
    pub async fn upload_game_logs(
        &self,
        data: &[u8],
        player: &Player,
        context: &str,
        id: i64,
    ) -> Result<PathBuf, UploadError> {
        self.upload_game_logs_at(data, player, context, id, Utc::now()).await
    }

    async fn upload_game_logs_at(
        &self,
        data: &[u8],
        player: &Player,
        context: &str,
        id: i64,
        now: DateTime<Utc>,
    ) -> Result<PathBuf, UploadError> {
        if data.is_empty() {
            return Err(UploadError::InvalidArgument("log data must not be empty".to_string()));
        }

        let context = sanitize_path_segment(context).map_err(|e| UploadError::InvalidArgument(e.to_string()))?;
        let login = sanitize_path_segment(&player.login).map_err(|e| UploadError::InvalidArgument(e.to_string()))?;

        let folder = self.logs.target_directory.join(format!("{}({})", context, id));
        let destination = folder.join(format!(
            "{}({})-{}-{}({}).zip",
            context,
            id,
            now.format("%Y%m%d-%H%M%S"),
            login,
            player.id
        ));

        let free_space = self.disk_space.free_space(&self.logs.target_directory)?;
        let size = data.len() as u64;
        info!(
            destination = %destination.display(),
            free_bytes = free_space,
            log_bytes = size,
            "Receiving game logs"
        );

        if size.saturating_mul(FREE_SPACE_FACTOR) >= free_space {
            return Err(UploadError::DiskFull);
        }
        if size > self.logs.max_file_size_bytes {
            return Err(UploadError::FileSizeExceeded {
                max: self.logs.max_file_size_bytes,
                actual: size,
            });
        }

        create_dirs(&folder).await?;
        tokio::fs::write(&destination, data)
            .await
            .with_context(|| format!("Failed to write {}", destination.display()))?;

        info!(destination = %destination.display(), "Game logs saved");
        Ok(destination)
    }
}
