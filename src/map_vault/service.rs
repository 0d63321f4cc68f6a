// SPDX-License-Identifier: GPL-3.0-only
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use anyhow::Context;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::{Config, MapConfig};
use crate::content::{copy_map_archive, copy_previews, present_previews, versioned_archive_name, DiskSpace, StatvfsDiskSpace};
use crate::error::{UploadError, Violation, Violations};
use crate::extractor::{Extractor, ZipExtractor};
use crate::map_vault::details::{
    detail, map_size, max_players, validate_detail_value, validate_details_batch, validate_map_details, MapDetails,
    KEY_ARCHIVE, KEY_CRC, KEY_DESCRIPTION, KEY_NAME, KEY_PLAYERS, KEY_SIZE,
};
use crate::map_vault::naming::{validate_map_name, MapNameBuilder, MapNameValidation};
use crate::map_vault::structure::{
    archive_name_of, is_exact_official_archive, is_official_archive, validate_map_folder_structure,
    validate_required_files, DIRECTORY_MINIMAPS,
};
use crate::map_vault::view::MapView;
use crate::policy::{
    map_version_policy, EntityType, MapVersionChanges, MapVersionUpdate, Operation, PolicyEngine, FIELD_DESCRIPTION,
    FIELD_HIDDEN, FIELD_RANKED,
};
use crate::registry::{BanDurationType, BanLevel, Map, MapRepository, MapVersion, Player};

const UNZIPPED_CONTENT_DIR: &str = "unzipped-content";
const DEFAULT_PLAYERS: &str = "10";
const FREE_SPACE_FACTOR: u64 = 10;

/// Result of a successful upload
#[derive(Debug, Clone)]
pub struct UploadedMaps {
    /// Name the archive was stored under
    pub archive_name: String,

    pub maps: Vec<Map>,
}

pub struct MapService {
    config: MapConfig,
    temp_dir: PathBuf,
    maps: Arc<dyn MapRepository>,
    extractor: Arc<dyn Extractor>,
    disk_space: Arc<dyn DiskSpace>,
    policy: PolicyEngine<MapVersionUpdate>,
}

impl MapService {
    pub fn new(config: &Config, maps: Arc<dyn MapRepository>) -> Self {
        Self {
            config: config.map.clone(),
            temp_dir: config.temp_dir.clone(),
            maps,
            extractor: Arc::new(ZipExtractor::new((&config.map).into())),
            disk_space: Arc::new(StatvfsDiskSpace),
            policy: map_version_policy(),
        }
    }

    /// Replace the free space probe
    pub fn with_disk_space(mut self, disk_space: Arc<dyn DiskSpace>) -> Self {
        self.disk_space = disk_space;
        self
    }

    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    /// Validate a prospective map title and suggest names for its next version
    pub async fn request_map_name_validation(&self, name: &str) -> Result<MapNameValidation, UploadError> {
        UploadError::check(validate_map_name(name))?;

        let builder = MapNameBuilder::new(name);
        let next_version = self
            .maps
            .find_by_display_name(builder.display_name())
            .await?
            .map(|map| map.max_version() + 1)
            .unwrap_or(1);

        Ok(MapNameValidation::new(&builder, next_version))
    }

    /// Look up a map and derive its client facing view
    pub async fn find_map_view(&self, display_name: &str) -> Result<MapView, UploadError> {
        let map = self
            .maps
            .find_by_display_name(display_name)
            .await?
            .ok_or_else(|| UploadError::MapNotFound(display_name.to_string()))?;

        Ok(MapView::from_map(&map, &self.config))
    }

    pub async fn list_map_views(&self) -> Result<Vec<MapView>, UploadError> {
        let maps = self.maps.list_maps().await?;
        Ok(maps.iter().map(|map| MapView::from_map(map, &self.config)).collect())
    }

    /// Change description, ranked or hidden flags of one published version
    pub async fn update_map_version(
        &self,
        actor: &Player,
        display_name: &str,
        version: u32,
        changes: MapVersionChanges,
    ) -> Result<MapView, UploadError> {
        if changes.is_empty() {
            return Err(UploadError::InvalidArgument("no changes requested".to_string()));
        }

        let mut uow = self.maps.begin().await?;
        let mut map = uow
            .find_by_display_name(display_name)
            .await?
            .ok_or_else(|| UploadError::MapNotFound(display_name.to_string()))?;

        let subject = MapVersionUpdate {
            map_author: map.author,
            changes: changes.clone(),
        };
        let requested = [
            (FIELD_DESCRIPTION, changes.description.is_some()),
            (FIELD_RANKED, changes.ranked.is_some()),
            (FIELD_HIDDEN, changes.hidden.is_some()),
        ];
        for (field, _) in requested.iter().filter(|(_, present)| *present) {
            self.policy
                .authorize(EntityType::MapVersion, Operation::Update(*field), &subject, actor)
                .map_err(|e| UploadError::Forbidden(e.to_string()))?;
        }

        if let Some(description) = &changes.description {
            validate_detail_value(display_name, KEY_DESCRIPTION, description)?;
        }

        let target = map
            .version_mut(version)
            .ok_or_else(|| UploadError::MapNotFound(format!("{} version {}", display_name, version)))?;
        if let Some(description) = changes.description {
            target.description = description;
        }
        if let Some(ranked) = changes.ranked {
            target.ranked = ranked;
        }
        if let Some(hidden) = changes.hidden {
            target.hidden = hidden;
        }

        let saved = uow.save(map).await?;
        uow.commit().await?;

        info!(map = %display_name, version, actor = actor.id, "Map version updated");
        Ok(MapView::from_map(&saved, &self.config))
    }

    /// Validate an uploaded map package and publish its maps
    pub async fn upload_map(
        &self,
        data: Vec<u8>,
        author: &Player,
        is_ranked: bool,
        details: Vec<MapDetails>,
    ) -> Result<UploadedMaps, UploadError> {
        let upload_id = Uuid::new_v4();
        let span = info_span!("upload_map", %upload_id, author = author.id);
        self.upload_map_inner(data, author, is_ranked, details)
            .instrument(span)
            .await
    }

    async fn upload_map_inner(
        &self,
        data: Vec<u8>,
        author: &Player,
        is_ranked: bool,
        details: Vec<MapDetails>,
    ) -> Result<UploadedMaps, UploadError> {
        check_author_vault_ban(author)?;

        if data.is_empty() {
            return Err(UploadError::InvalidArchive("upload is empty".to_string()));
        }

        // Removed when dropped, whichever way this function returns
        let scratch = self.create_scratch_dir().await?;
        self.check_free_space(scratch.path(), data.len() as u64)?;

        let unzipped = scratch.path().join(UNZIPPED_CONTENT_DIR);
        self.extractor.extract(data, unzipped.clone()).await?;
        info!(path = %unzipped.display(), "Upload extracted");

        let map_folder = validate_map_folder_structure(&unzipped)?;
        let archive_name = archive_name_of(&map_folder)?;
        if is_official_archive(&archive_name) {
            return Err(UploadError::OfficialArchive(archive_name));
        }
        info!(archive = %archive_name, "Map folder validated");
        UploadError::check(validate_required_files(&map_folder)?)?;

        validate_details_batch(&details)?;

        let mut uow = self.maps.begin().await?;
        let mut existing_maps: HashMap<String, Option<Map>> = HashMap::new();
        for record in &details {
            validate_map_details(record)?;
            let map_name = detail(record, KEY_NAME);

            let existing = uow.find_by_display_name(map_name).await?;
            let claimed_archive = detail(record, KEY_ARCHIVE);
            if claimed_archive != archive_name {
                return Err(UploadError::ArchiveNameMismatch {
                    map: map_name.to_string(),
                    claimed: claimed_archive.to_string(),
                    actual: archive_name.clone(),
                });
            }
            if let Some(map) = &existing {
                validate_against_existing_map(map, author)?;
            }
            existing_maps.insert(map_name.to_string(), existing);
        }

        let expected_previews: BTreeSet<String> = details
            .iter()
            .map(|record| format!("{}.png", detail(record, KEY_NAME)))
            .collect();
        let mini_dir = map_folder.join(DIRECTORY_MINIMAPS);
        let present: HashSet<String> = present_previews(&mini_dir).into_iter().map(|(_, name)| name).collect();
        let missing: Vec<String> = expected_previews
            .iter()
            .filter(|name| !present.contains(*name))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(UploadError::Validation(Violations(vec![Violation::MissingPreview { missing }])));
        }

        let versioned_archive = versioned_archive_name(&self.config.target_directory, &archive_name);
        info!(archive = %versioned_archive, "Versioned archive name chosen");

        let mut saved_maps = Vec::with_capacity(details.len());
        for record in &details {
            let map_name = detail(record, KEY_NAME);
            let existing = existing_maps.remove(map_name).flatten();
            let map = apply_map_details(existing, record, author, is_ranked, &versioned_archive);

            let saved = uow.save(map).await?;
            // Later records with the same name update the saved aggregate
            existing_maps.insert(map_name.to_string(), Some(saved.clone()));
            saved_maps.retain(|m: &Map| m.display_name != saved.display_name);
            saved_maps.push(saved);
        }

        let final_path = copy_map_archive(
            &map_folder.join(&archive_name),
            &self.config.target_directory,
            &versioned_archive,
        )
        .await?;

        if let Err(e) = copy_previews(&mini_dir, &self.config.preview_directory, &expected_previews).await {
            warn!(error = %e, "Unable to promote preview images");
        }

        if let Err(e) = uow.commit().await {
            if let Err(remove_err) = tokio::fs::remove_file(&final_path).await {
                warn!(path = %final_path.display(), error = %remove_err, "Unable to remove promoted archive");
            }
            return Err(UploadError::Internal(e));
        }

        info!(archive = %versioned_archive, maps = saved_maps.len(), "Map upload completed");
        Ok(UploadedMaps {
            archive_name: versioned_archive,
            maps: saved_maps,
        })
    }

    async fn create_scratch_dir(&self) -> Result<tempfile::TempDir, UploadError> {
        tokio::fs::create_dir_all(&self.temp_dir)
            .await
            .with_context(|| format!("Failed to create temp directory {}", self.temp_dir.display()))?;

        let scratch = tempfile::Builder::new()
            .prefix("map-upload-")
            .tempdir_in(&self.temp_dir)
            .context("Failed to create scratch directory")?;
        Ok(scratch)
    }

    fn check_free_space(&self, scratch: &std::path::Path, upload_size: u64) -> Result<(), UploadError> {
        let temp_free = self.disk_space.free_space(scratch)?;
        let maps_free = self.disk_space.free_space(&self.config.target_directory)?;
        info!(
            scratch = %scratch.display(),
            temp_free_bytes = temp_free,
            maps_free_bytes = maps_free,
            upload_bytes = upload_size,
            "Checking free disk space"
        );

        let required = upload_size.saturating_mul(FREE_SPACE_FACTOR);
        if required >= temp_free || required >= maps_free {
            return Err(UploadError::DiskFull);
        }
        Ok(())
    }
}

fn check_author_vault_ban(author: &Player) -> Result<(), UploadError> {
    match author.active_ban_of(BanLevel::Vault) {
        None => Ok(()),
        Some(ban) => {
            let message = match (ban.duration, ban.expires_at) {
                (BanDurationType::Temporary, Some(expires_at)) => {
                    format!("You are banned from uploading maps to the vault until {}.", expires_at)
                }
                _ => "You are permanently banned from uploading maps to the vault.".to_string(),
            };
            warn!(author = author.id, "Rejected upload from vault-banned player");
            Err(UploadError::Forbidden(message))
        }
    }
}

/// Ownership and official content checks against a stored map
///
/// A known crc is not rejected here, the version is updated in place.
fn validate_against_existing_map(existing: &Map, author: &Player) -> Result<(), UploadError> {
    if existing.author.is_some_and(|owner| owner != author.id) {
        return Err(UploadError::NotOriginalAuthor(existing.display_name.clone()));
    }

    if existing
        .versions
        .iter()
        .any(|version| is_exact_official_archive(version.archive_name()))
    {
        return Err(UploadError::OfficialArchive(existing.display_name.clone()));
    }

    Ok(())
}

/// Create or update the map named by `record` in memory
fn apply_map_details(
    existing: Option<Map>,
    record: &MapDetails,
    author: &Player,
    is_ranked: bool,
    archive_name: &str,
) -> Map {
    let map_name = detail(record, KEY_NAME);
    let crc = detail(record, KEY_CRC);
    let description = detail(record, KEY_DESCRIPTION);

    let mut map = existing.unwrap_or_else(|| Map::new(map_name, Some(author.id)));
    map.map_type = "FFA".to_string();
    map.battle_type = "skirmish".to_string();

    let (width, height) = map_size(detail(record, KEY_SIZE), description);
    let players = record
        .get(KEY_PLAYERS)
        .map(String::as_str)
        .unwrap_or(DEFAULT_PLAYERS);

    if map.version_by_crc_mut(crc).is_none() {
        let next = map.max_version() + 1;
        map.versions.push(MapVersion::new(next, crc));
    }

    if let Some(version) = map.version_by_crc_mut(crc) {
        version.description = description.to_string();
        version.width = width;
        version.height = height;
        version.hidden = false;
        version.ranked = is_ranked;
        version.max_players = max_players(players);
        version.filename = format!("{}/{}/{}", archive_name, map_name, crc);
    }

    map
}
