// SPDX-License-Identifier: GPL-3.0-only
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::{ErrorKind, UploadError};
use crate::game::GameService;
use crate::map_vault::{MapDetails, MapNameValidation, MapService, MapView};
use crate::policy::MapVersionChanges;
use crate::registry::{Player, PlayerRepository};
use crate::utils::{file_extension, sanitize_filename};

/// Header carrying the id of the authenticated player
pub const PLAYER_ID_HEADER: &str = "x-player-id";

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub codes: Vec<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            codes: Vec::new(),
        }
    }

    pub fn error(message: String, codes: Vec<String>) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(message),
            codes,
        }
    }
}

/// `metadata` part of a map upload
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadMapMetadata {
    #[serde(default)]
    pub is_ranked: bool,
    pub maps_details: Vec<MapDetails>,
}

/// `metadata` part of a game log upload
#[derive(Debug, Deserialize)]
pub struct GameLogsMetadata {
    #[serde(default = "default_context")]
    pub context: String,
    #[serde(default)]
    pub id: i64,
}

fn default_context() -> String {
    "adhoc".to_string()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadMapResponse {
    pub archive_name: String,
    pub maps: Vec<MapView>,
}

#[derive(Debug)]
pub enum ApiError {
    Unauthorized(String),
    BadRequest(String),
    Upload(UploadError),
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        ApiError::Upload(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Upload(err) => match err.kind() {
                ErrorKind::Validation | ErrorKind::Structural => StatusCode::UNPROCESSABLE_ENTITY,
                ErrorKind::Conflict => StatusCode::CONFLICT,
                ErrorKind::ResourceExhausted => StatusCode::INSUFFICIENT_STORAGE,
                ErrorKind::Forbidden => StatusCode::FORBIDDEN,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn body(&self) -> ApiResponse<()> {
        match self {
            ApiError::Unauthorized(message) => ApiResponse::<()>::error(message.clone(), vec!["UNAUTHORIZED".into()]),
            ApiError::BadRequest(message) => ApiResponse::<()>::error(message.clone(), vec!["BAD_REQUEST".into()]),
            // internal details stay in the log
            ApiError::Upload(err) if err.kind() == ErrorKind::Internal => {
                ApiResponse::<()>::error("internal error".to_string(), vec![err.code().to_string()])
            }
            ApiError::Upload(err) => ApiResponse::<()>::error(
                err.to_string(),
                err.codes().into_iter().map(String::from).collect(),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            if let ApiError::Upload(err) = &self {
                error!(error = %err, code = err.code(), "Request failed");
            }
        }
        (status, Json(self.body())).into_response()
    }
}

pub struct ApiHandlers {
    maps: Arc<MapService>,
    games: Arc<GameService>,
    players: Arc<dyn PlayerRepository>,
}

impl ApiHandlers {
    pub fn new(maps: Arc<MapService>, games: Arc<GameService>, players: Arc<dyn PlayerRepository>) -> Self {
        Self { maps, games, players }
    }

    /// Largest request body the upload routes accept
    pub fn body_limit(&self) -> usize {
        self.maps.config().max_upload_size_bytes
    }
}

impl ApiHandlers {
    pub async fn health() -> Json<ApiResponse<&'static str>> {
        Json(ApiResponse::success("ok"))
    }

    /// Resolve the acting player from the request headers
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<Player, ApiError> {
        let raw = headers
            .get(PLAYER_ID_HEADER)
            .ok_or_else(|| ApiError::Unauthorized(format!("missing {} header", PLAYER_ID_HEADER)))?;
        let id: i64 = raw
            .to_str()
            .ok()
            .and_then(|value| value.trim().parse().ok())
            .ok_or_else(|| ApiError::Unauthorized(format!("invalid {} header", PLAYER_ID_HEADER)))?;

        match self.players.get_player(id).await {
            Ok(Some(player)) => Ok(player),
            Ok(None) => {
                warn!(player_id = id, "Request from unknown player");
                Err(UploadError::Forbidden(format!("unknown player {}", id)).into())
            }
            Err(e) => Err(UploadError::Internal(e).into()),
        }
    }

    pub async fn validate_map_name(&self, name: &str) -> Result<Json<ApiResponse<MapNameValidation>>, ApiError> {
        let validation = self.maps.request_map_name_validation(name).await?;
        Ok(Json(ApiResponse::success(validation)))
    }

    pub async fn list_maps(&self) -> Result<Json<ApiResponse<Vec<MapView>>>, ApiError> {
        let views = self.maps.list_map_views().await?;
        Ok(Json(ApiResponse::success(views)))
    }

    pub async fn get_map(&self, display_name: &str) -> Result<Json<ApiResponse<MapView>>, ApiError> {
        let view = self.maps.find_map_view(display_name).await?;
        Ok(Json(ApiResponse::success(view)))
    }

    pub async fn upload_map(
        &self,
        player: &Player,
        data: Vec<u8>,
        metadata: &str,
    ) -> Result<Json<ApiResponse<UploadMapResponse>>, ApiError> {
        let metadata: UploadMapMetadata = serde_json::from_str(metadata)
            .map_err(|e| ApiError::BadRequest(format!("invalid metadata: {}", e)))?;

        info!(
            player_id = player.id,
            bytes = data.len(),
            maps = metadata.maps_details.len(),
            "Map upload request received"
        );

        let uploaded = self
            .maps
            .upload_map(data, player, metadata.is_ranked, metadata.maps_details)
            .await?;

        let maps = uploaded
            .maps
            .iter()
            .map(|map| MapView::from_map(map, self.maps.config()))
            .collect();
        Ok(Json(ApiResponse::success(UploadMapResponse {
            archive_name: uploaded.archive_name,
            maps,
        })))
    }

    pub async fn update_map_version(
        &self,
        player: &Player,
        display_name: &str,
        version: u32,
        changes: MapVersionChanges,
    ) -> Result<Json<ApiResponse<MapView>>, ApiError> {
        let view = self
            .maps
            .update_map_version(player, display_name, version, changes)
            .await?;
        Ok(Json(ApiResponse::success(view)))
    }

    pub async fn upload_game_logs(
        &self,
        player: &Player,
        filename: &str,
        data: &[u8],
        metadata: Option<&str>,
    ) -> Result<Json<ApiResponse<String>>, ApiError> {
        let metadata: GameLogsMetadata = match metadata {
            Some(raw) => serde_json::from_str(raw).map_err(|e| ApiError::BadRequest(format!("invalid metadata: {}", e)))?,
            None => GameLogsMetadata {
                context: default_context(),
                id: 0,
            },
        };

        let filename = sanitize_filename(filename);
        let allowed = &self.games.logs_config().allowed_extensions;
        match file_extension(&filename) {
            Some(ext) if allowed.iter().any(|a| a.eq_ignore_ascii_case(&ext)) => {}
            _ => {
                return Err(UploadError::InvalidArgument(format!(
                    "file '{}' must have one of the extensions {:?}",
                    filename, allowed
                ))
                .into());
            }
        }

        let path = self
            .games
            .upload_game_logs(data, player, &metadata.context, metadata.id)
            .await?;
        let stored = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Json(ApiResponse::success(stored)))
    }

    pub fn replay_url(&self, replay_id: i64) -> Result<String, ApiError> {
        Ok(self.games.replay_download_url(replay_id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use crate::registry::SqliteRegistry;
    use crate::test_helpers::{build_zip, create_temp_dir, create_test_config, setup_test_database, FixedDiskSpace};
    use tempfile::TempDir;

    struct Fixture {
        handlers: ApiHandlers,
        _db_dir: TempDir,
        _root: TempDir,
    }

    async fn fixture() -> Fixture {
        let root = create_temp_dir();
        let config = create_test_config(root.path());
        let (registry, db_dir) = setup_test_database().await.unwrap();
        let registry: Arc<SqliteRegistry> = Arc::new(registry);

        registry.upsert_player(Player::new(7, "mapper")).await.unwrap();

        let maps = MapService::new(&config, registry.clone()).with_disk_space(Arc::new(FixedDiskSpace(u64::MAX)));
        let games = GameService::new(&config).with_disk_space(Arc::new(FixedDiskSpace(u64::MAX)));
        let handlers = ApiHandlers::new(Arc::new(maps), Arc::new(games), registry);

        Fixture {
            handlers,
            _db_dir: db_dir,
            _root: root,
        }
    }

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(PLAYER_ID_HEADER, HeaderValue::from_str(value).unwrap());
        headers
    }

    fn status_of(result: Result<impl IntoResponse, ApiError>) -> StatusCode {
        match result {
            Ok(response) => response.into_response().status(),
            Err(err) => err.into_response().status(),
        }
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (UploadError::check(vec![crate::error::Violation::EmptyDetailList]).unwrap_err(), StatusCode::UNPROCESSABLE_ENTITY),
            (UploadError::MissingMapFolder, StatusCode::UNPROCESSABLE_ENTITY),
            (UploadError::OfficialArchive("tademo.ufo".into()), StatusCode::CONFLICT),
            (UploadError::DiskFull, StatusCode::INSUFFICIENT_STORAGE),
            (UploadError::DecompressionBomb("ratio".into()), StatusCode::INSUFFICIENT_STORAGE),
            (UploadError::Forbidden("banned".into()), StatusCode::FORBIDDEN),
            (UploadError::MapNotFound("Setons".into()), StatusCode::NOT_FOUND),
            (UploadError::Internal(anyhow::anyhow!("db gone")), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status(), expected);
        }
        assert_eq!(ApiError::Unauthorized("x".into()).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::BadRequest("x".into()).status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_error_body_lists_violation_codes() {
        let err = ApiError::from(
            UploadError::check(vec![
                crate::error::Violation::InvalidCharacter,
                crate::error::Violation::DoesNotStartWithLetter,
            ])
            .unwrap_err(),
        );
        let body = serde_json::to_value(err.body()).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["codes"], serde_json::json!(["INVALID_CHARACTER", "DOES_NOT_START_WITH_LETTER"]));
    }

    #[test]
    fn test_internal_error_body_is_generic() {
        let err = ApiError::from(UploadError::Internal(anyhow::anyhow!("password=hunter2")));
        let body = serde_json::to_value(err.body()).unwrap();
        assert_eq!(body["error"], "internal error");
        assert_eq!(body["codes"], serde_json::json!(["INTERNAL"]));
    }

    #[test]
    fn test_upload_metadata_parsing() {
        let metadata: UploadMapMetadata = serde_json::from_str(
            r#"{"isRanked": true, "mapsDetails": [{"name": "Map A", "archive": "foo.ufo"}]}"#,
        )
        .unwrap();
        assert!(metadata.is_ranked);
        assert_eq!(metadata.maps_details.len(), 1);
        assert_eq!(metadata.maps_details[0]["archive"], "foo.ufo");

        let logs: GameLogsMetadata = serde_json::from_str("{}").unwrap();
        assert_eq!(logs.context, "adhoc");
        assert_eq!(logs.id, 0);
    }

    #[tokio::test]
    async fn test_authenticate() {
        let f = fixture().await;

        let player = f.handlers.authenticate(&headers("7")).await.unwrap();
        assert_eq!(player.login, "mapper");

        assert_eq!(status_of(f.handlers.authenticate(&HeaderMap::new()).await.map(Json)), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(f.handlers.authenticate(&headers("seven")).await.map(Json)), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(f.handlers.authenticate(&headers("99")).await.map(Json)), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_validate_map_name() {
        let f = fixture().await;

        let Json(response) = f.handlers.validate_map_name("Beta Tropics").await.unwrap();
        let validation = response.data.unwrap();
        assert_eq!(validation.next_version, 1);

        assert_eq!(
            status_of(f.handlers.validate_map_name("1 bad name!").await),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[tokio::test]
    async fn test_get_unknown_map() {
        let f = fixture().await;
        assert_eq!(status_of(f.handlers.get_map("Nowhere").await), StatusCode::NOT_FOUND);

        let Json(response) = f.handlers.list_maps().await.unwrap();
        assert!(response.data.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upload_map_rejects_bad_metadata() {
        let f = fixture().await;
        let player = Player::new(7, "mapper");

        let result = f.handlers.upload_map(&player, vec![1, 2, 3], "not json").await;
        assert_eq!(status_of(result), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_upload_map_rejects_folderless_archive() {
        let f = fixture().await;
        let player = Player::new(7, "mapper");
        let data = build_zip(&[("loose.ufo", b"content".as_slice())]);

        let result = f
            .handlers
            .upload_map(&player, data, r#"{"isRanked": false, "mapsDetails": [{"name": "Map A"}]}"#)
            .await;
        assert_eq!(status_of(result), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_upload_game_logs_checks_extension() {
        let f = fixture().await;
        let player = Player::new(7, "mapper");

        let rejected = f.handlers.upload_game_logs(&player, "logs.exe", b"data", None).await;
        assert_eq!(status_of(rejected), StatusCode::UNPROCESSABLE_ENTITY);

        let Json(response) = f
            .handlers
            .upload_game_logs(&player, "logs.ZIP", b"data", Some(r#"{"context": "coop", "id": 3}"#))
            .await
            .unwrap();
        let stored = response.data.unwrap();
        assert!(stored.starts_with("coop(3)-"));
        assert!(stored.ends_with("-mapper(7).zip"));
    }

    #[tokio::test]
    async fn test_replay_url() {
        let f = fixture().await;
        assert_eq!(
            f.handlers.replay_url(1234567).unwrap(),
            "http://content.test/replays/0/1/23/45/1234567.zip"
        );
        assert_eq!(status_of(f.handlers.replay_url(0).map(Json)), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
