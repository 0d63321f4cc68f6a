// SPDX-License-Identifier: GPL-3.0-only
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use crate::api::handlers::{ApiError, ApiHandlers, ApiResponse, UploadMapResponse};
use crate::map_vault::{MapNameValidation, MapView};
use crate::policy::MapVersionChanges;

pub struct HttpServer {
    handlers: ApiHandlers,
    addr: SocketAddr,
}

impl HttpServer {
    pub fn new(handlers: ApiHandlers, addr: SocketAddr) -> Self {
        Self { handlers, addr }
    }

    pub fn router(handlers: Arc<ApiHandlers>) -> Router {
        let body_limit = handlers.body_limit();

        Router::new()
            .route("/health", get(ApiHandlers::health))
            .route("/api/maps", get(list_maps_handler))
            .route("/api/maps/validate-name", get(validate_name_handler))
            .route("/api/maps/upload", post(upload_map_handler))
            .route("/api/maps/:display_name", get(get_map_handler))
            .route(
                "/api/maps/:display_name/versions/:version",
                patch(update_map_version_handler),
            )
            .route("/api/games/logs", post(upload_game_logs_handler))
            .route("/api/games/:id/replay", get(replay_handler))
            .layer(DefaultBodyLimit::max(body_limit))
            .with_state(handlers)
    }

    /// Serve until `shutdown` resolves
    pub async fn serve(self, shutdown: impl Future<Output = ()> + Send + 'static) -> anyhow::Result<()> {
        let app = Self::router(Arc::new(self.handlers));

        info!(addr = %self.addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(&self.addr).await?;
        axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct NameQuery {
    name: String,
}

/// Parts of a multipart upload
#[derive(Debug, Default)]
struct UploadParts {
    filename: Option<String>,
    file: Option<Vec<u8>>,
    metadata: Option<String>,
}

async fn read_upload(mut multipart: Multipart) -> Result<UploadParts, ApiError> {
    let mut parts = UploadParts::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("malformed multipart body: {}", e)))?
    {
        match field.name() {
            Some("file") => {
                parts.filename = field.file_name().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("failed to read file: {}", e)))?;
                parts.file = Some(bytes.to_vec());
            }
            Some("metadata") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("failed to read metadata: {}", e)))?;
                parts.metadata = Some(text);
            }
            _ => {}
        }
    }

    Ok(parts)
}

async fn validate_name_handler(
    State(handlers): State<Arc<ApiHandlers>>,
    Query(query): Query<NameQuery>,
) -> Result<Json<ApiResponse<MapNameValidation>>, ApiError> {
    handlers.validate_map_name(&query.name).await
}

async fn upload_map_handler(
    State(handlers): State<Arc<ApiHandlers>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<ApiResponse<UploadMapResponse>>, ApiError> {
    let player = handlers.authenticate(&headers).await?;
    let parts = read_upload(multipart).await?;

    let data = parts.file.ok_or_else(|| ApiError::BadRequest("missing 'file' part".to_string()))?;
    let metadata = parts
        .metadata
        .ok_or_else(|| ApiError::BadRequest("missing 'metadata' part".to_string()))?;

    handlers.upload_map(&player, data, &metadata).await
}

async fn list_maps_handler(
    State(handlers): State<Arc<ApiHandlers>>,
) -> Result<Json<ApiResponse<Vec<MapView>>>, ApiError> {
    handlers.list_maps().await
}

async fn get_map_handler(
    State(handlers): State<Arc<ApiHandlers>>,
    Path(display_name): Path<String>,
) -> Result<Json<ApiResponse<MapView>>, ApiError> {
    handlers.get_map(&display_name).await
}

async fn update_map_version_handler(
    State(handlers): State<Arc<ApiHandlers>>,
    headers: HeaderMap,
    Path((display_name, version)): Path<(String, u32)>,
    Json(changes): Json<MapVersionChanges>,
) -> Result<Json<ApiResponse<MapView>>, ApiError> {
    let player = handlers.authenticate(&headers).await?;
    handlers
        .update_map_version(&player, &display_name, version, changes)
        .await
}

async fn upload_game_logs_handler(
    State(handlers): State<Arc<ApiHandlers>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<ApiResponse<String>>, ApiError> {
    let player = handlers.authenticate(&headers).await?;
    let parts = read_upload(multipart).await?;

    let data = parts.file.ok_or_else(|| ApiError::BadRequest("missing 'file' part".to_string()))?;
    let filename = parts.filename.unwrap_or_default();

    handlers
        .upload_game_logs(&player, &filename, &data, parts.metadata.as_deref())
        .await
}

async fn replay_handler(
    State(handlers): State<Arc<ApiHandlers>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let url = handlers.replay_url(id)?;
    Ok((StatusCode::FOUND, [(header::LOCATION, url)]))
}
