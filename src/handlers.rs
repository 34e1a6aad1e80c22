use crate::config::Config;
use crate::error::ApiError;
use crate::models::{
    DeleteRequest, DeleteResponse, DeleteResult, FileInfo, FileListResponse, SaveTextRequest,
    SaveTextResponse, UploadResponse,
};
use crate::naming::{self, StorageName};
use crate::storage::{StagedFile, StagedWriter, StorageBackend, StorageError};
use axum::{
    body::Body,
    extract::{
        multipart::{Field, MultipartRejection},
        rejection::JsonRejection,
        Multipart, Path, Request, State,
    },
    response::{Json, Response},
};
use chrono::Utc;
use std::sync::Arc;
use tower::ServiceExt;
use tower_http::services::ServeFile;

/// Multipart field that carries uploaded files
const FILES_FIELD: &str = "files";

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn StorageBackend>,
    pub config: Config,
}

/// A file received in full but not yet visible in storage
struct PendingFile {
    name: StorageName,
    staged: StagedFile,
}

/// POST /upload - Store one or more files from a multipart form
///
/// The request is all-or-nothing: if any file fails to arrive or is too
/// large, none of the files in the request are kept.
pub async fn upload_files(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut multipart = multipart.map_err(|e| {
        tracing::debug!("Rejected upload request: {}", e);
        ApiError::Validation(format!("Invalid multipart data: {}", e.body_text()))
    })?;

    let mut pending = Vec::new();
    if let Err(e) = receive_files(&state, &mut multipart, &mut pending).await {
        discard_all(state.storage.as_ref(), pending).await;
        return Err(e);
    }

    if pending.is_empty() {
        return Err(ApiError::Validation("No files uploaded".to_string()));
    }

    let mut files = Vec::with_capacity(pending.len());
    let mut remaining = pending.into_iter();
    while let Some(PendingFile { name, staged }) = remaining.next() {
        let size = staged.size();
        match state.storage.commit(staged, name).await {
            Ok(stored) => files.push(FileInfo {
                name: stored.display_name(),
                path: stored.to_string(),
                size,
                upload_time: stored.timestamp(),
            }),
            Err(e) => {
                tracing::error!("Failed to store upload: {}", e);
                for file in &files {
                    if let Err(e) = state.storage.delete(&file.path).await {
                        tracing::warn!("Failed to roll back {}: {}", file.path, e);
                    }
                }
                discard_all(state.storage.as_ref(), remaining.collect()).await;
                return Err(ApiError::Server("Failed to store files".to_string()));
            }
        }
    }

    tracing::info!("Received {} file(s)", files.len());

    Ok(Json(UploadResponse {
        success: true,
        files,
    }))
}

/// Stream every usable `files` field into staging. Anything already staged
/// is left in `pending` for the caller to commit or discard.
async fn receive_files(
    state: &AppState,
    multipart: &mut Multipart,
    pending: &mut Vec<PendingFile>,
) -> Result<(), ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::debug!("Invalid multipart data: {}", e);
        ApiError::Validation(format!("Invalid multipart data: {}", e.body_text()))
    })? {
        if field.name() != Some(FILES_FIELD) {
            continue;
        }
        let Some(original) = field.file_name().map(str::to_string) else {
            continue;
        };

        // The receipt time is both the name prefix and the reported uploadTime
        let received_at = Utc::now().timestamp_millis();
        let Some(name) = StorageName::for_file(&original, received_at) else {
            tracing::debug!("Skipping upload with unusable filename {:?}", original);
            continue;
        };

        let writer = state
            .storage
            .begin_write(state.config.max_file_size)
            .await?;
        let staged = stream_field(field, writer).await?;
        pending.push(PendingFile { name, staged });
    }

    Ok(())
}

async fn stream_field(mut field: Field<'_>, mut writer: StagedWriter) -> Result<StagedFile, ApiError> {
    loop {
        let chunk = match field.chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(e) => {
                writer.abort().await;
                return Err(ApiError::Validation(format!(
                    "Failed to read file: {}",
                    e.body_text()
                )));
            }
        };

        if let Err(e) = writer.write(&chunk).await {
            writer.abort().await;
            return Err(e.into());
        }
    }

    Ok(writer.finish().await?)
}

async fn discard_all(storage: &dyn StorageBackend, pending: Vec<PendingFile>) {
    for file in pending {
        storage.discard(file.staged).await;
    }
}

/// POST /save-text - Store pasted text as a new text note
pub async fn save_text(
    State(state): State<AppState>,
    payload: Result<Json<SaveTextRequest>, JsonRejection>,
) -> Result<Json<SaveTextResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::Validation(e.body_text()))?;

    let text = request.text.unwrap_or_default();
    if text.trim().is_empty() {
        return Err(ApiError::Validation("text content required".to_string()));
    }

    let bytes = text.as_bytes();
    let name = StorageName::for_text(Utc::now().timestamp_millis());

    let mut writer = state
        .storage
        .begin_write(state.config.max_file_size)
        .await?;
    if let Err(e) = writer.write(bytes).await {
        writer.abort().await;
        return Err(e.into());
    }
    let staged = writer.finish().await?;

    let stored = state.storage.commit(staged, name).await.map_err(|e| {
        tracing::error!("Failed to save text: {}", e);
        ApiError::Server("Failed to save text".to_string())
    })?;

    tracing::info!("Saved text note {} ({} bytes)", stored, bytes.len());

    Ok(Json(SaveTextResponse {
        success: true,
        file: FileInfo {
            name: stored.display_name(),
            path: stored.to_string(),
            size: bytes.len() as u64,
            upload_time: stored.timestamp(),
        },
    }))
}

/// GET /files - List stored items, newest first
pub async fn list_files(State(state): State<AppState>) -> Result<Json<FileListResponse>, ApiError> {
    let files = state.storage.list().await.map_err(|e| {
        tracing::error!("Failed to list files: {}", e);
        ApiError::Server("Failed to read file list".to_string())
    })?;

    Ok(Json(FileListResponse {
        success: true,
        files,
    }))
}

/// POST /delete - Remove a batch of stored items
///
/// Every name is attempted; the call only succeeds if all of them were
/// removed. Per-item outcomes are reported either way.
pub async fn delete_files(
    State(state): State<AppState>,
    payload: Result<Json<DeleteRequest>, JsonRejection>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::Validation(e.body_text()))?;

    let names = request
        .files
        .filter(|names| !names.is_empty())
        .ok_or_else(|| ApiError::Validation("Invalid file list".to_string()))?;

    if let Some(bad) = names.iter().find(|n| !naming::is_valid_storage_name(n)) {
        return Err(ApiError::Validation(format!("Invalid file name: {}", bad)));
    }

    let mut results = Vec::with_capacity(names.len());
    for name in names {
        let result = match state.storage.delete(&name).await {
            Ok(()) => DeleteResult {
                name,
                deleted: true,
                error: None,
            },
            Err(e) => {
                tracing::warn!("Failed to delete {}: {}", name, e);
                let error = match e {
                    StorageError::NotFound(_) => "not found".to_string(),
                    _ => "delete failed".to_string(),
                };
                DeleteResult {
                    name,
                    deleted: false,
                    error: Some(error),
                }
            }
        };
        results.push(result);
    }

    let failed = results.iter().filter(|r| !r.deleted).count();
    if failed > 0 {
        return Err(ApiError::DeletionFailed { failed, results });
    }

    tracing::info!("Deleted {} file(s)", results.len());

    Ok(Json(DeleteResponse {
        success: true,
        message: "Files deleted".to_string(),
        results,
    }))
}

/// GET /uploads/:name - Download a stored item
///
/// Range requests and conditional headers are handled by `ServeFile`.
pub async fn download_file(
    State(state): State<AppState>,
    Path(storage_name): Path<String>,
    request: Request,
) -> Result<Response, ApiError> {
    let path = state.storage.locate(&storage_name).await?;

    let response = match ServeFile::new(path).oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    };

    Ok(response.map(Body::new))
}
