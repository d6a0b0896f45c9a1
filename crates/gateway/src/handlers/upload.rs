//! Document intake handlers
//!
//! Multipart and URL uploads buffer through a named temp file so the
//! intake validator sees a real file; the temp file is removed on every
//! exit path, success or failure.

use axum::{
    extract::{Multipart, State},
    Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::handlers::resolve_store_id;
use crate::AppState;
use ragbridge_common::errors::{AppError, Result};
use tokio_util::sync::CancellationToken;

#[derive(Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub file_id: Option<String>,
    pub filename: String,
    pub message: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UploadUrlRequest {
    #[validate(length(min = 1, max = 2048))]
    pub url: String,

    #[validate(length(min = 1))]
    pub store_name: String,

    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UploadDirectoryRequest {
    #[validate(length(min = 1))]
    pub directory_path: String,

    #[validate(length(min = 1))]
    pub store_name: String,

    #[serde(default = "default_recursive")]
    pub recursive: bool,
}

fn default_recursive() -> bool {
    true
}

#[derive(Serialize)]
pub struct UploadDirectoryResponse {
    pub success: bool,
    pub files_uploaded: usize,
    pub files_skipped: usize,
    pub message: String,
}

/// Upload one document (multipart: `file` + `store_name`)
pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let mut file: Option<(String, axum::body::Bytes)> = None;
    let mut store_name: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| AppError::Validation {
        message: format!("invalid multipart payload: {e}"),
        field: None,
    })? {
        match field.name() {
            Some("file") => {
                let filename = field
                    .file_name()
                    .map(str::to_string)
                    .unwrap_or_else(|| "upload".to_string());
                let bytes = field.bytes().await.map_err(|e| AppError::Validation {
                    message: format!("failed to read file field: {e}"),
                    field: Some("file".to_string()),
                })?;
                file = Some((filename, bytes));
            }
            Some("store_name") => {
                store_name = Some(field.text().await.map_err(|e| AppError::Validation {
                    message: format!("failed to read store_name field: {e}"),
                    field: Some("store_name".to_string()),
                })?);
            }
            _ => {}
        }
    }

    let (filename, bytes) = file.ok_or_else(|| AppError::Validation {
        message: "missing 'file' field".to_string(),
        field: Some("file".to_string()),
    })?;
    let store_name = store_name.ok_or_else(|| AppError::Validation {
        message: "missing 'store_name' field".to_string(),
        field: Some("store_name".to_string()),
    })?;

    let store_id = resolve_store_id(&state, &store_name).await?;

    // Keep the original extension so intake validation applies
    let suffix = std::path::Path::new(&filename)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();
    let temp = tempfile::Builder::new()
        .prefix("ragbridge-upload-")
        .suffix(&suffix)
        .tempfile()?;
    std::fs::write(temp.path(), &bytes)?;

    let cancel = CancellationToken::new();
    let file_id = state
        .intake
        .upload_document(temp.path(), &store_id, Some(&filename), false, &cancel)
        .await?;

    let message = format!("Successfully uploaded {filename}");
    Ok(Json(UploadResponse {
        success: true,
        file_id: Some(file_id),
        filename,
        message,
    }))
}

/// Download a document from a URL and upload it to a store
pub async fn upload_from_url(
    State(state): State<AppState>,
    Json(request): Json<UploadUrlRequest>,
) -> Result<Json<UploadResponse>> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let store_id = resolve_store_id(&state, &request.store_name).await?;

    let cancel = CancellationToken::new();
    let (file_id, filename) = state
        .intake
        .upload_from_url(
            &request.url,
            &store_id,
            request.display_name.as_deref(),
            &cancel,
        )
        .await?;

    let message = format!("Successfully uploaded {filename}");
    Ok(Json(UploadResponse {
        success: true,
        file_id: Some(file_id),
        filename,
        message,
    }))
}

/// Upload all supported files under a directory
pub async fn upload_directory(
    State(state): State<AppState>,
    Json(request): Json<UploadDirectoryRequest>,
) -> Result<Json<UploadDirectoryResponse>> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let store_id = resolve_store_id(&state, &request.store_name).await?;

    let cancel = CancellationToken::new();
    let report = state
        .intake
        .upload_directory(
            std::path::Path::new(&request.directory_path),
            &store_id,
            request.recursive,
            &cancel,
        )
        .await?;

    let files_uploaded = report.uploaded.len();
    let files_skipped = report.skipped.len() + report.failed.len();
    Ok(Json(UploadDirectoryResponse {
        success: true,
        files_uploaded,
        files_skipped,
        message: format!(
            "Uploaded {files_uploaded} files ({} invalid, {} failed)",
            report.skipped.len(),
            report.failed.len()
        ),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::mock_state;
    use std::io::Write;

    #[tokio::test]
    async fn directory_upload_reports_counts() {
        let state = mock_state();
        let created = state.provider.create_store("docs").await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("a.txt")).unwrap();
        writeln!(file, "some document content").unwrap();

        let response = upload_directory(
            State(state),
            Json(UploadDirectoryRequest {
                directory_path: dir.path().display().to_string(),
                store_name: created.name,
                recursive: true,
            }),
        )
        .await
        .unwrap();

        assert!(response.0.success);
        assert_eq!(response.0.files_uploaded, 1);
        assert_eq!(response.0.files_skipped, 0);
    }

    #[tokio::test]
    async fn directory_upload_to_unknown_store_is_not_found() {
        let state = mock_state();
        let result = upload_directory(
            State(state),
            Json(UploadDirectoryRequest {
                directory_path: "/tmp".to_string(),
                store_name: "ghost".to_string(),
                recursive: false,
            }),
        )
        .await;
        assert!(matches!(result, Err(AppError::StoreNotFound { .. })));
    }
}
