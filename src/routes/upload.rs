use std::path::Path;

use axum::{
    extract::{multipart::Field, Multipart, State},
    response::Json,
};
use bytes::Bytes;
use ledger::AccountAddress;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use utoipa::ToSchema;

use super::RouteState;
use crate::{
    http_objects::{ApiError, UploadResponse},
    pipeline::{PipelineError, UploadRequest},
};

#[allow(dead_code)]
#[derive(ToSchema)]
pub struct UploadForm {
    /// Ledger account to register the hash under; defaults to the first
    /// available account.
    account: Option<String>,
    #[schema(format = "binary")]
    /// File to upload
    file: Option<String>,
}

/// Upload a file, pin it to the content store and register its IPFS hash
/// on the ledger.
#[utoipa::path(
    post,
    path = "/upload",
    request_body(content_type = "multipart/form-data", content = inline(UploadForm)),
    tag = "upload",
    responses(
        (status = 200, description = "file pinned and hash registered", body = UploadResponse),
        (status = 400, description = "no file provided"),
        (status = INTERNAL_SERVER_ERROR, description = "pinning or registration failed", body = ApiError)
    ),
)]
#[axum::debug_handler]
pub async fn upload_file(
    State(state): State<RouteState>,
    mut form: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut spooled: Option<(NamedTempFile, String)> = None;
    let mut account: Option<AccountAddress> = None;

    while let Some(mut field) = form
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(&e.to_string()))?
    {
        match field.name() {
            Some("file") => {
                let display_name = field
                    .file_name()
                    .map(str::to_string)
                    .ok_or_else(|| ApiError::bad_request("file name is required"))?;
                let temp_file = spool_to_disk(&state.upload_dir, &mut field).await?;
                spooled = Some((temp_file, display_name));
            }
            Some("account") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(&e.to_string()))?;
                if !text.is_empty() {
                    account = Some(AccountAddress::new(text));
                }
            }
            _ => {}
        }
    }

    let (temp_file, display_name) =
        spooled.ok_or_else(|| ApiError::from(PipelineError::NoFileProvided))?;
    // The pin upload reads the complete artifact back from local storage,
    // decoupling it from the inbound transfer. The spool file is removed
    // when it drops.
    let bytes = tokio::fs::read(temp_file.path())
        .await
        .map_err(|e| ApiError::internal_error_str(&format!("failed to read spooled file: {e}")))?;

    let registration = state
        .pipeline
        .process(UploadRequest {
            bytes: Bytes::from(bytes),
            display_name,
            account,
        })
        .await?;

    Ok(Json(UploadResponse {
        message: "file uploaded and IPFS hash stored on ledger".to_string(),
        ipfs_hash: registration.ipfs_hash,
    }))
}

async fn spool_to_disk(upload_dir: &Path, field: &mut Field<'_>) -> Result<NamedTempFile, ApiError> {
    tokio::fs::create_dir_all(upload_dir).await.map_err(|e| {
        ApiError::internal_error_str(&format!("failed to create upload dir: {e}"))
    })?;
    let temp_file = NamedTempFile::new_in(upload_dir)
        .map_err(|e| ApiError::internal_error_str(&format!("failed to create spool file: {e}")))?;
    let reopened = temp_file
        .reopen()
        .map_err(|e| ApiError::internal_error_str(&format!("failed to open spool file: {e}")))?;
    let mut writer = tokio::fs::File::from_std(reopened);

    let mut size_bytes: u64 = 0;
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| ApiError::bad_request(&e.to_string()))?
    {
        size_bytes += chunk.len() as u64;
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| ApiError::internal_error_str(&format!("failed to spool upload: {e}")))?;
    }
    writer
        .flush()
        .await
        .map_err(|e| ApiError::internal_error_str(&format!("failed to spool upload: {e}")))?;
    debug!("spooled {} bytes to {:?}", size_bytes, temp_file.path());
    Ok(temp_file)
}
