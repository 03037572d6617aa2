//! Multipart upload spooling.
//!
//! The `data` part is streamed chunk by chunk into a file inside the
//! request's private directory; it is never held in memory whole. Text
//! fields are small and read directly.

use crate::server::types::ApiError;
use axum::extract::multipart::{Field, Multipart, MultipartError};
use axum::http::StatusCode;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Name the upload is stored under, whatever the client called it.
const UPLOAD_FILE_NAME: &str = "upload.pdf";

/// The parsed `POST /v1/convert` form.
#[derive(Debug, Default)]
pub struct ConvertForm {
    /// Where the `data` part was spooled, if present.
    pub file: Option<PathBuf>,
    pub password: Option<String>,
    pub density: Option<String>,
    pub quality: Option<String>,
    pub merge: Option<String>,
    pub format: Option<String>,
}

/// Read every field of `multipart`, spooling `data` into `dir`.
///
/// Unknown fields are skipped. A repeated `data` part is ignored after the
/// first.
pub async fn read_form(
    mut multipart: Multipart,
    dir: &Path,
    limit: usize,
) -> Result<ConvertForm, ApiError> {
    let mut form = ConvertForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "data" if form.file.is_none() => {
                let path = dir.join(UPLOAD_FILE_NAME);
                let written = spool(field, &path, limit).await?;
                debug!("Spooled upload: {} bytes", written);
                form.file = Some(path);
            }
            "password" => form.password = Some(text(field, limit).await?),
            "density" | "resolution" => form.density = Some(text(field, limit).await?),
            "quality" => form.quality = Some(text(field, limit).await?),
            "merge" => form.merge = Some(text(field, limit).await?),
            "format" => form.format = Some(text(field, limit).await?),
            other => debug!("Ignoring form field '{}'", other),
        }
    }

    Ok(form)
}

async fn spool(mut field: Field<'_>, path: &Path, limit: usize) -> Result<u64, ApiError> {
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to store upload: {e}")))?;

    let mut written = 0u64;
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        file.write_all(&chunk)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to store upload: {e}")))?;
        written += chunk.len() as u64;
    }
    file.flush()
        .await
        .map_err(|e| ApiError::internal(format!("Failed to store upload: {e}")))?;
    Ok(written)
}

async fn text(field: Field<'_>, limit: usize) -> Result<String, ApiError> {
    field.text().await.map_err(|e| multipart_error(e, limit))
}

fn multipart_error(err: MultipartError, limit: usize) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::too_large(limit)
    } else {
        debug!("Malformed multipart body: {}", err.body_text());
        ApiError::bad_request("Failed to parse form")
    }
}
