//! HTTP request handlers.

use crate::config::ConversionOptions;
use crate::convert::ConversionRequest;
use crate::server::types::{ApiError, ConvertResponse, HealthResponse};
use crate::server::upload;
use crate::server::AppState;
use axum::extract::multipart::{Multipart, MultipartRejection};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Convert an uploaded PDF into data-URI images.
///
/// The upload lives in a per-request `TempDir` that is removed however the
/// handler exits. If the client disconnects, the handler future is dropped,
/// the drop guard cancels the token, and the running tool is killed.
pub async fn convert(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ConvertResponse>, ApiError> {
    let multipart = multipart.map_err(|e| {
        debug!("Rejected request body: {}", e.body_text());
        ApiError::bad_request("Failed to parse form")
    })?;

    let workdir = tempfile::Builder::new()
        .prefix("pdf64-upload-")
        .tempdir()
        .map_err(|e| ApiError::internal(format!("Failed to create upload directory: {e}")))?;

    let form = upload::read_form(multipart, workdir.path(), state.max_upload_bytes).await?;
    let location = form
        .file
        .ok_or_else(|| ApiError::bad_request("Failed to get uploaded file"))?;

    let options = ConversionOptions::from_form(
        form.density.as_deref(),
        form.quality.as_deref(),
        form.merge.as_deref(),
        form.format.as_deref(),
    );
    let request = ConversionRequest {
        location,
        password: form.password,
        options,
    };

    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();

    let result = state.converter.execute(&request, &cancel).await?;
    info!(
        "Converted upload into document {} ({} image(s))",
        result.id,
        result.images.len()
    );

    Ok(Json(ConvertResponse {
        id: result.id,
        data: result.images,
    }))
}
