//! Wire types for the HTTP API.

use crate::error::{ErrorKind, Pdf64Error};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize, Serializer};
use tracing::{error, warn};

/// Successful `POST /v1/convert` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertResponse {
    pub id: String,
    /// Data-URI images in page order.
    pub data: Vec<String>,
}

/// `GET /health` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Machine-readable error codes, serialised as integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrorCode {
    MaxFileSize = 1,
    BadRequest = 2,
    Internal = 3,
    PasswordRequired = 4,
    DecryptionFailed = 5,
    ConversionFailed = 6,
    Cancelled = 7,
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

/// Error body: `{"code": <int>, "message": <str>}`.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
}

/// An error on its way to the client.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                code,
                message: message.into(),
            },
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, ErrorCode::BadRequest, message)
    }

    pub fn too_large(limit: usize) -> Self {
        Self::new(
            StatusCode::PAYLOAD_TOO_LARGE,
            ErrorCode::MaxFileSize,
            format!("Upload exceeds the {} MiB limit", limit >> 20),
        )
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::Internal,
            message,
        )
    }
}

impl From<Pdf64Error> for ApiError {
    fn from(err: Pdf64Error) -> Self {
        let message = err.client_message();

        // Missing tooling is an operator problem, not a bad upload.
        if let Pdf64Error::ToolUnavailable { .. } = err {
            error!("Conversion tooling unavailable: {}", err);
            return Self::new(StatusCode::SERVICE_UNAVAILABLE, ErrorCode::Internal, message);
        }

        let (status, code) = match err.kind() {
            ErrorKind::InputUnreadable => (StatusCode::BAD_REQUEST, ErrorCode::BadRequest),
            ErrorKind::PasswordRequired => (StatusCode::BAD_REQUEST, ErrorCode::PasswordRequired),
            ErrorKind::DecryptionFailed => (StatusCode::BAD_REQUEST, ErrorCode::DecryptionFailed),
            ErrorKind::ConversionFailed => {
                (StatusCode::UNPROCESSABLE_ENTITY, ErrorCode::ConversionFailed)
            }
            ErrorKind::Cancelled => (StatusCode::REQUEST_TIMEOUT, ErrorCode::Cancelled),
            ErrorKind::Internal => (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::Internal),
        };

        if status.is_server_error() {
            error!("Conversion failed: {}", err);
        } else {
            warn!("Conversion rejected ({}): {}", status, err);
        }
        Self::new(status, code, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Step;

    #[test]
    fn codes_serialise_as_integers() {
        let body = ErrorBody {
            code: ErrorCode::PasswordRequired,
            message: "PDF is password protected".into(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["code"], 4);
        assert_eq!(json["message"], "PDF is password protected");
    }

    #[test]
    fn kinds_map_to_status_and_code() {
        let cases = [
            (
                Pdf64Error::PasswordRequired { id: "a".into() },
                StatusCode::BAD_REQUEST,
                ErrorCode::PasswordRequired,
            ),
            (
                Pdf64Error::DecryptionFailed {
                    id: "a".into(),
                    detail: "invalid password".into(),
                },
                StatusCode::BAD_REQUEST,
                ErrorCode::DecryptionFailed,
            ),
            (
                Pdf64Error::NoPagesProduced { id: "a".into() },
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorCode::ConversionFailed,
            ),
            (
                Pdf64Error::Cancelled {
                    step: Step::Rasterize,
                },
                StatusCode::REQUEST_TIMEOUT,
                ErrorCode::Cancelled,
            ),
            (
                Pdf64Error::ToolUnavailable {
                    tool: "magick".into(),
                    step: Step::Rasterize,
                    detail: "not found".into(),
                },
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorCode::Internal,
            ),
            (
                Pdf64Error::Internal("disk full".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorCode::Internal,
            ),
        ];
        for (err, status, code) in cases {
            let api = ApiError::from(err);
            assert_eq!(api.status, status);
            assert_eq!(api.body.code, code);
        }
    }

    #[test]
    fn internal_detail_is_not_leaked() {
        let api = ApiError::from(Pdf64Error::Internal("/var/tmp/x: disk full".into()));
        assert_eq!(api.body.message, "Internal server error");
    }
}
