//! HTTP transport for the conversion pipeline.
//!
//! - `POST /v1/convert`: multipart upload (`data`, plus optional `password`,
//!   `density`, `quality`, `merge`, `format`) → `{"id", "data": [...]}`
//! - `GET /health`: liveness and version
//!
//! Errors are `{"code": <int>, "message": <str>}`; see [`types::ErrorCode`].

mod handlers;
pub mod types;
pub mod upload;

use crate::config::ServiceConfig;
use crate::convert::Converter;
use crate::server::types::ApiError;
use axum::extract::DefaultBodyLimit;
use axum::response::{IntoResponse, Response};
use axum::{
    routing::{get, post},
    Router,
};
use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

pub use handlers::{convert, health_check};

/// Server state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub converter: Arc<Converter>,
    /// Largest accepted request body, in bytes.
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(converter: Converter, config: &ServiceConfig) -> Self {
        Self {
            converter: Arc::new(converter),
            max_upload_bytes: config.max_upload_bytes,
        }
    }
}

/// Build the API router with all endpoints
pub fn build_router(state: AppState) -> Router {
    let limit = state.max_upload_bytes;
    Router::new()
        .route("/health", get(health_check))
        .route("/v1/convert", post(convert))
        .layer(DefaultBodyLimit::max(limit))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// A panicking handler answers 500 with the usual error body instead of
/// dropping the connection.
fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("non-string panic payload");
    tracing::error!("Request handler panicked: {}", detail);
    ApiError::internal("Internal server error").into_response()
}

/// Serve on an already-bound listener until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), std::io::Error> {
    let app = build_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

/// Bind `addr` and serve until `shutdown` resolves.
pub async fn start_server(
    addr: &str,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);
    serve(listener, state, shutdown).await
}
