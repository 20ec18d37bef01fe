//! Collector HTTP API.
//!
//! - `/init` (any method): run the cold-start cycle once
//! - anything else: `404 Not found`

use crate::collector::{Collector, InitOutcome};
use crate::error::CycleError;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::any,
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::error;

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// ---------------------------------------------------------------------------
// HTTP handlers
// ---------------------------------------------------------------------------

async fn init(State(collector): State<Arc<Collector>>) -> Result<&'static str, AppError> {
    match collector.initialize().await? {
        InitOutcome::Initialized(_) => Ok("Collector initialized"),
        InitOutcome::AlreadyInitialized => Ok("Collector already initialized"),
    }
}

async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not found")
}

/// Internal error type that maps to HTTP 500.
struct AppError(CycleError);

impl From<CycleError> for AppError {
    fn from(e: CycleError) -> Self {
        AppError(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!(kind = self.0.kind(), error = %self.0, "Initialization failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn create_router(collector: Arc<Collector>) -> Router {
    Router::new()
        .route("/init", any(init))
        .fallback(not_found)
        .with_state(collector)
}
