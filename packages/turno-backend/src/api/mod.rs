use axum::{http::StatusCode, response::Json, routing::get, Router};
use serde::Serialize;

mod events;
mod pointer;
mod reports;

use crate::state::AppState;
use crate::store::StoreError;

/// Axum REST API routes.
///
///   GET  /status             -> health check
///   GET  /reports            -> report ids with updatedAt, newest first
///   GET  /reports/latest     -> most recently updated report
///   GET  /reports/{id}       -> one report document
///   PUT  /reports/{id}       -> LWW upsert-merge of a report
///   GET  /pointer            -> the pointer document
///   PUT  /pointer            -> LWW upsert-merge of the pointer
///   GET  /events             -> SSE stream of accepted changes
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/status", get(events::status))
        .route("/events", get(events::sse_events))
        .route("/reports", get(reports::list_reports))
        .route("/reports/latest", get(reports::latest_report))
        .route(
            "/reports/{report_id}",
            get(reports::get_report).put(reports::put_report),
        )
        .route(
            "/pointer",
            get(pointer::get_pointer).put(pointer::put_pointer),
        )
}

// ── Shared types and helpers used across sub-modules ────────────────────

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

fn log_api_issue(status: StatusCode, target: &'static str, message: impl AsRef<str>) {
    let message = message.as_ref();
    if status.is_server_error() {
        log::error!(target: target, "{}", message);
    } else {
        log::warn!(target: target, "{}", message);
    }
}

fn api_error(status: StatusCode, target: &'static str, error: String) -> ApiError {
    log_api_issue(status, target, &error);
    (status, Json(ErrorResponse { error }))
}

fn store_error(target: &'static str, e: StoreError) -> ApiError {
    let status = match &e {
        StoreError::InvalidId(_) | StoreError::InvalidPointer => StatusCode::BAD_REQUEST,
        StoreError::Io(_) | StoreError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    api_error(status, target, e.to_string())
}
