use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use turno_core::sync::document::Document;
use turno_core::sync::{LatestReport, UpsertResponse};

use super::{api_error, store_error, ApiError};
use crate::state::AppState;

pub async fn list_reports(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "collection": state.store.collection(),
        "reports": state.store.list_reports(),
    }))
}

pub async fn latest_report(State(state): State<AppState>) -> Result<Json<LatestReport>, ApiError> {
    let (id, document) = state.store.latest_report().ok_or_else(|| {
        api_error(
            StatusCode::NOT_FOUND,
            "turno.api.latest_report",
            "No reports stored yet".to_string(),
        )
    })?;
    Ok(Json(LatestReport { id, document }))
}

pub async fn get_report(
    State(state): State<AppState>,
    Path(report_id): Path<String>,
) -> Result<Json<Document>, ApiError> {
    let document = state
        .store
        .get_report(&report_id)
        .map_err(|e| store_error("turno.api.get_report", e))?;
    match document {
        Some(document) => Ok(Json(document)),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(super::ErrorResponse {
                error: format!("Report not found: {}", report_id),
            }),
        )),
    }
}

pub async fn put_report(
    State(state): State<AppState>,
    Path(report_id): Path<String>,
    Json(document): Json<Document>,
) -> Result<Json<UpsertResponse>, ApiError> {
    let response = state
        .store
        .upsert_report(&report_id, document)
        .map_err(|e| store_error("turno.api.put_report", e))?;
    if !response.applied {
        log::info!(
            target: "turno.api.put_report",
            "Ignored write to {}: stored record at {} is not older",
            report_id,
            response.updated_at
        );
    }
    Ok(Json(response))
}
