use axum::{extract::State, http::StatusCode, response::Json};
use turno_core::sync::document::Document;
use turno_core::sync::UpsertResponse;

use super::{api_error, store_error, ApiError};
use crate::state::AppState;

pub async fn get_pointer(State(state): State<AppState>) -> Result<Json<Document>, ApiError> {
    state.store.get_pointer().map(Json).ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(super::ErrorResponse {
                error: "No pointer published yet".to_string(),
            }),
        )
    })
}

pub async fn put_pointer(
    State(state): State<AppState>,
    Json(document): Json<Document>,
) -> Result<Json<UpsertResponse>, ApiError> {
    if document.origin().is_none() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "turno.api.put_pointer",
            "Pointer writes must carry originClient".to_string(),
        ));
    }
    state
        .store
        .publish_pointer(document)
        .map(Json)
        .map_err(|e| store_error("turno.api.put_pointer", e))
}
