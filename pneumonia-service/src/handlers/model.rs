use crate::dtos::ReloadResponse;
use crate::startup::AppState;
use axum::{extract::State, http::StatusCode, Json};

pub async fn reload_model(State(state): State<AppState>) -> (StatusCode, Json<ReloadResponse>) {
    match state.registry.reload().await {
        Ok(()) => (StatusCode::OK, Json(ReloadResponse::success())),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ReloadResponse::failure(e)),
        ),
    }
}
