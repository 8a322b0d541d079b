use crate::dtos::HealthResponse;
use crate::services::preprocess::{INPUT_HEIGHT, INPUT_WIDTH};
use crate::startup::AppState;
use axum::{extract::State, Json};

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        model_loaded: state.registry.is_loaded(),
        model_path: state.registry.model_path().display().to_string(),
        expected_input_size: [INPUT_HEIGHT, INPUT_WIDTH],
        runtime_version: state.registry.runtime_version(),
        version: env!("CARGO_PKG_VERSION"),
    })
}
