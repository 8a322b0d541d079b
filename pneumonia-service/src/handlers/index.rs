use crate::dtos::HomeResponse;
use crate::services::metrics::get_metrics;
use axum::{http::header, response::IntoResponse, Json};
use service_core::error::AppError;

pub async fn home() -> Json<HomeResponse> {
    Json(HomeResponse::default())
}

pub async fn not_found() -> AppError {
    AppError::NotFound(anyhow::anyhow!("Endpoint not found"))
}

pub async fn metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        get_metrics(),
    )
}
