use crate::dtos::PredictionResponse;
use crate::services::PredictionUpload;
use crate::startup::AppState;
use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, State,
    },
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use service_core::error::AppError;

fn bad_request(message: &'static str) -> Response {
    AppError::BadRequest(anyhow::anyhow!(message)).into_response()
}

fn multipart_failure(e: MultipartError) -> Response {
    (e.status(), Json(json!({ "error": e.body_text() }))).into_response()
}

/// `POST /predict`: multipart form with a required `file` part and optional
/// `location`, `age` and `symptoms` text fields.
pub async fn predict(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictionResponse>, Response> {
    let Ok(mut multipart) = multipart else {
        return Err(bad_request("No file uploaded"));
    };

    let mut upload = PredictionUpload::default();
    let mut file: Option<(Option<String>, Vec<u8>)> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_failure)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let file_name = field.file_name().map(str::to_string);
                let data = field.bytes().await.map_err(multipart_failure)?;
                file = Some((file_name, data.to_vec()));
            }
            Some("location") => {
                upload.location = Some(field.text().await.map_err(multipart_failure)?);
            }
            Some("age") => {
                upload.age = Some(field.text().await.map_err(multipart_failure)?);
            }
            Some("symptoms") => {
                upload.symptoms = Some(field.text().await.map_err(multipart_failure)?);
            }
            _ => {}
        }
    }

    let Some((file_name, data)) = file else {
        return Err(bad_request("No file uploaded"));
    };
    if file_name.as_deref().map_or(true, str::is_empty) || data.is_empty() {
        return Err(bad_request("No file selected"));
    }

    tracing::info!(
        file_name = file_name.as_deref().unwrap_or_default(),
        bytes = data.len(),
        "Prediction requested"
    );

    upload.image = data;
    let outcome = state
        .pipeline
        .run(upload)
        .await
        .map_err(IntoResponse::into_response)?;

    Ok(Json(PredictionResponse::from(outcome)))
}
