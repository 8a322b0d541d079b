//! Request orchestration: upload → tensor → probability → decision → prompt →
//! report.

use crate::models::{ClassificationResult, Label, PatientInfo, Severity};
use crate::services::decision;
use crate::services::model::{ModelError, ModelRegistry};
use crate::services::preprocess::{self, PreprocessError};
use crate::services::prompt;
use crate::services::report::{ReportClient, ReportGenerationError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Preprocessing,
    Inferring,
    Deciding,
    BuildingPrompt,
    GeneratingReport,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Preprocessing => "preprocessing",
            Stage::Inferring => "inferring",
            Stage::Deciding => "deciding",
            Stage::BuildingPrompt => "building_prompt",
            Stage::GeneratingReport => "generating_report",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The diagnosis computed before a later stage failed.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnosis {
    pub label: Label,
    pub probability: f32,
    pub confidence: f32,
    pub severity: Option<Severity>,
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Preprocess(#[from] PreprocessError),

    #[error(transparent)]
    Inference(#[from] ModelError),

    #[error("{source}")]
    Report {
        diagnosis: Diagnosis,
        source: ReportGenerationError,
    },
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Preprocess(_) => Stage::Preprocessing,
            PipelineError::Inference(_) => Stage::Inferring,
            PipelineError::Report { .. } => Stage::GeneratingReport,
        }
    }
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let error = format!("Prediction failed: {}", self);
        let body = match self {
            PipelineError::Report { diagnosis, .. } => json!({
                "error": error,
                "diagnosis": diagnosis,
            }),
            _ => json!({ "error": error }),
        };

        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

/// Raw inputs of one prediction request.
#[derive(Debug, Clone, Default)]
pub struct PredictionUpload {
    pub image: Vec<u8>,
    pub location: Option<String>,
    pub age: Option<String>,
    pub symptoms: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PredictionOutcome {
    pub result: ClassificationResult,
    pub severity: Option<Severity>,
    pub report: String,
    pub patient: PatientInfo,
}

pub struct DiagnosisPipeline {
    registry: Arc<ModelRegistry>,
    report: ReportClient,
    default_location: String,
}

impl DiagnosisPipeline {
    pub fn new(
        registry: Arc<ModelRegistry>,
        report: ReportClient,
        default_location: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            report,
            default_location: default_location.into(),
        }
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    pub fn report_client(&self) -> &ReportClient {
        &self.report
    }

    pub async fn run(&self, upload: PredictionUpload) -> Result<PredictionOutcome, PipelineError> {
        let start = Instant::now();
        let result = self.execute(upload).await;

        match &result {
            Ok(outcome) => {
                metrics::counter!("predictions_total", "label" => outcome.result.label.as_str())
                    .increment(1);
                tracing::info!(
                    label = %outcome.result.label,
                    probability = outcome.result.probability,
                    severity = outcome.severity.map(|s| s.as_str()),
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Prediction completed"
                );
            }
            Err(e) => {
                let stage = e.stage();
                metrics::counter!("prediction_failures_total", "stage" => stage.as_str())
                    .increment(1);
                tracing::error!(
                    stage = %stage,
                    error = %e,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Prediction failed"
                );
            }
        }

        result
    }

    async fn execute(&self, upload: PredictionUpload) -> Result<PredictionOutcome, PipelineError> {
        tracing::debug!(stage = %Stage::Preprocessing, bytes = upload.image.len());
        let tensor = preprocess::preprocess_blocking(upload.image).await?;

        tracing::debug!(stage = %Stage::Inferring);
        let probability = self.registry.classify(tensor).await?;

        tracing::debug!(stage = %Stage::Deciding, probability);
        let result = decision::decide(probability);
        let severity = decision::severity_for(&result);

        tracing::debug!(stage = %Stage::BuildingPrompt, label = %result.label);
        let patient = PatientInfo::from_form(
            upload.location,
            upload.age,
            upload.symptoms,
            &self.default_location,
        )
        .with_severity(severity);
        let request = prompt::build(result.label, &patient);

        tracing::debug!(stage = %Stage::GeneratingReport, provider = self.report.provider_name());
        let report = self
            .report
            .generate(&request)
            .await
            .map_err(|source| PipelineError::Report {
                diagnosis: Diagnosis {
                    label: result.label,
                    probability: result.probability,
                    confidence: result.confidence,
                    severity,
                },
                source,
            })?;

        Ok(PredictionOutcome {
            result,
            severity,
            report,
            patient,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::model::StaticModelLoader;
    use crate::services::providers::{mock::MockTextProvider, GenerationParams, TextProvider};
    use image::{ImageFormat, RgbImage};
    use std::io::Cursor;
    use std::time::Duration;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, image::Rgb([90, 90, 90]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    async fn pipeline(probability: f32, provider: Arc<dyn TextProvider>) -> DiagnosisPipeline {
        let registry = ModelRegistry::load(Arc::new(StaticModelLoader::new(probability)), "m.onnx")
            .await
            .unwrap();
        let report = ReportClient::new(provider, GenerationParams::default(), Duration::ZERO);
        DiagnosisPipeline::new(Arc::new(registry), report, "Parasarampuram, AP")
    }

    fn upload(image: Vec<u8>) -> PredictionUpload {
        PredictionUpload {
            image,
            age: Some("61".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn pneumonia_result_carries_severity_and_report() {
        let pipeline = pipeline(0.9, Arc::new(MockTextProvider::new(true))).await;
        let outcome = pipeline.run(upload(png(200, 150))).await.unwrap();

        assert_eq!(outcome.result.label, Label::Pneumonia);
        assert_eq!(outcome.result.confidence, 0.9);
        assert_eq!(outcome.severity, Some(Severity::Severe));
        assert_eq!(outcome.patient.severity, Some(Severity::Severe));
        assert_eq!(outcome.patient.location, "Parasarampuram, AP");
        assert!(outcome.report.contains("when to go to hospital"));
    }

    #[tokio::test]
    async fn normal_result_has_no_severity() {
        let pipeline = pipeline(0.2, Arc::new(MockTextProvider::new(true))).await;
        let outcome = pipeline.run(upload(png(64, 64))).await.unwrap();

        assert_eq!(outcome.result.label, Label::Normal);
        assert!((outcome.result.confidence - 0.8).abs() < 1e-6);
        assert_eq!(outcome.severity, None);
        assert_eq!(outcome.patient.severity, None);
    }

    #[tokio::test]
    async fn undecodable_image_fails_at_preprocessing() {
        let pipeline = pipeline(0.9, Arc::new(MockTextProvider::new(true))).await;
        let err = pipeline.run(upload(b"not an image".to_vec())).await.unwrap_err();
        assert_eq!(err.stage(), Stage::Preprocessing);
    }

    #[tokio::test]
    async fn report_failure_keeps_the_diagnosis() {
        let pipeline = pipeline(0.7, Arc::new(MockTextProvider::new(false))).await;
        let err = pipeline.run(upload(png(64, 64))).await.unwrap_err();

        assert_eq!(err.stage(), Stage::GeneratingReport);
        match err {
            PipelineError::Report { diagnosis, .. } => {
                assert_eq!(diagnosis.label, Label::Pneumonia);
                assert_eq!(diagnosis.severity, Some(Severity::Moderate));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
