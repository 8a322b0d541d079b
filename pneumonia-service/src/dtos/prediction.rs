use crate::models::{Label, PatientInfo, Severity};
use crate::services::PredictionOutcome;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct PredictionResponse {
    pub label: Label,
    pub probability: f32,
    pub confidence: f32,
    /// `null` for normal results.
    pub severity: Option<Severity>,
    pub report: String,
    pub patient_info: PatientInfo,
    pub status: &'static str,
}

impl From<PredictionOutcome> for PredictionResponse {
    fn from(outcome: PredictionOutcome) -> Self {
        Self {
            label: outcome.result.label,
            probability: outcome.result.probability,
            confidence: outcome.result.confidence,
            severity: outcome.severity,
            report: outcome.report,
            patient_info: outcome.patient,
            status: "success",
        }
    }
}
