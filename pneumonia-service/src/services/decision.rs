//! Probability → label / confidence / severity mapping.

use crate::models::{ClassificationResult, Label, Severity};

/// Probabilities strictly above this are pneumonia; exactly 0.5 is normal.
pub const DECISION_THRESHOLD: f32 = 0.5;

const MODERATE_FROM: f32 = 0.65;
const SEVERE_FROM: f32 = 0.85;

pub fn decide(probability: f32) -> ClassificationResult {
    if probability > DECISION_THRESHOLD {
        ClassificationResult {
            probability,
            label: Label::Pneumonia,
            confidence: probability,
        }
    } else {
        ClassificationResult {
            probability,
            label: Label::Normal,
            confidence: 1.0 - probability,
        }
    }
}

/// Step function over the same probability used for the label.
///
/// This is a heuristic approximation, not a validated clinical severity
/// signal. Callers should only consult it for pneumonia results.
pub fn severity(probability: f32) -> Severity {
    if probability < MODERATE_FROM {
        Severity::Mild
    } else if probability < SEVERE_FROM {
        Severity::Moderate
    } else {
        Severity::Severe
    }
}

/// Severity for a decided result, `None` unless the label is pneumonia.
pub fn severity_for(result: &ClassificationResult) -> Option<Severity> {
    match result.label {
        Label::Pneumonia => Some(severity(result.probability)),
        Label::Normal => None,
    }
}
