use super::Severity;
use serde::Serialize;

/// Per-request patient facts echoed in the response and fed to the report prompt.
///
/// `severity` is only ever set for pneumonia results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientInfo {
    pub location: String,
    pub age: Option<String>,
    pub symptoms: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
}

impl PatientInfo {
    /// Builds patient info from optional form fields, substituting
    /// `default_location` when the caller sent no location at all.
    pub fn from_form(
        location: Option<String>,
        age: Option<String>,
        symptoms: Option<String>,
        default_location: &str,
    ) -> Self {
        Self {
            location: location.unwrap_or_else(|| default_location.to_string()),
            age,
            symptoms,
            severity: None,
        }
    }

    pub fn with_severity(mut self, severity: Option<Severity>) -> Self {
        self.severity = severity;
        self
    }
}
