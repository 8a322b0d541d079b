//! Domain types for the diagnosis pipeline.

pub mod diagnosis;
pub mod patient;

pub use diagnosis::{ClassificationResult, Label, Severity};
pub use patient::PatientInfo;
