//! Deterministic assembly of the care-report request.
//!
//! All defaulting of patient fields happens here: every field has a fixed,
//! named slot and an absent or empty value renders as [`NOT_PROVIDED`].

use crate::models::{Label, PatientInfo};
use std::fmt::Write;

pub const NOT_PROVIDED: &str = "Not provided";

pub const SYSTEM_INSTRUCTION: &str = "You are a careful healthcare assistant. \
You must not provide exact prescription antibiotics/doses. \
Give safe, general guidance and clear red-flag escalation steps. \
Write in English only. Use headings + bullet points.";

/// Local, fixed guidance. No retrieval of any kind.
pub const STATIC_MEDICAL_CONTEXT: &str = "\
This app is an AI screening tool for pneumonia on chest X-ray images.
General patient guidance (non-prescriptive):
- Pneumonia can be caused by bacteria/viruses; symptoms include cough, fever, breathlessness, chest pain, fatigue.
- Home care often includes rest, fluids, fever control medicines as advised, and monitoring breathing.
- Seek urgent care if breathing difficulty, low oxygen, chest pain, confusion, bluish lips, dehydration, or worsening symptoms.
- Antibiotics are only used when a clinician suspects/diagnoses bacterial pneumonia. Do not self-start antibiotics.
- Follow-up is important if symptoms don't improve within 24-48 hours or worsen.";

const PNEUMONIA_INSTRUCTIONS: &[&str] = &[
    "Explain what it means in patient-friendly language.",
    "Provide immediate next steps and when to go to hospital.",
    "Provide supportive home care guidance (non-prescriptive).",
    "Provide a daily symptom tracker checklist for 5-7 days.",
    "Add follow-up plan (when to re-check, what to monitor).",
];

const NORMAL_INSTRUCTIONS: &[&str] = &[
    "Reassure the user.",
    "List possible reasons symptoms may still exist (general).",
    "Provide prevention tips and when to seek care anyway.",
    "Provide a simple symptom tracker for a few days.",
];

/// Patient fields after defaulting, one slot per field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatientSlots {
    pub location: String,
    pub age: String,
    pub symptoms: String,
    pub severity: String,
}

fn slot(value: Option<&str>) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => NOT_PROVIDED.to_string(),
    }
}

impl PatientSlots {
    pub fn from_patient(patient: &PatientInfo) -> Self {
        Self {
            location: slot(Some(&patient.location)),
            age: slot(patient.age.as_deref()),
            symptoms: slot(patient.symptoms.as_deref()),
            severity: slot(patient.severity.map(|s| s.as_str())),
        }
    }
}

/// Immutable request for the text-generation service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CareReportRequest {
    diagnosis: Label,
    patient: PatientSlots,
    system_instruction: &'static str,
    user_prompt: String,
}

impl CareReportRequest {
    pub fn diagnosis(&self) -> Label {
        self.diagnosis
    }

    pub fn patient(&self) -> &PatientSlots {
        &self.patient
    }

    pub fn system_instruction(&self) -> &str {
        self.system_instruction
    }

    pub fn user_prompt(&self) -> &str {
        &self.user_prompt
    }
}

pub fn build(diagnosis: Label, patient: &PatientInfo) -> CareReportRequest {
    let slots = PatientSlots::from_patient(patient);
    let user_prompt = render_user_prompt(diagnosis, &slots);

    CareReportRequest {
        diagnosis,
        patient: slots,
        system_instruction: SYSTEM_INSTRUCTION,
        user_prompt,
    }
}

fn render_user_prompt(diagnosis: Label, slots: &PatientSlots) -> String {
    let instructions = match diagnosis {
        Label::Pneumonia => PNEUMONIA_INSTRUCTIONS,
        Label::Normal => NORMAL_INSTRUCTIONS,
    };

    let mut prompt = String::with_capacity(1024);
    // Writing to a String cannot fail.
    let _ = write!(
        prompt,
        "Context (local, no web search):\n{context}\n\n\
         Diagnosis output: {diagnosis}\n\n\
         Patient info:\n\
         - Location: {location}\n\
         - Age: {age}\n\
         - Symptoms: {symptoms}\n\
         - Severity (if available): {severity}\n\n\
         Instructions (diagnosis is \"{diagnosis}\"):\n",
        context = STATIC_MEDICAL_CONTEXT,
        diagnosis = diagnosis,
        location = slots.location,
        age = slots.age,
        symptoms = slots.symptoms,
        severity = slots.severity,
    );
    for line in instructions {
        let _ = writeln!(prompt, "- {}", line);
    }
    prompt.push_str("\nOutput must be a complete patient report ready to display in the app UI.\n");
    prompt
}
