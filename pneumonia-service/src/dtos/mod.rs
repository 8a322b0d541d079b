pub mod prediction;
pub mod service;

pub use prediction::PredictionResponse;
pub use service::{EndpointIndex, HealthResponse, HomeResponse, ReloadResponse};
