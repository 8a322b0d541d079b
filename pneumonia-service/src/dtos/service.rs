use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model_loaded: bool,
    pub model_path: String,
    /// `[height, width]` of the model input.
    pub expected_input_size: [u32; 2],
    pub runtime_version: String,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ReloadResponse {
    pub status: &'static str,
    pub message: String,
}

impl ReloadResponse {
    pub fn success() -> Self {
        Self {
            status: "success",
            message: "Model reloaded successfully from local folder".to_string(),
        }
    }

    pub fn failure(reason: impl std::fmt::Display) -> Self {
        Self {
            status: "error",
            message: format!("Failed to reload model: {}", reason),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HomeResponse {
    pub message: &'static str,
    pub status: &'static str,
    pub endpoints: EndpointIndex,
}

#[derive(Debug, Serialize)]
pub struct EndpointIndex {
    #[serde(rename = "/predict")]
    pub predict: &'static str,
    #[serde(rename = "/health")]
    pub health: &'static str,
    #[serde(rename = "/reload-model")]
    pub reload_model: &'static str,
}

impl Default for HomeResponse {
    fn default() -> Self {
        Self {
            message: "Pneumonia Detection API",
            status: "running",
            endpoints: EndpointIndex {
                predict: "POST - Upload chest X-ray for pneumonia detection",
                health: "GET - Check API health status",
                reload_model: "POST - Reload model from local folder",
            },
        }
    }
}
