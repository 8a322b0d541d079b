use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::services::providers::groq::GROQ_API_BASE;

pub const DEFAULT_MODEL_PATH: &str = "model/pneumonia_classifier.onnx";
pub const DEFAULT_LOCATION: &str = "Parasarampuram, AP";
pub const DEFAULT_REPORT_MODEL: &str = "llama-3.1-8b-instant";

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub common: core_config::Config,
    pub model: ModelConfig,
    pub report: ReportConfig,
    pub http: HttpConfig,
    pub otlp_endpoint: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub path: PathBuf,
    /// ONNX Runtime sessions kept per loaded model.
    pub sessions: usize,
}

#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub api_key: Option<String>,
    pub api_base: String,
    pub model: String,
    pub temperature: f32,
    pub timeout: Duration,
    /// Zero disables retries.
    pub retry_max_elapsed: Duration,
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub cors_origins: Vec<String>,
    pub default_location: String,
    pub predict_rate_limit_per_minute: u32,
    pub global_rate_limit_per_hour: u32,
    pub max_upload_bytes: usize,
    /// Key rate limits on the first `X-Forwarded-For` entry instead of the
    /// peer address. Only safe behind a proxy that sets the header.
    pub trust_forwarded_for: bool,
}

impl ServiceConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        let api_key = env::var("GROQ_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());

        Ok(ServiceConfig {
            common: common_config,
            model: ModelConfig {
                path: PathBuf::from(get_env("MODEL_PATH", Some(DEFAULT_MODEL_PATH), is_prod)?),
                sessions: parse_env::<usize>("INFERENCE_SESSIONS", 1)?.max(1),
            },
            report: ReportConfig {
                api_key,
                api_base: get_env("GROQ_API_BASE", Some(GROQ_API_BASE), false)?,
                model: get_env("REPORT_MODEL", Some(DEFAULT_REPORT_MODEL), false)?,
                temperature: parse_env("REPORT_TEMPERATURE", 0.2)?,
                timeout: Duration::from_secs(parse_env("REPORT_TIMEOUT_SECS", 60)?),
                retry_max_elapsed: Duration::from_secs(parse_env(
                    "REPORT_RETRY_MAX_ELAPSED_SECS",
                    0,
                )?),
            },
            http: HttpConfig {
                cors_origins: parse_origins(&get_env("CORS_ORIGINS", Some("*"), is_prod)?),
                default_location: get_env("DEFAULT_LOCATION", Some(DEFAULT_LOCATION), false)?,
                predict_rate_limit_per_minute: parse_env("PREDICT_RATE_LIMIT_PER_MINUTE", 10)?,
                global_rate_limit_per_hour: parse_env("GLOBAL_RATE_LIMIT_PER_HOUR", 50)?,
                max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", 16 * 1024 * 1024)?,
                trust_forwarded_for: parse_env("TRUST_FORWARDED_FOR", false)?,
            },
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|v| !v.is_empty()),
        })
    }
}

/// Splits a comma-separated origin list, dropping blanks.
pub fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_env<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr + ToString,
    T::Err: std::fmt::Display,
{
    let raw = get_env(key, Some(&default.to_string()), false)?;
    raw.trim().parse().map_err(|e: T::Err| {
        AppError::ConfigError(anyhow::anyhow!("{} has an invalid value {:?}: {}", key, raw, e))
    })
}

/// Reads `key`, falling back to `default`. With `required` set (production
/// deployments) the variable must be present.
fn get_env(key: &str, default: Option<&str>, required: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if required {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}
