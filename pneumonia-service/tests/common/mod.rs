#![allow(dead_code)]

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, Request},
    response::Response,
};
use http_body_util::BodyExt;
use image::{ImageFormat, Rgb, RgbImage};
use pneumonia_service::config::{HttpConfig, ModelConfig, ReportConfig, ServiceConfig};
use pneumonia_service::services::model::{ModelRegistry, StaticModelLoader};
use pneumonia_service::services::providers::mock::MockTextProvider;
use pneumonia_service::services::providers::TextProvider;
use pneumonia_service::startup::AppState;
use serde_json::Value;
use std::io::Cursor;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub const BOUNDARY: &str = "----pneumonia-test-boundary";
pub const MODEL_PATH: &str = "model/test_classifier.onnx";

pub fn test_config() -> ServiceConfig {
    ServiceConfig {
        common: service_core::config::Config {
            port: 0,
            log_level: "error".to_string(),
        },
        model: ModelConfig {
            path: PathBuf::from(MODEL_PATH),
            sessions: 1,
        },
        report: ReportConfig {
            api_key: None,
            api_base: "http://127.0.0.1:9".to_string(),
            model: "llama-3.1-8b-instant".to_string(),
            temperature: 0.2,
            timeout: Duration::from_secs(5),
            retry_max_elapsed: Duration::ZERO,
        },
        http: HttpConfig {
            cors_origins: vec!["*".to_string()],
            default_location: "Parasarampuram, AP".to_string(),
            predict_rate_limit_per_minute: 100,
            global_rate_limit_per_hour: 1000,
            max_upload_bytes: 16 * 1024 * 1024,
            trust_forwarded_for: false,
        },
        otlp_endpoint: None,
    }
}

pub struct TestApp {
    pub state: AppState,
    pub loader: Arc<StaticModelLoader>,
}

pub async fn build_state(
    config: ServiceConfig,
    probability: f32,
    provider: Arc<dyn TextProvider>,
) -> TestApp {
    let loader = Arc::new(StaticModelLoader::new(probability));
    let registry = ModelRegistry::load(loader.clone(), config.model.path.clone())
        .await
        .expect("static model should load");

    TestApp {
        state: AppState::new(config, Arc::new(registry), provider),
        loader,
    }
}

/// State with the default test config and a working mock provider.
pub async fn test_app(probability: f32) -> TestApp {
    build_state(test_config(), probability, Arc::new(MockTextProvider::new(true))).await
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png)
        .expect("PNG encoding should succeed");
    out.into_inner()
}

/// One part of a hand-assembled multipart body.
pub enum Part<'a> {
    Text(&'a str, &'a str),
    File {
        name: &'a str,
        file_name: Option<&'a str>,
        data: &'a [u8],
    },
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File {
                name,
                file_name,
                data,
            } => {
                let disposition = match file_name {
                    Some(f) => format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                        name, f
                    ),
                    None => format!("Content-Disposition: form-data; name=\"{}\"\r\n", name),
                };
                body.extend_from_slice(disposition.as_bytes());
                body.extend_from_slice(b"Content-Type: image/png\r\n\r\n");
                body.extend_from_slice(data);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn predict_request(parts: &[Part<'_>]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/predict")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

/// Marks `request` as arriving from `ip`, the way `into_make_service_with_connect_info` does.
pub fn from_peer(mut request: Request<Body>, ip: &str) -> Request<Body> {
    let addr: SocketAddr = format!("{ip}:50000").parse().unwrap();
    request.extensions_mut().insert(ConnectInfo(addr));
    request
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn post(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).expect("response body should be JSON")
}
