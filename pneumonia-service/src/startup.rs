//! Application startup and lifecycle management.

use crate::config::ServiceConfig;
use crate::handlers;
use crate::services::model::{ModelRegistry, OnnxModelLoader};
use crate::services::providers::groq::{GroqConfig, GroqTextProvider};
use crate::services::providers::{GenerationParams, TextProvider};
use crate::services::{DiagnosisPipeline, ReportClient};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use service_core::error::{panic_response, AppError};
use service_core::middleware::{
    ip_rate_limit_middleware, metrics::metrics_middleware,
    security_headers::security_headers_middleware,
    tracing::{make_request_span, request_id_middleware},
    IpRateLimit,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    pub registry: Arc<ModelRegistry>,
    pub pipeline: Arc<DiagnosisPipeline>,
    pub predict_rate_limit: IpRateLimit,
    pub global_rate_limit: IpRateLimit,
}

impl AppState {
    /// Wires the pipeline and rate limiters around an already loaded model.
    pub fn new(
        config: ServiceConfig,
        registry: Arc<ModelRegistry>,
        provider: Arc<dyn TextProvider>,
    ) -> Self {
        let report = ReportClient::new(
            provider,
            GenerationParams {
                temperature: Some(config.report.temperature),
                max_tokens: None,
            },
            config.report.retry_max_elapsed,
        )
        .with_attempt_timeout(config.report.timeout);
        let pipeline = DiagnosisPipeline::new(
            registry.clone(),
            report,
            config.http.default_location.clone(),
        );

        Self {
            predict_rate_limit: IpRateLimit::new(
                config.http.predict_rate_limit_per_minute,
                60,
                config.http.trust_forwarded_for,
            ),
            global_rate_limit: IpRateLimit::new(
                config.http.global_rate_limit_per_hour,
                3600,
                config.http.trust_forwarded_for,
            ),
            config: Arc::new(config),
            registry,
            pipeline: Arc::new(pipeline),
        }
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return cors.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!("Invalid CORS origin '{}': {}. Skipping.", o, e);
                None
            }
        })
        .collect();

    cors.allow_origin(AllowOrigin::list(origins))
}

pub fn build_router(state: AppState) -> Router {
    let predict_route = Router::new()
        .route("/predict", post(handlers::predict))
        .layer(from_fn_with_state(
            state.predict_rate_limit.clone(),
            ip_rate_limit_middleware,
        ));

    Router::new()
        .route("/", get(handlers::home))
        .route("/health", get(handlers::health_check))
        .route("/reload-model", post(handlers::reload_model))
        .route("/metrics", get(handlers::metrics))
        .merge(predict_route)
        .fallback(handlers::not_found)
        .with_state(state.clone())
        .layer(DefaultBodyLimit::max(state.config.http.max_upload_bytes))
        // Global IP rate limiting
        .layer(from_fn_with_state(
            state.global_rate_limit.clone(),
            ip_rate_limit_middleware,
        ))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors_layer(&state.config.http.cors_origins))
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Loads the model, builds the report client and binds the listener.
    ///
    /// A model that cannot be loaded here aborts start-up.
    pub async fn build(config: ServiceConfig) -> Result<Self, AppError> {
        let loader = Arc::new(OnnxModelLoader::new(config.model.sessions));
        let registry = ModelRegistry::load(loader, config.model.path.clone())
            .await
            .map_err(|e| {
                tracing::error!(model_path = %config.model.path.display(), "Failed to load model: {}", e);
                AppError::InternalError(e.into())
            })?;
        tracing::info!(
            model_path = %registry.model_path().display(),
            runtime = %registry.runtime_version(),
            "Model loaded"
        );

        let provider = GroqTextProvider::new(GroqConfig {
            api_key: config.report.api_key.clone(),
            api_base: config.report.api_base.clone(),
            model: config.report.model.clone(),
            timeout: config.report.timeout,
        })
        .map_err(|e| AppError::ConfigError(e.into()))?;
        tracing::info!(
            model = %config.report.model,
            configured = provider.is_configured(),
            "Initialized Groq text provider"
        );

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let state = AppState::new(config, Arc::new(registry), Arc::new(provider));

        // Port 0 = random port for testing
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Pneumonia service listening on port {}", port);

        Ok(Self {
            port,
            listener,
            router: build_router(state),
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Run the application until a shutdown signal arrives.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        axum::serve(
            self.listener,
            self.router
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        tracing::info!("Service shutdown complete");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
