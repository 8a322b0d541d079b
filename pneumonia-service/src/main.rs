use pneumonia_service::config::ServiceConfig;
use pneumonia_service::services::metrics::init_metrics;
use pneumonia_service::startup::Application;
use service_core::observability::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Tracing is not up yet, so a bad configuration is reported through the error.
    let config =
        ServiceConfig::load().map_err(|e| anyhow::anyhow!("configuration error: {}", e))?;

    init_tracing(
        "pneumonia-service",
        &config.common.log_level,
        config.otlp_endpoint.as_deref(),
    );

    if config.report.api_key.is_none() {
        tracing::warn!("GROQ_API_KEY is not set; report generation will fail until it is");
    }

    init_metrics()?;

    tracing::info!(
        port = config.common.port,
        model_path = %config.model.path.display(),
        cors_origins = ?config.http.cors_origins,
        "Starting pneumonia-service"
    );

    let application = Application::build(config)
        .await
        .map_err(|e| anyhow::anyhow!("start-up failed: {}", e))?;
    application.run_until_stopped().await?;

    Ok(())
}
