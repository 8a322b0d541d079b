//! Care-report generation on top of a [`TextProvider`].

use crate::services::prompt::CareReportRequest;
use crate::services::providers::{GenerationParams, ProviderError, TextProvider};
use backoff::future::retry;
use backoff::ExponentialBackoff;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Error, Debug)]
#[error("report generation failed: {source}")]
pub struct ReportGenerationError {
    #[from]
    pub source: ProviderError,
}

/// Sends one [`CareReportRequest`] and returns the generated text verbatim.
///
/// With a zero retry budget a single attempt is made. Otherwise transient
/// provider failures are retried with exponential backoff until the budget
/// elapses. The budget only stops new attempts, so with an attempt timeout
/// set the whole retry loop is additionally capped at budget + one attempt.
#[derive(Clone)]
pub struct ReportClient {
    provider: Arc<dyn TextProvider>,
    params: GenerationParams,
    retry_max_elapsed: Duration,
    attempt_timeout: Option<Duration>,
}

impl ReportClient {
    pub fn new(
        provider: Arc<dyn TextProvider>,
        params: GenerationParams,
        retry_max_elapsed: Duration,
    ) -> Self {
        Self {
            provider,
            params,
            retry_max_elapsed,
            attempt_timeout: None,
        }
    }

    /// Upper bound of a single provider call, used to cap the retry loop.
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_configured()
    }

    pub async fn generate(
        &self,
        request: &CareReportRequest,
    ) -> Result<String, ReportGenerationError> {
        let start = Instant::now();

        let result = if self.retry_max_elapsed.is_zero() {
            self.attempt(request).await
        } else {
            match self.attempt_timeout {
                Some(attempt) => {
                    let deadline = self.retry_max_elapsed + attempt;
                    tokio::time::timeout(deadline, self.with_retries(request))
                        .await
                        .unwrap_or_else(|_| {
                            tracing::warn!(
                                provider = self.provider.name(),
                                deadline_ms = deadline.as_millis() as u64,
                                "Report generation exceeded its retry deadline"
                            );
                            Err(ProviderError::Timeout)
                        })
                }
                None => self.with_retries(request).await,
            }
        };

        match result {
            Ok(text) => {
                metrics::histogram!("report_generation_duration_seconds")
                    .record(start.elapsed().as_secs_f64());
                Ok(text)
            }
            Err(e) => {
                metrics::counter!(
                    "report_provider_errors_total",
                    "provider" => self.provider.name(),
                    "kind" => e.kind()
                )
                .increment(1);
                Err(e.into())
            }
        }
    }

    async fn with_retries(&self, request: &CareReportRequest) -> Result<String, ProviderError> {
        let backoff = ExponentialBackoff {
            initial_interval: Duration::from_millis(200),
            max_elapsed_time: Some(self.retry_max_elapsed),
            ..Default::default()
        };

        retry(backoff, || async {
            self.attempt(request).await.map_err(|e| {
                if e.is_transient() {
                    tracing::warn!(provider = self.provider.name(), error = %e, "Retrying report generation");
                    backoff::Error::transient(e)
                } else {
                    backoff::Error::permanent(e)
                }
            })
        })
        .await
    }

    async fn attempt(&self, request: &CareReportRequest) -> Result<String, ProviderError> {
        let response = self.provider.generate(request, &self.params).await?;

        tracing::debug!(
            provider = self.provider.name(),
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            "Report generated"
        );

        Ok(response.text)
    }
}
