//! Mock provider implementation for testing.

use super::{GenerationParams, ProviderError, ProviderResponse, TextProvider};
use crate::services::prompt::CareReportRequest;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Mock text provider for testing.
///
/// A disabled mock fails every call with `NotConfigured`. `flaky(n)` times
/// out on its first `n` calls and then succeeds.
pub struct MockTextProvider {
    enabled: bool,
    transient_failures: AtomicUsize,
    calls: AtomicUsize,
    delay: Duration,
}

impl MockTextProvider {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            transient_failures: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
        }
    }

    pub fn flaky(transient_failures: usize) -> Self {
        Self {
            enabled: true,
            transient_failures: AtomicUsize::new(transient_failures),
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
        }
    }

    /// Each call waits `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of `generate` calls received.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextProvider for MockTextProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn is_configured(&self) -> bool {
        self.enabled
    }

    async fn generate(
        &self,
        request: &CareReportRequest,
        _params: &GenerationParams,
    ) -> Result<ProviderResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if !self.enabled {
            return Err(ProviderError::NotConfigured(
                "Mock text provider not enabled".to_string(),
            ));
        }

        let remaining = self.transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(ProviderError::Timeout);
        }

        let prompt = request.user_prompt();
        Ok(ProviderResponse {
            text: format!(
                "# Mock care report ({})\n\n{}",
                request.diagnosis(),
                prompt
            ),
            input_tokens: prompt.len() as u32 / 4,
            output_tokens: 10,
        })
    }
}
