//! Recording helpers for convo-forge metrics.
//!
//! `MetricsCollector` wraps the raw Prometheus statics so call sites never
//! deal with labels or uninitialized registries.

use super::prometheus::{
    FILES_TOTAL, LLM_LATENCY, LLM_REQUESTS_TOTAL, LLM_TOKENS_TOTAL, RECORDS_TOTAL, RETRIES_TOTAL,
};

/// Token usage information for LLM requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    /// Number of input/prompt tokens.
    pub input_tokens: u64,
    /// Number of output/completion tokens.
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    /// Get the total number of tokens (input + output).
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// File-level outcome label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcomeLabel {
    Succeeded,
    Partial,
    Failed,
}

impl FileOutcomeLabel {
    fn as_str(self) -> &'static str {
        match self {
            FileOutcomeLabel::Succeeded => "succeeded",
            FileOutcomeLabel::Partial => "partial",
            FileOutcomeLabel::Failed => "failed",
        }
    }
}

/// Metrics collector for convo-forge operations.
///
/// Every method is a no-op until `init_metrics()` has run.
#[derive(Debug, Clone, Default)]
pub struct MetricsCollector;

impl MetricsCollector {
    pub fn new() -> Self {
        Self
    }

    /// Record one finished generation task.
    pub fn record_generation(&self, succeeded: bool) {
        let outcome = if succeeded { "succeeded" } else { "failed" };
        if let Some(records) = RECORDS_TOTAL.get() {
            records.with_label_values(&[outcome]).inc();
        }
    }

    /// Record one processed file.
    pub fn record_file(&self, outcome: FileOutcomeLabel) {
        if let Some(files) = FILES_TOTAL.get() {
            files.with_label_values(&[outcome.as_str()]).inc();
        }
        tracing::trace!(outcome = outcome.as_str(), "Recorded file metric");
    }

    /// Record a retry of `operation`.
    pub fn record_retry(&self, operation: &str) {
        if let Some(retries) = RETRIES_TOTAL.get() {
            retries.with_label_values(&[operation]).inc();
        }
    }

    /// Record an LLM API request.
    ///
    /// # Arguments
    ///
    /// * `model` - LLM model identifier
    /// * `success` - Whether the request succeeded
    /// * `latency_secs` - Request latency in seconds
    /// * `tokens` - Token usage for the request
    pub fn record_llm_request(
        &self,
        model: &str,
        success: bool,
        latency_secs: f64,
        tokens: TokenUsage,
    ) {
        let status = if success { "success" } else { "failure" };

        if let Some(llm_requests) = LLM_REQUESTS_TOTAL.get() {
            llm_requests.with_label_values(&[model, status]).inc();
        }

        if let Some(llm_latency) = LLM_LATENCY.get() {
            llm_latency.with_label_values(&[model]).observe(latency_secs);
        }

        if let Some(llm_tokens) = LLM_TOKENS_TOTAL.get() {
            llm_tokens
                .with_label_values(&[model, "input"])
                .inc_by(tokens.input_tokens as f64);
            llm_tokens
                .with_label_values(&[model, "output"])
                .inc_by(tokens.output_tokens as f64);
        }

        tracing::trace!(
            model = model,
            status = status,
            latency_secs = latency_secs,
            input_tokens = tokens.input_tokens,
            output_tokens = tokens.output_tokens,
            "Recorded LLM request metric"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::init_metrics;

    #[test]
    fn test_token_usage_total() {
        let usage = TokenUsage::new(1000, 500);
        assert_eq!(usage.total(), 1500);
        assert_eq!(TokenUsage::default().total(), 0);
    }

    #[test]
    fn test_recording_increments_counters() {
        let _ = init_metrics();
        let collector = MetricsCollector::new();

        let before = RETRIES_TOTAL
            .get()
            .map(|c| c.with_label_values(&["collector_test"]).get())
            .unwrap_or_default();
        collector.record_retry("collector_test");
        let after = RETRIES_TOTAL
            .get()
            .map(|c| c.with_label_values(&["collector_test"]).get())
            .unwrap_or_default();
        assert!((after - before - 1.0).abs() < f64::EPSILON);

        collector.record_generation(true);
        collector.record_file(FileOutcomeLabel::Partial);
        collector.record_llm_request("gpt-4o-mini", true, 0.4, TokenUsage::new(10, 5));
    }

    #[test]
    fn test_recording_without_init_does_not_panic() {
        MetricsCollector::new().record_generation(false);
    }
}
