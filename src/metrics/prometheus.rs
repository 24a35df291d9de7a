//! Prometheus metrics registration and export.
//!
//! This module defines all Prometheus metrics used by convo-forge and provides
//! functions for initializing, registering, and exporting them.

use prometheus::{CounterVec, Encoder, HistogramVec, Opts, Registry, TextEncoder};
use std::sync::OnceLock;

/// Global Prometheus registry for all convo-forge metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// Generation tasks finished, labeled by outcome (succeeded/failed).
pub static RECORDS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Files processed, labeled by outcome (succeeded/partial/failed).
pub static FILES_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Retry attempts, labeled by operation.
pub static RETRIES_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Total LLM API requests, labeled by model and status.
pub static LLM_REQUESTS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// LLM API request latency in seconds, labeled by model.
pub static LLM_LATENCY: OnceLock<HistogramVec> = OnceLock::new();

/// Total tokens used, labeled by model and type (input/output).
pub static LLM_TOKENS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Initialize all metrics and register them with the registry.
///
/// Call once at startup. Recording before this is a no-op.
///
/// # Errors
///
/// Returns a `prometheus::Error` if metric registration fails, typically due to
/// duplicate metric names or invalid metric configurations.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    let registry = Registry::new();

    let records_total = CounterVec::new(
        Opts::new("convo_forge_records_total", "Generation tasks finished"),
        &["outcome"],
    )?;

    let files_total = CounterVec::new(
        Opts::new("convo_forge_files_total", "Files processed"),
        &["outcome"],
    )?;

    let retries_total = CounterVec::new(
        Opts::new("convo_forge_retries_total", "Retry attempts after transient failures"),
        &["operation"],
    )?;

    let llm_requests_total = CounterVec::new(
        Opts::new("convo_forge_llm_requests_total", "Total LLM API requests"),
        &["model", "status"],
    )?;

    let llm_latency = HistogramVec::new(
        prometheus::HistogramOpts::new(
            "convo_forge_llm_latency_seconds",
            "LLM API request latency in seconds",
        )
        .buckets(vec![0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
        &["model"],
    )?;

    let llm_tokens_total = CounterVec::new(
        Opts::new("convo_forge_llm_tokens_total", "Total tokens used"),
        &["model", "type"],
    )?;

    registry.register(Box::new(records_total.clone()))?;
    registry.register(Box::new(files_total.clone()))?;
    registry.register(Box::new(retries_total.clone()))?;
    registry.register(Box::new(llm_requests_total.clone()))?;
    registry.register(Box::new(llm_latency.clone()))?;
    registry.register(Box::new(llm_tokens_total.clone()))?;

    // Already-set cells mean a previous init won; keep those.
    let _ = REGISTRY.set(registry);
    let _ = RECORDS_TOTAL.set(records_total);
    let _ = FILES_TOTAL.set(files_total);
    let _ = RETRIES_TOTAL.set(retries_total);
    let _ = LLM_REQUESTS_TOTAL.set(llm_requests_total);
    let _ = LLM_LATENCY.set(llm_latency);
    let _ = LLM_TOKENS_TOTAL.set(llm_tokens_total);

    tracing::debug!("Prometheus metrics initialized");

    Ok(())
}

/// Export all registered metrics in Prometheus text format.
pub fn export_metrics() -> String {
    let Some(registry) = REGISTRY.get() else {
        return "# Metrics not initialized. Call init_metrics() first.\n".to_string();
    };

    let encoder = TextEncoder::new();
    let metric_families = registry.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return format!("# Error encoding metrics: {}\n", e);
    }

    String::from_utf8(buffer)
        .unwrap_or_else(|e| format!("# Error converting metrics to UTF-8: {}\n", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_metrics() {
        let result = init_metrics();
        assert!(result.is_ok() || REGISTRY.get().is_some());
    }

    #[test]
    fn test_export_after_init() {
        let _ = init_metrics();
        if let Some(records) = RECORDS_TOTAL.get() {
            records.with_label_values(&["succeeded"]).inc();
        }
        // Another test may have won the init race with a different registry.
        let text = export_metrics();
        assert!(!text.starts_with("# Metrics not initialized"));
    }
}
