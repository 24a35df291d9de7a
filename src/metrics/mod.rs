//! Metrics module for Prometheus-based monitoring.
//!
//! Counts generation tasks, files, retries and LLM usage.
//!
//! # Example
//!
//! ```ignore
//! use convo_forge::metrics::{init_metrics, export_metrics, MetricsCollector};
//!
//! init_metrics().expect("Failed to initialize metrics");
//! MetricsCollector::new().record_retry("fetch_url");
//! let metrics_text = export_metrics();
//! ```

pub mod collectors;
pub mod prometheus;

pub use collectors::{FileOutcomeLabel, MetricsCollector, TokenUsage};
pub use prometheus::{export_metrics, init_metrics};

pub use prometheus::{
    FILES_TOTAL, LLM_LATENCY, LLM_REQUESTS_TOTAL, LLM_TOKENS_TOTAL, RECORDS_TOTAL, REGISTRY,
    RETRIES_TOTAL,
};
