//! The per-record generation task.

use std::future::Future;
use std::sync::Arc;

use crate::error::{DomainError, INTERNAL_ERROR_MESSAGE};
use crate::fetch::resolve_source;
use crate::llm::InteractionKind;
use crate::metrics::MetricsCollector;

use super::context::BatchContext;
use super::models::{GeneratedData, GenerationStatus, SourceRecord};

const TOO_SHORT: &str = "Source data is too short to generate interactions.";

/// Turns one record into a terminal [`GenerationStatus`].
///
/// Never fails: every error is folded into the returned status.
pub async fn run_generation_task(ctx: &BatchContext, record: SourceRecord) -> GenerationStatus {
    let status = match generate(ctx, &record.text).await {
        Ok(data) => GenerationStatus::succeeded(record.text, data),
        Err(err) => {
            tracing::warn!(column = %record.column, reason = %err, "Record generation failed");
            GenerationStatus::failed(record.text, err.into_message())
        }
    };
    MetricsCollector::new().record_generation(status.is_succeeded());
    status
}

/// Spawns the task onto the runtime and resolves to its status.
///
/// The task waits for a permit from the batch limiter before doing any work.
/// A panicking task still resolves, to a failed status carrying the generic
/// internal-error message.
pub fn dispatch(
    ctx: Arc<BatchContext>,
    record: SourceRecord,
) -> impl Future<Output = GenerationStatus> + Send + 'static {
    let source = record.text.clone();
    let handle = tokio::spawn(async move {
        let _permit = match ctx.concurrency_limiter.acquire().await {
            Ok(permit) => permit,
            Err(err) => {
                tracing::error!(error = %err, "Failed to acquire task permit");
                MetricsCollector::new().record_generation(false);
                return GenerationStatus::failed(record.text, INTERNAL_ERROR_MESSAGE);
            }
        };
        run_generation_task(&ctx, record).await
    });

    async move {
        match handle.await {
            Ok(status) => status,
            Err(err) => {
                tracing::error!(error = ?err, "Generation task aborted");
                MetricsCollector::new().record_generation(false);
                GenerationStatus::failed(source, INTERNAL_ERROR_MESSAGE)
            }
        }
    }
}

async fn generate(ctx: &BatchContext, text: &str) -> Result<GeneratedData, DomainError> {
    let content = match resolve_source(text) {
        Some(url) => ctx.fetcher.fetch(&url).await?,
        None => text.to_string(),
    };

    if content.trim().chars().count() < ctx.min_source_length {
        return Err(DomainError::too_short(TOO_SHORT));
    }

    let customer_support = ctx
        .generator
        .generate(&content, InteractionKind::CustomerSupport)
        .await?;
    let sales_agent = ctx
        .generator
        .generate(&content, InteractionKind::SalesAgent)
        .await?;

    Ok(GeneratedData {
        customer_support,
        sales_agent,
    })
}
