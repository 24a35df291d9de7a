//! Orchestration of a batch of uploaded files.

use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};

use crate::error::INTERNAL_ERROR_MESSAGE;
use crate::records::UploadedFile;

use super::context::BatchContext;
use super::file::FileOrchestrator;
use super::models::{BatchResult, FileOutcome};

/// Runs a batch of files against one validated model configuration.
#[derive(Debug, Clone)]
pub struct BatchOrchestrator {
    ctx: Arc<BatchContext>,
}

impl BatchOrchestrator {
    pub fn new(ctx: Arc<BatchContext>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &BatchContext {
        &self.ctx
    }

    /// Processes every file concurrently and merges the outcomes in
    /// completion order.
    ///
    /// A blank `column` is treated as no column. Never fails: every file
    /// contributes either a success or an error entry.
    pub async fn run(&self, files: Vec<UploadedFile>, column: Option<&str>) -> BatchResult {
        let column = column
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);

        tracing::info!(files = files.len(), column = ?column, "Starting batch");

        let mut pending = files
            .into_iter()
            .map(|file| {
                let file_name = file.file_name.clone();
                let orchestrator = FileOrchestrator::new(self.ctx.clone());
                let column = column.clone();
                let handle = tokio::spawn(async move { orchestrator.run(file, column).await });
                async move {
                    match handle.await {
                        Ok(outcome) => outcome,
                        Err(err) => {
                            tracing::error!(file_name = %file_name, error = ?err, "File task aborted");
                            FileOutcome::Failed {
                                file_name,
                                reason: INTERNAL_ERROR_MESSAGE.to_string(),
                            }
                        }
                    }
                }
            })
            .collect::<FuturesUnordered<_>>();

        let mut result = BatchResult::new();
        while let Some(outcome) = pending.next().await {
            result.push(outcome);
        }

        tracing::info!(
            succeeded = result.files.len(),
            errors = result.errors.len(),
            "Batch finished"
        );
        result
    }
}
