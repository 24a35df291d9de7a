//! Orchestration of one uploaded file.

use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};

use crate::error::DomainError;
use crate::metrics::{FileOutcomeLabel, MetricsCollector};
use crate::records::{CsvFile, CsvOutFile, UploadedFile};
use crate::storage::object_key;

use super::context::BatchContext;
use super::models::{FileDocument, FileOutcome, GenerationStatus, SourceRecord};
use super::task;

/// Runs every record of a file and persists the result.
#[derive(Debug, Clone)]
pub struct FileOrchestrator {
    ctx: Arc<BatchContext>,
}

impl FileOrchestrator {
    pub fn new(ctx: Arc<BatchContext>) -> Self {
        Self { ctx }
    }

    /// Processes `file` into a batch outcome. Never fails.
    pub async fn run(&self, file: UploadedFile, column: Option<String>) -> FileOutcome {
        let file_name = file.file_name.clone();
        tracing::info!(file_name = %file_name, "Processing file");

        let (outcome, label) = match self.process(file, column).await {
            Ok(processed) => processed,
            Err(err) => {
                tracing::warn!(file_name = %file_name, reason = %err, "File failed");
                (
                    FileOutcome::Failed {
                        file_name,
                        reason: err.into_message(),
                    },
                    FileOutcomeLabel::Failed,
                )
            }
        };

        MetricsCollector::new().record_file(label);
        outcome
    }

    async fn process(
        &self,
        file: UploadedFile,
        column: Option<String>,
    ) -> Result<(FileOutcome, FileOutcomeLabel), DomainError> {
        let file_name = file.file_name.clone();
        let (records, column_name) = extract(file, column)?;
        tracing::debug!(file_name = %file_name, records = records.len(), "Extracted records");

        let statuses: Vec<GenerationStatus> = records
            .into_iter()
            .map(|record| task::dispatch(self.ctx.clone(), record))
            .collect::<FuturesUnordered<_>>()
            .collect()
            .await;

        let mut output = CsvOutFile::new()?;
        for data in statuses.iter().filter_map(GenerationStatus::data) {
            output.write(data)?;
        }

        let document = FileDocument::from_statuses(file_name.clone(), column_name, statuses);
        if !document.succeeded {
            tracing::warn!(file_name = %file_name, "Every record failed");
            return Ok((
                FileOutcome::Failed {
                    file_name,
                    reason: document.reason.unwrap_or_default(),
                },
                FileOutcomeLabel::Failed,
            ));
        }

        let record_errors = document.failed_records();
        let label = if record_errors.is_empty() {
            FileOutcomeLabel::Succeeded
        } else {
            FileOutcomeLabel::Partial
        };

        self.ctx.documents.insert(&document).await?;

        let key = object_key(&self.ctx.upload_folder, document.id);
        let rows = output.rows();
        self.ctx.objects.upload(&key, output.finish()?).await?;

        tracing::info!(
            file_name = %file_name,
            id = %document.id,
            rows = rows,
            failed_records = record_errors.len(),
            key = %key,
            "File persisted"
        );

        Ok((
            FileOutcome::Persisted {
                summary: document.summary(),
                record_errors,
            },
            label,
        ))
    }
}

/// Drains the file's records before any generation starts.
fn extract(
    file: UploadedFile,
    column: Option<String>,
) -> Result<(Vec<SourceRecord>, Option<String>), DomainError> {
    let mut csv = CsvFile::open(file, column)?;
    let mut records = csv.records()?;
    let values = records.by_ref().collect::<Result<Vec<_>, _>>()?;
    let column_name = records.column().map(str::to_string);
    Ok((values, column_name))
}
