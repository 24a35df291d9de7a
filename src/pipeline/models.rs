//! Data model of the generation pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reason stored on a file whose every record failed.
pub const ALL_GENERATIONS_FAILED: &str = "all generation statuses failed";

/// One extracted, trimmed, non-empty value and the column it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub text: String,
    pub column: String,
}

impl SourceRecord {
    pub fn new(text: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            column: column.into(),
        }
    }
}

/// The two transcripts generated for a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedData {
    pub customer_support: String,
    pub sales_agent: String,
}

/// Terminal outcome of one record's generation task.
///
/// Built only through [`GenerationStatus::succeeded`] or
/// [`GenerationStatus::failed`]: a success always carries data and no reason,
/// a failure always carries a reason and no data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationStatus {
    id: Uuid,
    succeeded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<GeneratedData>,
}

impl GenerationStatus {
    pub fn succeeded(source: impl Into<String>, data: GeneratedData) -> Self {
        Self {
            id: Uuid::new_v4(),
            succeeded: true,
            reason: None,
            source: source.into(),
            data: Some(data),
        }
    }

    pub fn failed(source: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            succeeded: false,
            reason: Some(reason.into()),
            source: source.into(),
            data: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_succeeded(&self) -> bool {
        self.succeeded
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn data(&self) -> Option<&GeneratedData> {
        self.data.as_ref()
    }
}

/// Per-record entry of a generation-errors report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordError {
    pub id: Uuid,
    pub reason: String,
}

/// The persisted result of processing one uploaded file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileDocument {
    pub id: Uuid,
    pub file_name: String,
    pub succeeded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub statuses: Vec<GenerationStatus>,
    pub created_at: DateTime<Utc>,
}

impl FileDocument {
    /// Folds completed record statuses into a file verdict.
    ///
    /// The file succeeds when at least one status succeeded. Otherwise it
    /// fails with [`ALL_GENERATIONS_FAILED`], whatever the individual reasons.
    pub fn from_statuses(
        file_name: impl Into<String>,
        column_name: Option<String>,
        statuses: Vec<GenerationStatus>,
    ) -> Self {
        let succeeded = statuses.iter().any(GenerationStatus::is_succeeded);
        Self {
            id: Uuid::new_v4(),
            file_name: file_name.into(),
            succeeded,
            column_name,
            reason: (!succeeded).then(|| ALL_GENERATIONS_FAILED.to_string()),
            statuses,
            created_at: Utc::now(),
        }
    }

    /// Rebuilds a document loaded from storage.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: Uuid,
        file_name: String,
        succeeded: bool,
        column_name: Option<String>,
        reason: Option<String>,
        statuses: Vec<GenerationStatus>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            file_name,
            succeeded,
            column_name,
            reason,
            statuses,
            created_at,
        }
    }

    /// Identity and reason of every failed record, in completion order.
    pub fn failed_records(&self) -> Vec<RecordError> {
        self.statuses
            .iter()
            .filter(|s| !s.is_succeeded())
            .map(|s| RecordError {
                id: s.id(),
                reason: s.reason().unwrap_or_default().to_string(),
            })
            .collect()
    }

    pub fn summary(&self) -> FileSummary {
        FileSummary {
            id: self.id,
            file_name: self.file_name.clone(),
        }
    }
}

/// A successfully persisted file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSummary {
    pub id: Uuid,
    pub file_name: String,
}

/// An error entry of the batch envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BatchError {
    /// The file failed as a whole.
    File { file_name: String, reason: String },
    /// The file succeeded but some of its records did not.
    Generation {
        file_name: String,
        errs: Vec<RecordError>,
    },
}

/// What a file orchestration contributes to the batch.
#[derive(Debug, Clone, PartialEq)]
pub enum FileOutcome {
    Failed {
        file_name: String,
        reason: String,
    },
    Persisted {
        summary: FileSummary,
        record_errors: Vec<RecordError>,
    },
}

/// Merged result of a batch, in file completion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    pub files: Vec<FileSummary>,
    pub errors: Vec<BatchError>,
}

impl BatchResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one file's outcome.
    pub fn push(&mut self, outcome: FileOutcome) {
        match outcome {
            FileOutcome::Failed { file_name, reason } => {
                self.errors.push(BatchError::File { file_name, reason });
            }
            FileOutcome::Persisted {
                summary,
                record_errors,
            } => {
                if !record_errors.is_empty() {
                    self.errors.push(BatchError::Generation {
                        file_name: summary.file_name.clone(),
                        errs: record_errors,
                    });
                }
                self.files.push(summary);
            }
        }
    }

    pub fn file_errors(&self) -> impl Iterator<Item = (&str, &str)> {
        self.errors.iter().filter_map(|e| match e {
            BatchError::File { file_name, reason } => Some((file_name.as_str(), reason.as_str())),
            BatchError::Generation { .. } => None,
        })
    }

    pub fn generation_errors(&self) -> impl Iterator<Item = (&str, &[RecordError])> {
        self.errors.iter().filter_map(|e| match e {
            BatchError::Generation { file_name, errs } => Some((file_name.as_str(), errs.as_slice())),
            BatchError::File { .. } => None,
        })
    }
}
