//! Concurrent generation pipeline.
//!
//! # Architecture
//!
//! - **Pipeline**: process-wide collaborators, set up once
//! - **BatchOrchestrator**: runs every uploaded file concurrently and merges
//!   the outcomes into a [`BatchResult`]
//! - **FileOrchestrator**: extracts a file's records, runs one generation task
//!   per record concurrently, decides the file verdict and persists it
//! - **Generation task**: resolves a record (fetching it when it is a URL),
//!   checks its length and generates both transcripts
//!
//! Failures flow upward as data. A record's failure never aborts its file and
//! a file's failure never aborts the batch.
//!
//! # Example
//!
//! ```rust,ignore
//! use convo_forge::pipeline::{AppConfig, Pipeline};
//! use convo_forge::llm::ModelParams;
//! use convo_forge::records::UploadedFile;
//!
//! let pipeline = Pipeline::new(AppConfig::from_env()?, llm, documents, objects);
//! let batch = pipeline.batch(ModelParams::default())?;
//! let result = batch
//!     .run(vec![UploadedFile::new("faq.csv", bytes)], Some("answer"))
//!     .await;
//! println!("{}", serde_json::to_string_pretty(&result)?);
//! ```

pub mod batch;
pub mod config;
pub mod context;
pub mod file;
pub mod models;
pub mod task;

pub use batch::BatchOrchestrator;
pub use config::{AppConfig, ConfigError, DEFAULT_MAX_CONCURRENT_TASKS};
pub use context::{BatchContext, Pipeline};
pub use file::FileOrchestrator;
pub use models::{
    BatchError, BatchResult, FileDocument, FileOutcome, FileSummary, GeneratedData,
    GenerationStatus, RecordError, SourceRecord, ALL_GENERATIONS_FAILED,
};
pub use task::run_generation_task;
