//! Read-only context shared by every unit of a batch.

use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::error::DomainError;
use crate::fetch::Fetcher;
use crate::llm::{ChatModel, InteractionGenerator, LlmProvider, ModelParams};
use crate::storage::{DocumentStore, ObjectStore};

use super::batch::BatchOrchestrator;
use super::config::AppConfig;

/// Process-wide collaborators, established once at startup.
#[derive(Clone)]
pub struct Pipeline {
    config: AppConfig,
    llm: Arc<dyn LlmProvider>,
    documents: Arc<dyn DocumentStore>,
    objects: Arc<dyn ObjectStore>,
    fetcher: Fetcher,
}

impl Pipeline {
    pub fn new(
        config: AppConfig,
        llm: Arc<dyn LlmProvider>,
        documents: Arc<dyn DocumentStore>,
        objects: Arc<dyn ObjectStore>,
    ) -> Self {
        let fetcher = Fetcher::new(
            config.max_fetch_bytes,
            config.fetch_timeout,
            config.retry_policy(),
        );
        Self {
            config,
            llm,
            documents,
            objects,
            fetcher,
        }
    }

    /// Replaces the fetcher built from the configuration.
    pub fn with_fetcher(mut self, fetcher: Fetcher) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn documents(&self) -> &Arc<dyn DocumentStore> {
        &self.documents
    }

    pub fn objects(&self) -> &Arc<dyn ObjectStore> {
        &self.objects
    }

    /// Prepares a batch bound to `params`.
    ///
    /// Parameters are validated here, before any file is touched.
    pub fn batch(&self, params: ModelParams) -> Result<BatchOrchestrator, DomainError> {
        let params = params.validate()?;
        let model = ChatModel::new(self.llm.clone(), params, self.config.retry_policy());

        let ctx = BatchContext {
            generator: InteractionGenerator::new(model, self.config.max_interactions),
            fetcher: self.fetcher.clone(),
            concurrency_limiter: Arc::new(Semaphore::new(self.config.max_concurrent_tasks)),
            min_source_length: self.config.min_source_length,
            documents: self.documents.clone(),
            objects: self.objects.clone(),
            upload_folder: self.config.upload_folder.clone(),
        };
        Ok(BatchOrchestrator::new(Arc::new(ctx)))
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("fetcher", &self.fetcher)
            .finish()
    }
}

/// Everything a file or record task reads; never mutated after fan-out.
pub struct BatchContext {
    pub generator: InteractionGenerator,
    pub fetcher: Fetcher,
    /// Bounds record tasks in flight across every file of the batch.
    pub concurrency_limiter: Arc<Semaphore>,
    pub min_source_length: usize,
    pub documents: Arc<dyn DocumentStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub upload_folder: String,
}

impl std::fmt::Debug for BatchContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchContext")
            .field("model", &self.generator.model().params().model)
            .field(
                "available_permits",
                &self.concurrency_limiter.available_permits(),
            )
            .field("min_source_length", &self.min_source_length)
            .field("upload_folder", &self.upload_folder)
            .finish()
    }
}
