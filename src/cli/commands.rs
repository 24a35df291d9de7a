//! CLI command definitions for convo-forge.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tracing::info;

use crate::llm::chat::{DEFAULT_MAX_COMPLETION_TOKENS, DEFAULT_TEMPERATURE};
use crate::llm::{LiteLlmClient, LlmProvider, ModelParams, DEFAULT_MODEL};
use crate::pipeline::{AppConfig, Pipeline};
use crate::records::UploadedFile;
use crate::storage::{
    parse_document_id, Database, DocumentStore, FsObjectStore, ObjectStore,
    DEFAULT_MAX_OBJECT_BYTES,
};

/// Synthetic customer-support and sales conversations from CSV knowledge bases.
#[derive(Parser)]
#[command(name = "convo-forge")]
#[command(about = "Generate synthetic support and sales conversations from CSV files")]
#[command(version)]
#[command(
    long_about = "convo-forge reads text records (or URLs) from CSV files and generates a \
customer-support and a sales-agent conversation for each one.\n\nExample usage:\n  \
convo-forge process faq.csv pricing.csv --column answer --model gpt-4o-mini"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Generate conversations for every record of the given CSV files.
    #[command(alias = "run")]
    Process(ProcessArgs),

    /// Print stored documents by id.
    Show(ShowArgs),

    /// Verify document store and object store access.
    Check,
}

/// Arguments for `convo-forge process`.
#[derive(Parser, Debug)]
pub struct ProcessArgs {
    /// CSV files to process.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Column to read records from; auto-detected when omitted.
    #[arg(short, long)]
    pub column: Option<String>,

    /// Model to generate with.
    #[arg(short, long, default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Sampling temperature (0.0 to 2.0).
    #[arg(short, long, default_value_t = DEFAULT_TEMPERATURE)]
    pub temperature: f64,

    /// Completion token limit per turn.
    #[arg(long, default_value_t = DEFAULT_MAX_COMPLETION_TOKENS)]
    pub max_completion_tokens: u32,

    /// Print Prometheus metrics to stderr when done.
    #[arg(long)]
    pub metrics: bool,
}

/// Arguments for `convo-forge show`.
#[derive(Parser, Debug)]
pub struct ShowArgs {
    /// Document ids.
    #[arg(required = true)]
    pub ids: Vec<String>,
}

/// Parse CLI arguments and return the Cli struct.
///
/// This allows main.rs to access CLI arguments (like log_level) before running commands.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Process(args) => run_process_command(args).await,
        Commands::Show(args) => run_show_command(args).await,
        Commands::Check => run_check_command().await,
    }
}

async fn run_process_command(args: ProcessArgs) -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    let params = ModelParams::new(args.model, args.max_completion_tokens, args.temperature);

    let files = args
        .files
        .iter()
        .map(|path| read_upload(path))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let llm: Arc<dyn LlmProvider> = Arc::new(LiteLlmClient::new(
        config.litellm_api_base.clone(),
        config.litellm_api_key.clone(),
        DEFAULT_MODEL.to_string(),
    ));
    let documents = connect_documents(&config).await?;
    let objects = open_objects(&config);

    let pipeline = Pipeline::new(config, llm, documents, objects);
    let batch = pipeline.batch(params)?;

    let start = std::time::Instant::now();
    let result = batch.run(files, args.column.as_deref()).await;
    info!(
        elapsed_ms = start.elapsed().as_millis() as u64,
        files = result.files.len(),
        errors = result.errors.len(),
        "Processing complete"
    );

    print_json(&result)?;

    if args.metrics {
        eprintln!("{}", crate::metrics::export_metrics());
    }
    Ok(())
}

async fn run_show_command(args: ShowArgs) -> anyhow::Result<()> {
    let ids = args
        .ids
        .iter()
        .map(|raw| parse_document_id(raw))
        .collect::<Result<Vec<_>, _>>()?;

    let config = AppConfig::from_env()?;
    let documents = connect_documents(&config).await?;
    let found = documents.fetch_by_ids(&ids).await?;

    if found.len() < ids.len() {
        info!(requested = ids.len(), found = found.len(), "Some documents were not found");
    }
    print_json(&found)
}

#[derive(Debug, Serialize)]
struct CheckReport {
    document_store: &'static str,
    object_store: &'static str,
}

async fn run_check_command() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;

    let documents = connect_documents(&config).await?;
    documents.ping().await?;
    info!("Document store is reachable and writable");

    let objects = open_objects(&config);
    objects.verify().await?;
    info!(path = %config.object_store_path.display(), "Object store is reachable and writable");

    print_json(&CheckReport {
        document_store: "ok",
        object_store: "ok",
    })
}

async fn connect_documents(config: &AppConfig) -> anyhow::Result<Arc<dyn DocumentStore>> {
    let url = config.require_database_url()?;
    let database = Database::connect(url, config.retry_policy()).await?;
    Ok(Arc::new(database))
}

fn open_objects(config: &AppConfig) -> Arc<dyn ObjectStore> {
    Arc::new(FsObjectStore::new(
        config.object_store_path.clone(),
        DEFAULT_MAX_OBJECT_BYTES,
        config.retry_policy(),
    ))
}

fn read_upload(path: &Path) -> anyhow::Result<UploadedFile> {
    let content =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(UploadedFile::new(file_name, content))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
