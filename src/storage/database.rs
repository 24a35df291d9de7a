//! PostgreSQL document store.
//!
//! Each processed file is stored as one `synthetic_documents` row, with the
//! per-record generation statuses kept as JSONB.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use thiserror::Error;
use uuid::Uuid;

use crate::error::{DocumentStoreKind, DomainError};
use crate::pipeline::{FileDocument, GenerationStatus};
use crate::retry::{ClassifyingRetrier, ErrorMapper, ErrorMatcher, ErrorTable, RetryPolicy};

use super::migrations::MigrationRunner;
use super::schema;

/// Errors that can occur during database operations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// The connection string is not a PostgreSQL URL.
    #[error("Invalid database url: {0}")]
    InvalidUrl(String),

    /// Driver, pool or query failure.
    #[error("Query failed: {0}")]
    QueryFailed(#[from] sqlx::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Migration error.
    #[error("Migration error: {0}")]
    Migration(#[from] super::migrations::MigrationError),
}

/// Persistence contract for file documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Persists a finalized document.
    async fn insert(&self, document: &FileDocument) -> Result<(), DomainError>;

    /// Loads the documents with the given ids; unknown ids are skipped.
    async fn fetch_by_ids(&self, ids: &[Uuid]) -> Result<Vec<FileDocument>, DomainError>;

    /// Verifies connectivity and write permission.
    async fn ping(&self) -> Result<(), DomainError>;
}

fn sqlx_error(err: &DatabaseError) -> Option<&sqlx::Error> {
    match err {
        DatabaseError::QueryFailed(inner) => Some(inner),
        _ => None,
    }
}

fn db_code_in(err: &DatabaseError, codes: &[&str]) -> bool {
    match sqlx_error(err) {
        Some(sqlx::Error::Database(db)) => db
            .code()
            .is_some_and(|code| codes.iter().any(|expected| code == *expected)),
        _ => false,
    }
}

fn is_connection_error(err: &DatabaseError) -> bool {
    sqlx_error(err).is_some_and(|e| {
        matches!(
            e,
            sqlx::Error::PoolTimedOut
                | sqlx::Error::Io(_)
                | sqlx::Error::Tls(_)
                | sqlx::Error::WorkerCrashed
        )
    })
}

fn is_transient(err: &DatabaseError) -> bool {
    sqlx_error(err).is_some_and(|e| {
        matches!(
            e,
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) | sqlx::Error::WorkerCrashed
        )
    })
}

/// Classification of document-store failures, most specific first.
pub fn database_error_table() -> ErrorTable<DatabaseError> {
    ErrorTable::new("document_store", |_| {
        DomainError::document_store(
            DocumentStoreKind::Other,
            "Some issue occurred with the document store.",
        )
    })
    .on(
        |e| matches!(e, DatabaseError::InvalidUrl(_)),
        |_| {
            DomainError::document_store(
                DocumentStoreKind::Config,
                "Provided database url was incorrect, recheck please.",
            )
        },
    )
    .on(
        |e| matches!(sqlx_error(e), Some(sqlx::Error::Configuration(_))),
        |_| {
            DomainError::document_store(
                DocumentStoreKind::Config,
                "Config issues with the provided database url, make sure that it's correct.",
            )
        },
    )
    .on(is_connection_error, |_| {
        DomainError::document_store(
            DocumentStoreKind::ConnectionFailure,
            "Connection failure with the document store.",
        )
    })
    .on(
        |e| db_code_in(e, &["28P01", "28000"]),
        |_| {
            DomainError::document_store(
                DocumentStoreKind::AuthFailure,
                "Bad auth with the document store, please recheck the entered url.",
            )
        },
    )
    .on(
        |e| db_code_in(e, &["42501"]),
        |_| {
            DomainError::document_store(
                DocumentStoreKind::AuthFailure,
                "Document store credentials don't have permission for this operation.",
            )
        },
    )
    .on(
        |e| matches!(sqlx_error(e), Some(sqlx::Error::Database(_))),
        |_| {
            DomainError::document_store(
                DocumentStoreKind::OperationFailed,
                "Operation failed with the document store.",
            )
        },
    )
    .on(
        |e| {
            matches!(e, DatabaseError::Serialization(_))
                || matches!(
                    sqlx_error(e),
                    Some(
                        sqlx::Error::Decode(_)
                            | sqlx::Error::ColumnDecode { .. }
                            | sqlx::Error::ColumnNotFound(_)
                            | sqlx::Error::TypeNotFound { .. }
                    )
                )
        },
        |_| {
            DomainError::document_store(
                DocumentStoreKind::Serialization,
                "Data serialization failed at the document store.",
            )
        },
    )
    .on(
        |e| matches!(e, DatabaseError::Migration(_)),
        |_| {
            DomainError::document_store(
                DocumentStoreKind::OperationFailed,
                "Document store schema migration failed.",
            )
        },
    )
    .on(
        |e| matches!(sqlx_error(e), Some(sqlx::Error::PoolClosed)),
        |_| {
            DomainError::document_store(
                DocumentStoreKind::NotInitialized,
                "Document store connection not ready.",
            )
        },
    )
}

// Only meaningful while connecting: the url names a database that does not exist.
fn is_unknown_database(err: &DatabaseError) -> bool {
    db_code_in(err, &["3D000"])
}

fn unknown_database(_: &DatabaseError) -> DomainError {
    DomainError::document_store(
        DocumentStoreKind::Config,
        "Database named in the provided url does not exist.",
    )
}

/// Parses a document id given by a caller.
pub fn parse_document_id(raw: &str) -> Result<Uuid, DomainError> {
    Uuid::parse_str(raw.trim()).map_err(|_| DomainError::validation("Invalid Id Passed."))
}

fn validate_url(database_url: &str) -> Result<(), DatabaseError> {
    let url = database_url.trim();
    if url.starts_with("postgres://") || url.starts_with("postgresql://") {
        Ok(())
    } else {
        Err(DatabaseError::InvalidUrl(
            "expected a postgres:// or postgresql:// url".to_string(),
        ))
    }
}

/// PostgreSQL database client.
pub struct Database {
    pool: PgPool,
    retrier: ClassifyingRetrier<DatabaseError>,
}

impl Database {
    /// Connects, checks the server answers, and applies pending migrations.
    pub async fn connect(database_url: &str, policy: RetryPolicy) -> Result<Self, DomainError> {
        let retrier = ClassifyingRetrier::new(database_error_table(), policy).retry_on(is_transient);
        let connect_rows: [(ErrorMatcher<DatabaseError>, ErrorMapper<DatabaseError>); 1] =
            [(is_unknown_database, unknown_database)];
        let connector =
            ClassifyingRetrier::new(database_error_table().overriding(&connect_rows), policy)
                .retry_on(is_transient);

        let pool = connector
            .run("connect_document_store", || async {
                validate_url(database_url)?;
                let pool = PgPoolOptions::new()
                    .max_connections(10)
                    .min_connections(1)
                    .acquire_timeout(std::time::Duration::from_secs(30))
                    .connect(database_url.trim())
                    .await?;
                Ok::<_, DatabaseError>(pool)
            })
            .await?;

        let database = Self::from_pool(pool, retrier);
        database
            .retrier
            .run("migrate_document_store", || database.run_migrations())
            .await?;
        Ok(database)
    }

    /// Creates a new database client from an existing pool.
    pub fn from_pool(pool: PgPool, retrier: ClassifyingRetrier<DatabaseError>) -> Self {
        Self { pool, retrier }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs database migrations.
    pub async fn run_migrations(&self) -> Result<(), DatabaseError> {
        let runner = MigrationRunner::new(self.pool.clone());
        runner.run_migrations().await?;
        Ok(())
    }

    async fn insert_document(&self, document: &FileDocument) -> Result<(), DatabaseError> {
        let statuses = serde_json::to_value(&document.statuses)?;

        sqlx::query(schema::INSERT_DOCUMENT)
            .bind(document.id)
            .bind(&document.file_name)
            .bind(document.succeeded)
            .bind(&document.column_name)
            .bind(&document.reason)
            .bind(&statuses)
            .bind(document.created_at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn fetch_documents(&self, ids: &[Uuid]) -> Result<Vec<FileDocument>, DatabaseError> {
        let rows = sqlx::query(schema::SELECT_DOCUMENTS_BY_IDS)
            .bind(ids.to_vec())
            .fetch_all(&self.pool)
            .await?;

        let mut documents = Vec::with_capacity(rows.len());
        for row in rows {
            let statuses_json: serde_json::Value = row.try_get("statuses")?;
            let statuses: Vec<GenerationStatus> = serde_json::from_value(statuses_json)?;
            let created_at: DateTime<Utc> = row.try_get("created_at")?;

            documents.push(FileDocument::restore(
                row.try_get("id")?,
                row.try_get("file_name")?,
                row.try_get("succeeded")?,
                row.try_get("column_name")?,
                row.try_get("reason")?,
                statuses,
                created_at,
            ));
        }

        Ok(documents)
    }

    async fn write_probe(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;

        let mut tx = self.pool.begin().await?;
        sqlx::query(schema::CREATE_WRITE_PROBE).execute(&mut *tx).await?;
        sqlx::query(schema::INSERT_WRITE_PROBE).execute(&mut *tx).await?;
        sqlx::query(schema::DROP_WRITE_PROBE).execute(&mut *tx).await?;
        tx.commit().await?;

        Ok(())
    }
}

#[async_trait]
impl DocumentStore for Database {
    async fn insert(&self, document: &FileDocument) -> Result<(), DomainError> {
        self.retrier
            .run("insert_document", || self.insert_document(document))
            .await?;
        tracing::debug!(id = %document.id, file_name = %document.file_name, "Stored document");
        Ok(())
    }

    async fn fetch_by_ids(&self, ids: &[Uuid]) -> Result<Vec<FileDocument>, DomainError> {
        self.retrier
            .run("fetch_documents", || self.fetch_documents(ids))
            .await
    }

    async fn ping(&self) -> Result<(), DomainError> {
        self.retrier.run("ping_document_store", || self.write_probe()).await
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("pool_size", &self.pool.size())
            .field("retrier", &self.retrier)
            .finish()
    }
}
