//! Filesystem object store for generated output files.
//!
//! The configured root plays the role of a bucket: it must already exist,
//! and objects are written beneath it under slash-separated keys.

use std::io::ErrorKind as IoErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error::{DomainError, ObjectStoreKind};
use crate::retry::{ClassifyingRetrier, ErrorTable, RetryPolicy};

/// Default ceiling for a single object (64 MiB).
pub const DEFAULT_MAX_OBJECT_BYTES: u64 = 64 * 1024 * 1024;

/// Errors that can occur during object storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// IO operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The store root does not exist.
    #[error("Object store root does not exist: {0}")]
    MissingRoot(PathBuf),

    /// Key escapes the root or is otherwise unusable.
    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    /// Object exceeds the configured ceiling.
    #[error("Object of {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: u64, limit: u64 },

    /// Checksum verification failed.
    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },
}

/// Where an uploaded object landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub key: String,
    pub size_bytes: u64,
    pub checksum: String,
}

/// Upload contract for generated output files.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores `data` under `key`, replacing any previous object.
    async fn upload(&self, key: &str, data: Vec<u8>) -> Result<UploadReceipt, DomainError>;

    /// Verifies the store is reachable and writable.
    async fn verify(&self) -> Result<(), DomainError>;
}

/// Key of the output file generated for document `id`.
pub fn object_key(folder: &str, id: Uuid) -> String {
    let folder = folder.trim_matches('/');
    if folder.is_empty() {
        format!("{}.csv", id)
    } else {
        format!("{}/{}.csv", folder, id)
    }
}

fn io_kind_in(err: &StorageError, kinds: &[IoErrorKind]) -> bool {
    match err {
        StorageError::Io(e) => kinds.contains(&e.kind()),
        _ => false,
    }
}

const TRANSIENT_IO: [IoErrorKind; 6] = [
    IoErrorKind::Interrupted,
    IoErrorKind::TimedOut,
    IoErrorKind::ConnectionReset,
    IoErrorKind::ConnectionAborted,
    IoErrorKind::ConnectionRefused,
    IoErrorKind::WouldBlock,
];

fn is_transient(err: &StorageError) -> bool {
    io_kind_in(err, &TRANSIENT_IO)
}

/// Classification of object-store failures.
pub fn storage_error_table() -> ErrorTable<StorageError> {
    ErrorTable::new("object_store", |_| {
        DomainError::object_store(
            ObjectStoreKind::Client,
            "There was an issue with the object store client.",
        )
    })
    .on(is_transient, |_| {
        DomainError::object_store(
            ObjectStoreKind::Connection,
            "There was a connection issue while connecting to the object store.",
        )
    })
    .on(
        |e| io_kind_in(e, &[IoErrorKind::PermissionDenied]),
        |_| {
            DomainError::object_store(
                ObjectStoreKind::AccessDenied,
                "Access denied to the object store, check the credentials.",
            )
        },
    )
    .on(
        |e| matches!(e, StorageError::MissingRoot(_)),
        |_| {
            DomainError::object_store(
                ObjectStoreKind::NoSuchBucket,
                "Specified bucket does not exist in the object store.",
            )
        },
    )
    .on(
        |e| io_kind_in(e, &[IoErrorKind::NotFound]),
        |_| {
            DomainError::object_store(
                ObjectStoreKind::NoSuchKey,
                "Specified key does not exist in the object store.",
            )
        },
    )
    .on(
        |e| matches!(e, StorageError::TooLarge { .. }),
        |_| {
            DomainError::object_store(
                ObjectStoreKind::EntityTooLarge,
                "Generated file is too large for the object store.",
            )
        },
    )
    .on(
        |e| matches!(e, StorageError::InvalidKey(_)),
        |_| {
            DomainError::object_store(
                ObjectStoreKind::InvalidKey,
                "Invalid key provided for the object store.",
            )
        },
    )
}

fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Object store rooted at a local directory.
pub struct FsObjectStore {
    base_path: PathBuf,
    max_object_bytes: u64,
    retrier: ClassifyingRetrier<StorageError>,
}

impl FsObjectStore {
    pub fn new(base_path: impl Into<PathBuf>, max_object_bytes: u64, policy: RetryPolicy) -> Self {
        Self {
            base_path: base_path.into(),
            max_object_bytes,
            retrier: ClassifyingRetrier::new(storage_error_table(), policy).retry_on(is_transient),
        }
    }

    /// Returns the base storage path.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Resolves `key` beneath the root, rejecting anything that would escape it.
    fn object_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let is_plain = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !is_plain {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.base_path.join(relative))
    }

    async fn ensure_root(&self) -> Result<(), StorageError> {
        match fs::metadata(&self.base_path).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(StorageError::MissingRoot(self.base_path.clone())),
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                Err(StorageError::MissingRoot(self.base_path.clone()))
            }
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn write_object(&self, key: &str, data: &[u8]) -> Result<UploadReceipt, StorageError> {
        let size = data.len() as u64;
        if size > self.max_object_bytes {
            return Err(StorageError::TooLarge {
                size,
                limit: self.max_object_bytes,
            });
        }

        self.ensure_root().await?;
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Write beside the target then rename, so readers never see a partial object.
        let staging = path.with_extension("part");
        if let Err(err) = stage_and_rename(&staging, &path, data).await {
            if let Err(cleanup) = fs::remove_file(&staging).await {
                if cleanup.kind() != IoErrorKind::NotFound {
                    tracing::warn!(path = %staging.display(), error = %cleanup, "Failed to remove staged object");
                }
            }
            return Err(err);
        }

        Ok(UploadReceipt {
            key: key.to_string(),
            size_bytes: size,
            checksum: compute_checksum(data),
        })
    }

    async fn probe(&self) -> Result<(), StorageError> {
        let key = format!(".probe/{}", Uuid::new_v4());
        let payload = b"convo-forge write probe";

        let receipt = self.write_object(&key, payload).await?;
        let path = self.object_path(&key)?;
        let stored = fs::read(&path).await?;
        fs::remove_file(&path).await?;

        let actual = compute_checksum(&stored);
        if actual != receipt.checksum {
            return Err(StorageError::ChecksumMismatch {
                expected: receipt.checksum,
                actual,
            });
        }
        Ok(())
    }
}

async fn stage_and_rename(staging: &Path, path: &Path, data: &[u8]) -> Result<(), StorageError> {
    let mut file = fs::File::create(staging).await?;
    file.write_all(data).await?;
    file.sync_all().await?;
    drop(file);
    fs::rename(staging, path).await?;
    Ok(())
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn upload(&self, key: &str, data: Vec<u8>) -> Result<UploadReceipt, DomainError> {
        let receipt = self
            .retrier
            .run("upload_object", || self.write_object(key, &data))
            .await?;
        tracing::debug!(
            key = %receipt.key,
            size_bytes = receipt.size_bytes,
            checksum = %receipt.checksum,
            "Uploaded object"
        );
        Ok(receipt)
    }

    async fn verify(&self) -> Result<(), DomainError> {
        self.retrier.run("verify_object_store", || self.probe()).await
    }
}

impl std::fmt::Debug for FsObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsObjectStore")
            .field("base_path", &self.base_path)
            .field("max_object_bytes", &self.max_object_bytes)
            .finish()
    }
}
