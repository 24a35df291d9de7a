//! Error types for convo-forge operations.
//!
//! Two layers live here:
//! - Native error surfaces of collaborators (`LlmError` for the generation
//!   service; fetch, storage and configuration errors live beside their code).
//! - The classified [`DomainError`], the only error kind that crosses the
//!   retry boundary. Its [`ErrorKind`] is a closed two-level taxonomy: one
//!   family per external dependency plus a few cross-cutting kinds.

use std::fmt;

use thiserror::Error;

/// Message used whenever an unclassified failure reaches a task boundary.
pub const INTERNAL_ERROR_MESSAGE: &str = "Some internal error occurred.";

/// Leaf kinds for the URL fetch collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchKind {
    InvalidUrl,
    Timeout,
    Network,
    ProtocolViolation,
    Decoding,
    BadStatus,
    ContentNotFound,
    ContentTooLarge,
    Other,
}

/// Leaf kinds for the text-generation service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenerationKind {
    ConnectionFailure,
    Timeout,
    BadRequest,
    InternalServerError,
    RateLimited,
    AuthFailure,
    PermissionDenied,
    NotFound,
    Conflict,
    UnprocessableEntity,
    GenericApiStatus,
    ResponseRefused,
    ResponseIncomplete,
    Other,
}

/// Leaf kinds for the document store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentStoreKind {
    Config,
    ConnectionFailure,
    AuthFailure,
    OperationFailed,
    Serialization,
    NotInitialized,
    Other,
}

/// Leaf kinds for the object store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectStoreKind {
    Connection,
    AccessDenied,
    NoSuchBucket,
    NoSuchKey,
    EntityTooLarge,
    InvalidKey,
    Client,
}

/// Classified error kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Fetch(FetchKind),
    Generation(GenerationKind),
    DocumentStore(DocumentStoreKind),
    ObjectStore(ObjectStoreKind),
    Configuration,
    /// Malformed, mis-named or ambiguous input file.
    InvalidInput,
    /// Input file produced no usable records.
    EmptyInput,
    /// Source text below the minimum length.
    TooShort,
    /// Data failed a model or parameter check.
    Validation,
}

impl ErrorKind {
    /// Stable family label, used for logs and metric labels.
    pub fn family(&self) -> &'static str {
        match self {
            ErrorKind::Fetch(_) => "fetch",
            ErrorKind::Generation(_) => "generation",
            ErrorKind::DocumentStore(_) => "document_store",
            ErrorKind::ObjectStore(_) => "object_store",
            ErrorKind::Configuration => "configuration",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::EmptyInput => "empty_input",
            ErrorKind::TooShort => "too_short",
            ErrorKind::Validation => "validation",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Fetch(leaf) => write!(f, "fetch::{:?}", leaf),
            ErrorKind::Generation(leaf) => write!(f, "generation::{:?}", leaf),
            ErrorKind::DocumentStore(leaf) => write!(f, "document_store::{:?}", leaf),
            ErrorKind::ObjectStore(leaf) => write!(f, "object_store::{:?}", leaf),
            other => f.write_str(other.family()),
        }
    }
}

/// A classified failure: a kind tag plus a compact, caller-safe message.
///
/// Displaying a `DomainError` yields only the message, which is what ends up
/// in `GenerationStatus::reason` or a file-level error entry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct DomainError {
    kind: ErrorKind,
    message: String,
}

impl DomainError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn fetch(kind: FetchKind, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Fetch(kind), message)
    }

    pub fn generation(kind: GenerationKind, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Generation(kind), message)
    }

    pub fn document_store(kind: DocumentStoreKind, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DocumentStore(kind), message)
    }

    pub fn object_store(kind: ObjectStoreKind, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ObjectStore(kind), message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
    }

    pub fn empty_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::EmptyInput, message)
    }

    pub fn too_short(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TooShort, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn into_message(self) -> String {
        self.message
    }
}

/// Errors that can occur during LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Missing API base URL: LITELLM_API_BASE environment variable not set")]
    MissingApiBase,

    #[error("Connection to the generation service failed: {0}")]
    Connection(String),

    #[error("Generation request timed out: {0}")]
    Timeout(String),

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse LLM response: {0}")]
    ParseError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },

    #[error("Response ended with finish reason '{finish_reason}'")]
    Incomplete { finish_reason: String },

    #[error("Model refused: {0}")]
    Refused(String),

    #[error("Response contained no choices")]
    EmptyResponse,
}

impl LlmError {
    /// HTTP status carried by the error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            LlmError::ApiError { code, .. } => Some(*code),
            LlmError::RateLimited(_) => Some(429),
            _ => None,
        }
    }
}
