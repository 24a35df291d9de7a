//! convo-forge: synthetic customer-support and sales conversations from CSV
//! knowledge bases.
//!
//! Each uploaded CSV file is split into records, every record seeds two
//! multi-turn generations, and per-record and per-file outcomes are folded into
//! a persisted document, tolerating partial failure at every level.

pub mod cli;
pub mod error;
pub mod fetch;
pub mod llm;
pub mod metrics;
pub mod pipeline;
pub mod records;
pub mod retry;
pub mod storage;

pub use error::{DomainError, ErrorKind, LlmError, INTERNAL_ERROR_MESSAGE};
