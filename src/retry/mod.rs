//! Retry-then-classify wrapper applied around every collaborator call.
//!
//! Two independent pieces compose here:
//! - [`ErrorTable`] is an ordered, most-specific-first list of
//!   `(matcher, mapper)` pairs that turns a native error into a
//!   [`DomainError`](crate::error::DomainError). The last resort is a fallback
//!   mapper, so nothing escapes unclassified.
//! - [`ClassifyingRetrier`] runs an operation, retries it on raw native errors
//!   that match its retryable set, and classifies only the terminal error.

mod retrier;
mod table;

pub use retrier::{ClassifyingRetrier, RetryPolicy, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY};
pub use table::{ErrorMapper, ErrorMatcher, ErrorTable};
