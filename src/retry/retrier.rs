//! Bounded fixed-delay retry with terminal classification.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use crate::error::DomainError;
use crate::metrics::MetricsCollector;

use super::table::{ErrorMatcher, ErrorTable};

/// Default number of attempts (first try included).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;

/// Default fixed delay between attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1700);

/// Attempt budget and inter-attempt delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// A single attempt; the retrier then acts as a pure classifier.
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }
}

/// Runs an operation, retrying transient native errors and classifying the
/// terminal one through an [`ErrorTable`].
///
/// The retry decision looks only at raw native errors. Classification happens
/// once, after the attempt budget is spent or a non-retryable error shows up.
pub struct ClassifyingRetrier<E> {
    table: ErrorTable<E>,
    retryable: Vec<ErrorMatcher<E>>,
    policy: RetryPolicy,
}

impl<E> Clone for ClassifyingRetrier<E> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
            retryable: self.retryable.clone(),
            policy: self.policy,
        }
    }
}

impl<E> fmt::Debug for ClassifyingRetrier<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassifyingRetrier")
            .field("table", &self.table)
            .field("retryable", &self.retryable.len())
            .field("policy", &self.policy)
            .finish()
    }
}

impl<E> ClassifyingRetrier<E>
where
    E: fmt::Display + fmt::Debug,
{
    pub fn new(table: ErrorTable<E>, policy: RetryPolicy) -> Self {
        Self {
            table,
            retryable: Vec::new(),
            policy,
        }
    }

    /// Adds a native condition that is worth another attempt.
    pub fn retry_on(mut self, matcher: ErrorMatcher<E>) -> Self {
        self.retryable.push(matcher);
        self
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn table(&self) -> &ErrorTable<E> {
        &self.table
    }

    pub fn is_retryable(&self, err: &E) -> bool {
        self.retryable.iter().any(|matches| matches(err))
    }

    /// Classifies a native error without running anything.
    pub fn classify(&self, err: &E) -> DomainError {
        self.table.classify(err)
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget runs out.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, DomainError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if attempt < max_attempts && self.is_retryable(&err) {
                tracing::info!(
                    operation = operation,
                    attempt = attempt,
                    max_attempts = max_attempts,
                    delay_ms = self.policy.delay.as_millis() as u64,
                    error = %err,
                    "Transient failure, retrying"
                );
                MetricsCollector::new().record_retry(operation);
                tokio::time::sleep(self.policy.delay).await;
                attempt += 1;
                continue;
            }

            let classified = self.table.classify(&err);
            tracing::error!(
                operation = operation,
                table = self.table.name(),
                attempts = attempt,
                kind = %classified.kind(),
                error = ?err,
                "Operation failed"
            );
            return Err(classified);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, FetchKind};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Flaky {
        Transient,
        Fatal,
    }

    impl fmt::Display for Flaky {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{:?}", self)
        }
    }

    fn retrier(policy: RetryPolicy) -> ClassifyingRetrier<Flaky> {
        let table = ErrorTable::new("flaky", |_| DomainError::fetch(FetchKind::Other, "generic"))
            .on(
                |e| *e == Flaky::Transient,
                |_| DomainError::fetch(FetchKind::Network, "network"),
            )
            .on(
                |e| *e == Flaky::Fatal,
                |_| DomainError::fetch(FetchKind::BadStatus, "fatal"),
            );
        ClassifyingRetrier::new(table, policy).retry_on(|e| *e == Flaky::Transient)
    }

    #[tokio::test]
    async fn test_retries_once_then_succeeds() {
        let delay = Duration::from_millis(30);
        let retrier = retrier(RetryPolicy::new(2, delay));
        let calls = AtomicU32::new(0);

        let start = Instant::now();
        let result = retrier
            .run("flaky", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(Flaky::Transient)
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(start.elapsed() >= delay);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_immediately() {
        let retrier = retrier(RetryPolicy::new(2, Duration::from_secs(5)));
        let calls = AtomicU32::new(0);

        let start = Instant::now();
        let result: Result<(), DomainError> = retrier
            .run("fatal", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(Flaky::Fatal) }
            })
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Fetch(FetchKind::BadStatus));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_exhausted_budget_classifies_last_error() {
        let retrier = retrier(RetryPolicy::new(2, Duration::from_millis(5)));
        let calls = AtomicU32::new(0);

        let result: Result<(), DomainError> = retrier
            .run("always", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(Flaky::Transient) }
            })
            .await;

        assert_eq!(result.unwrap_err().message(), "network");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_single_attempt_is_pure_classifier() {
        let retrier = retrier(RetryPolicy::no_retry());
        let calls = AtomicU32::new(0);

        let result: Result<(), DomainError> = retrier
            .run("once", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(Flaky::Transient) }
            })
            .await;

        assert_eq!(result.unwrap_err().kind(), ErrorKind::Fetch(FetchKind::Network));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_policy_floor_is_one_attempt() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
        assert_eq!(RetryPolicy::default().max_attempts, 2);
        assert_eq!(RetryPolicy::default().delay, Duration::from_millis(1700));
    }
}
