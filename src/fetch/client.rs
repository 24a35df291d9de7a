//! HTTP fetcher for URL-valued source records.

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::redirect::Policy;
use reqwest::{Client, ClientBuilder};
use thiserror::Error;

use crate::error::{DomainError, FetchKind};
use crate::retry::{ClassifyingRetrier, ErrorTable, RetryPolicy};

use super::html::extract_main_text;

/// Browser-like user agent; many sites refuse obviously scripted clients.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

/// Default byte ceiling for a fetched page.
pub const DEFAULT_MAX_FETCH_BYTES: u64 = 2 * 1024 * 1024;

/// Native failures of the fetcher.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("unsuccessful status code {0}")]
    Status(u16),

    #[error("content type '{0}' is not html")]
    NotHtml(String),

    #[error("response body is not valid UTF-8: {0}")]
    Decode(String),

    #[error("no readable content in page")]
    NoContent,

    #[error("response exceeds the {limit} byte limit")]
    TooLarge { limit: u64 },
}

fn http_error(err: &FetchError) -> Option<&reqwest::Error> {
    match err {
        FetchError::Http(inner) => Some(inner),
        _ => None,
    }
}

/// Classification of fetch failures, most specific first.
pub fn fetch_error_table() -> ErrorTable<FetchError> {
    ErrorTable::new("fetch", |_| {
        DomainError::fetch(FetchKind::Other, "Error occurred while fetching this URL.")
    })
    .on(
        |e| matches!(e, FetchError::InvalidUrl(_)) || http_error(e).is_some_and(|h| h.is_builder()),
        |_| DomainError::fetch(FetchKind::InvalidUrl, "Url is invalid."),
    )
    .on(
        |e| matches!(e, FetchError::Status(_)) || http_error(e).is_some_and(|h| h.is_status()),
        |_| {
            DomainError::fetch(
                FetchKind::BadStatus,
                "Received an unsuccessful status code while fetching this URL.",
            )
        },
    )
    .on(
        |e| http_error(e).is_some_and(|h| h.is_timeout()),
        |_| DomainError::fetch(FetchKind::Timeout, "Request timed out."),
    )
    .on(
        |e| http_error(e).is_some_and(|h| h.is_connect()),
        |_| {
            DomainError::fetch(
                FetchKind::Network,
                "Failed to retrieve content from URL due to network related issues.",
            )
        },
    )
    .on(
        |e| matches!(e, FetchError::Decode(_)) || http_error(e).is_some_and(|h| h.is_decode()),
        |_| {
            DomainError::fetch(
                FetchKind::Decoding,
                "Failed to decode the response returned by server.",
            )
        },
    )
    .on(
        |e| http_error(e).is_some_and(|h| h.is_body() || h.is_redirect()),
        |_| {
            DomainError::fetch(
                FetchKind::ProtocolViolation,
                "Server violated the protocol by returning invalid response.",
            )
        },
    )
    .on(
        |e| http_error(e).is_some_and(|h| h.is_request()),
        |_| {
            DomainError::fetch(
                FetchKind::Network,
                "Failed to retrieve content from URL due to network related issues.",
            )
        },
    )
    .on(
        |e| matches!(e, FetchError::NotHtml(_)),
        |_| DomainError::fetch(FetchKind::ContentNotFound, "HTML content not found in the URL."),
    )
    .on(
        |e| matches!(e, FetchError::NoContent),
        |_| DomainError::fetch(FetchKind::ContentNotFound, "No content found in the URL."),
    )
    .on(
        |e| matches!(e, FetchError::TooLarge { .. }),
        |_| {
            DomainError::fetch(
                FetchKind::ContentTooLarge,
                "Content length is more than maximum fetch limit.",
            )
        },
    )
}

fn is_transient(err: &FetchError) -> bool {
    http_error(err).is_some_and(|h| h.is_timeout() || h.is_connect())
}

/// Fetches pages and reduces them to their main text.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    max_bytes: u64,
    retrier: ClassifyingRetrier<FetchError>,
}

impl Fetcher {
    /// Builds a fetcher with the given byte ceiling, per-request timeout and
    /// retry policy.
    pub fn new(max_bytes: u64, timeout: Duration, policy: RetryPolicy) -> Self {
        let client = Self::client_builder(timeout)
            .build()
            .expect("Failed to build HTTP client");
        Self::with_client(client, max_bytes, policy)
    }

    /// Builds a fetcher around a preconfigured HTTP client.
    pub fn with_client(client: Client, max_bytes: u64, policy: RetryPolicy) -> Self {
        Self {
            client,
            max_bytes,
            retrier: ClassifyingRetrier::new(fetch_error_table(), policy).retry_on(is_transient),
        }
    }

    /// Client settings every fetcher starts from.
    pub fn client_builder(timeout: Duration) -> ClientBuilder {
        Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .redirect(Policy::limited(10))
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Fetches `url` and returns its main-content text.
    pub async fn fetch(&self, url: &str) -> Result<String, DomainError> {
        self.retrier.run("fetch_url", || self.fetch_once(url)).await
    }

    async fn fetch_once(&self, url: &str) -> Result<String, FetchError> {
        let parsed = reqwest::Url::parse(url).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;

        let mut response = self.client.get(parsed).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();
        if !content_type.contains("html") {
            return Err(FetchError::NotHtml(content_type));
        }

        if let Some(declared) = response.content_length() {
            if declared > self.max_bytes {
                return Err(FetchError::TooLarge {
                    limit: self.max_bytes,
                });
            }
        }

        let mut body: Vec<u8> = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if (body.len() + chunk.len()) as u64 > self.max_bytes {
                return Err(FetchError::TooLarge {
                    limit: self.max_bytes,
                });
            }
            body.extend_from_slice(&chunk);
        }

        let html = String::from_utf8(body).map_err(|e| FetchError::Decode(e.to_string()))?;

        tracing::debug!(url = url, bytes = html.len(), "Fetched source page");

        extract_main_text(&html).ok_or(FetchError::NoContent)
    }
}

impl std::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher")
            .field("max_bytes", &self.max_bytes)
            .field("policy", &self.retrier.policy())
            .finish()
    }
}
