//! Remote source resolution.
//!
//! Records that look like URLs are fetched and replaced with the page's main
//! text before generation. This module owns the URL grammar, the HTTP fetcher
//! and the HTML-to-text reduction.

mod client;
mod html;
mod url;

pub use client::{fetch_error_table, FetchError, Fetcher, DEFAULT_MAX_FETCH_BYTES};
pub use html::extract_main_text;
pub use url::{is_url, resolve_source, DEFAULT_SCHEME};
