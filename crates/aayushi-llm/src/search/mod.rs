//! Web search providers and result normalization.

pub mod exa;

use aayushi_core::Source;
use async_trait::async_trait;
use thiserror::Error;

pub use exa::ExaSearchProvider;

/// Number of results requested per query.
pub const SEARCH_RESULT_COUNT: usize = 5;

const SNIPPET_MAX_CHARS: usize = 200;
const NO_TITLE: &str = "No title";
const NO_SNIPPET: &str = "No snippet available";

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Search API error: {message}")]
    Api {
        status: Option<u16>,
        message: String,
    },
}

impl SearchError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            Self::Api { status, .. } => *status,
            Self::Json(_) => None,
        }
    }
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Run one query and return normalized citations, best first.
    async fn search(&self, query: &str) -> Result<Vec<Source>, SearchError>;
}

/// Build a [`Source`] from the raw fields a search provider returns.
///
/// The snippet is the first non-empty highlight, else the first 200
/// characters of the page text followed by `...`, else a placeholder.
pub fn normalize_result(
    title: Option<&str>,
    url: &str,
    highlights: &[String],
    text: Option<&str>,
) -> Source {
    let title = title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or(NO_TITLE)
        .to_string();

    let snippet = match highlights.iter().find(|h| !h.trim().is_empty()) {
        Some(highlight) => highlight.clone(),
        None => match text.filter(|t| !t.is_empty()) {
            Some(text) => {
                let head: String = text.chars().take(SNIPPET_MAX_CHARS).collect();
                format!("{}...", head)
            }
            None => NO_SNIPPET.to_string(),
        },
    };

    Source {
        title,
        href: url.to_string(),
        snippet,
    }
}
