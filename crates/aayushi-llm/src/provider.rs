use crate::types::{CompletionRequest, LLMChunk};
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LLMError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("API error: {message}")]
    Api {
        status: Option<u16>,
        message: String,
    },
}

impl LLMError {
    /// HTTP status reported by the provider, when there is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            Self::Api { status, .. } => *status,
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, LLMError>;

pub type LLMStream = Pin<Box<dyn Stream<Item = Result<LLMChunk>> + Send>>;

#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Start a streaming chat completion.
    ///
    /// Errors returned here happened before any token was produced; errors
    /// inside the stream happened after.
    async fn chat_stream(&self, request: &CompletionRequest) -> Result<LLMStream>;
}
