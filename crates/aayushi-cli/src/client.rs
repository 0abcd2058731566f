//! HTTP client for the completion server's chat routes.

use aayushi_core::Source;
use futures::{Stream, StreamExt};
use reqwest::header::HeaderMap;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use thiserror::Error;

pub const SOURCES_HEADER: &str = "X-Sources";
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server returned {status}: {message}")]
    Status { status: u16, message: String },
}

pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String, ClientError>> + Send>>;

/// Generation settings sent with every message. `None` leaves the server default.
#[derive(Debug, Clone, Default)]
pub struct CompletionOptions {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub use_web: bool,
    pub language: Option<String>,
}

#[derive(Serialize)]
struct ChatBody<'a> {
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(rename = "useWeb")]
    use_web: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    language: Option<&'a str>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// A completion whose headers have arrived and whose body is still streaming.
pub struct CompletionResponse {
    pub request_id: Option<String>,
    pub sources: Vec<Source>,
    pub chunks: ChunkStream,
}

pub struct CompletionClient {
    client: Client,
    base_url: String,
}

impl CompletionClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Send a message and wait for the response headers.
    pub async fn start(
        &self,
        message: &str,
        options: &CompletionOptions,
    ) -> Result<CompletionResponse, ClientError> {
        let body = ChatBody {
            message,
            model: options.model.as_deref(),
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            use_web: options.use_web,
            language: options.language.as_deref(),
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&text)
                .map(|body| body.error)
                .unwrap_or_else(|_| format!("HTTP {}", status));
            return Err(ClientError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let sources = sources_from_headers(response.headers());
        let request_id = response
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let mut bytes = response.bytes_stream();
        let chunks = async_stream::stream! {
            let mut decoder = Utf8StreamDecoder::default();
            while let Some(item) = bytes.next().await {
                match item {
                    Ok(data) => {
                        let text = decoder.push(&data);
                        if !text.is_empty() {
                            yield Ok(text);
                        }
                    }
                    Err(e) => {
                        yield Err(ClientError::Http(e));
                        return;
                    }
                }
            }
            if let Some(rest) = decoder.finish() {
                yield Ok(rest);
            }
        };

        Ok(CompletionResponse {
            request_id,
            sources,
            chunks: Box::pin(chunks),
        })
    }

    /// Ask the server to stop relaying `request_id`. Returns false when the
    /// server no longer knows the request.
    pub async fn stop(&self, request_id: &str) -> Result<bool, ClientError> {
        let response = self
            .client
            .post(format!("{}/api/chat/{}/stop", self.base_url, request_id))
            .send()
            .await?;

        match response.status() {
            s if s.is_success() => Ok(true),
            reqwest::StatusCode::NOT_FOUND => Ok(false),
            status => Err(ClientError::Status {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            }),
        }
    }
}

/// Sources from the `X-Sources` header. A missing or malformed header means none.
pub fn sources_from_headers(headers: &HeaderMap) -> Vec<Source> {
    let Some(raw) = headers.get(SOURCES_HEADER).and_then(|v| v.to_str().ok()) else {
        return Vec::new();
    };

    serde_json::from_str(raw).unwrap_or_else(|e| {
        log::warn!("Ignoring malformed {} header: {}", SOURCES_HEADER, e);
        Vec::new()
    })
}

/// Incremental UTF-8 decoding for a body that may split characters across chunks.
#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    pending: Vec<u8>,
}

impl Utf8StreamDecoder {
    /// Decode as much of the buffered input as forms complete characters.
    pub fn push(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::new();

        loop {
            let (valid, invalid_len) = match std::str::from_utf8(&self.pending) {
                Ok(_) => (self.pending.len(), None),
                Err(e) => (e.valid_up_to(), e.error_len()),
            };
            out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));

            match invalid_len {
                Some(len) => {
                    out.push(char::REPLACEMENT_CHARACTER);
                    self.pending.drain(..valid + len);
                }
                None => {
                    // Whatever remains is the start of an incomplete character.
                    self.pending.drain(..valid);
                    break;
                }
            }
        }

        out
    }

    /// Flush bytes left over at end of stream.
    pub fn finish(self) -> Option<String> {
        if self.pending.is_empty() {
            None
        } else {
            Some(String::from_utf8_lossy(&self.pending).into_owned())
        }
    }
}
