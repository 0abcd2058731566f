use async_trait::async_trait;
use reqwest::Client;

use crate::provider::{LLMError, LLMProvider, LLMStream, Result};
use crate::types::{CompletionRequest, LLMChunk};

use super::common::openai_compat::{
    build_openai_compat_body, error_message_from_body, parse_openai_compat_sse_data_strict,
};
use super::common::sse::llm_stream_from_sse;

pub const DEFAULT_GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Streaming chat completions against Groq's OpenAI-compatible endpoint.
pub struct GroqProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GroqProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_GROQ_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl LLMProvider for GroqProvider {
    async fn chat_stream(&self, request: &CompletionRequest) -> Result<LLMStream> {
        log::debug!(
            "Groq completion: model={}, temperature={}, max_tokens={}, messages={}",
            request.model,
            request.temperature,
            request.max_tokens,
            request.messages.len()
        );

        let body = build_openai_compat_body(request);

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(LLMError::Api {
                status: Some(status.as_u16()),
                message: error_message_from_body(&text),
            });
        }

        let stream = llm_stream_from_sse(response, |_event, data| {
            if data.trim().is_empty() {
                return Ok(None);
            }

            match parse_openai_compat_sse_data_strict(data)? {
                LLMChunk::Token(token) if token.is_empty() => Ok(None),
                chunk => Ok(Some(chunk)),
            }
        });

        Ok(stream)
    }
}
