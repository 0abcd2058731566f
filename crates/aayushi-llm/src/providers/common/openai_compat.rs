//! OpenAI-compatible request serialization and stream chunk parsing.
//!
//! Groq, OpenAI and most hosted inference APIs accept the chat completions
//! request shape and stream `chat.completion.chunk` objects over SSE.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::provider::{LLMError, Result};
use crate::types::{CompletionRequest, LLMChunk};

/// Build a streaming chat completions request body.
pub fn build_openai_compat_body(request: &CompletionRequest) -> Value {
    json!({
        "model": request.model,
        "messages": request.messages,
        "temperature": request.temperature,
        "max_tokens": request.max_tokens,
        "stream": true,
    })
}

#[derive(Debug, Deserialize)]
struct OpenAICompatStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAICompatChoice>,
    error: Option<OpenAICompatError>,
}

#[derive(Debug, Deserialize)]
struct OpenAICompatChoice {
    #[serde(default)]
    delta: OpenAICompatDelta,
}

#[derive(Debug, Deserialize, Default)]
struct OpenAICompatDelta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAICompatError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct OpenAICompatErrorBody {
    error: OpenAICompatError,
}

/// Parse one SSE `data:` payload.
///
/// `[DONE]` maps to [`LLMChunk::Done`]; a chunk without content maps to an
/// empty token; an in-band `error` object maps to [`LLMError::Api`].
pub fn parse_openai_compat_sse_data_strict(data: &str) -> Result<LLMChunk> {
    let data = data.trim();
    if data == "[DONE]" {
        return Ok(LLMChunk::Done);
    }

    let chunk: OpenAICompatStreamChunk = serde_json::from_str(data)?;

    if let Some(error) = chunk.error {
        return Err(LLMError::Api {
            status: None,
            message: error.message,
        });
    }

    let content = chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .unwrap_or_default();

    Ok(LLMChunk::Token(content))
}

/// Extract a readable message from an error response body.
pub fn error_message_from_body(body: &str) -> String {
    serde_json::from_str::<OpenAICompatErrorBody>(body)
        .map(|parsed| parsed.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChatMessage;

    fn request() -> CompletionRequest {
        CompletionRequest {
            model: "llama-3.1-8b-instant".to_string(),
            messages: vec![
                ChatMessage::system("You are helpful"),
                ChatMessage::user("Hi"),
            ],
            temperature: 0.7,
            max_tokens: 2048,
        }
    }

    #[test]
    fn body_carries_generation_parameters() {
        let body = build_openai_compat_body(&request());

        assert_eq!(body["model"], "llama-3.1-8b-instant");
        assert_eq!(body["stream"], true);
        assert_eq!(body["max_tokens"], 2048);
        assert!((body["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
        assert_eq!(body["messages"].as_array().unwrap().len(), 2);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Hi");
    }

    #[test]
    fn parses_simple_token() {
        let data = r#"{"id":"chatcmpl-123","choices":[{"delta":{"content":"Hello"},"finish_reason":null}]}"#;
        let chunk = parse_openai_compat_sse_data_strict(data).unwrap();
        assert_eq!(chunk, LLMChunk::Token("Hello".to_string()));
    }

    #[test]
    fn parses_done_signal_with_whitespace() {
        let chunk = parse_openai_compat_sse_data_strict("  [DONE]  ").unwrap();
        assert_eq!(chunk, LLMChunk::Done);
    }

    #[test]
    fn empty_delta_is_empty_token() {
        let data = r#"{"id":"chatcmpl-123","choices":[{"delta":{},"finish_reason":"stop"}],"x_groq":{"usage":{}}}"#;
        let chunk = parse_openai_compat_sse_data_strict(data).unwrap();
        assert_eq!(chunk, LLMChunk::Token(String::new()));
    }

    #[test]
    fn in_band_error_is_api_error() {
        let data = r#"{"error":{"message":"rate limited","type":"rate_limit"}}"#;
        let err = parse_openai_compat_sse_data_strict(data).unwrap_err();
        assert!(matches!(err, LLMError::Api { ref message, .. } if message == "rate limited"));
    }

    #[test]
    fn invalid_json_is_rejected() {
        assert!(parse_openai_compat_sse_data_strict("{not valid json}").is_err());
    }

    #[test]
    fn error_message_prefers_structured_body() {
        let body = r#"{"error":{"message":"Invalid API key","type":"invalid_request_error"}}"#;
        assert_eq!(error_message_from_body(body), "Invalid API key");
        assert_eq!(error_message_from_body(" gateway timeout \n"), "gateway timeout");
    }
}
