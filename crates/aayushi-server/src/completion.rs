//! Completion proxy logic: request validation, web augmentation, prompt
//! assembly and the token relay.

use actix_web::web::Bytes;
use aayushi_core::Source;
use aayushi_llm::{
    ChatMessage, CompletionRequest, LLMChunk, LLMError, LLMStream, SearchProvider,
};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use std::fmt::Write as _;
use tokio_util::sync::CancellationToken;

use crate::error::ApiError;
use crate::state::ActiveStreamGuard;

pub const ALLOWED_MODELS: [&str; 3] = [
    "llama-3.1-8b-instant",
    "llama-3.3-70b-versatile",
    "mixtral-8x7b-32768",
];
pub const DEFAULT_MODEL: &str = "llama-3.1-8b-instant";
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_MAX_TOKENS: i64 = 2048;
pub const DEFAULT_LANGUAGE: &str = "English";

const MAX_TEMPERATURE: f64 = 2.0;
const MAX_OUTPUT_TOKENS: i64 = 8192;
const WEB_PREFIX: &str = "web:";

pub const SYSTEM_PROMPT: &str = "You are Aayushi, the assistant built into this chat application.

You answer quickly and precisely. Your tone is confident, friendly and clear.

You can help with:
- Programming and debugging
- System design
- Writing, editing and summarization
- Logical reasoning and step-by-step explanations

Rules:
- You cannot generate images or read uploaded files.
- You cannot browse the web. Web results are only available when they are included in the user message.
- Never claim access to private data.
- Format answers with Markdown.
- Answer in the language requested below.

When web search results are included, base the answer on them and list the sources you used at the end.";

/// Body of `POST /api/chat` as sent by the client.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<i64>,
    #[serde(rename = "useWeb", alias = "use_web")]
    pub use_web: Option<bool>,
    pub language: Option<String>,
}

/// A validated chat request with defaults applied and parameters clamped.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatParams {
    pub message: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub use_web: bool,
    pub language: String,
}

impl ChatRequest {
    pub fn validate(self) -> Result<ChatParams, ApiError> {
        let message = self
            .message
            .filter(|m| !m.trim().is_empty())
            .ok_or_else(|| {
                ApiError::InvalidInput(
                    "Message is required and must be a non-empty string".to_string(),
                )
            })?;

        let model = self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string());
        if !ALLOWED_MODELS.contains(&model.as_str()) {
            return Err(ApiError::InvalidInput("Invalid model selected".to_string()));
        }

        let language = self
            .language
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());

        Ok(ChatParams {
            message,
            model,
            temperature: clamp_temperature(self.temperature.unwrap_or(DEFAULT_TEMPERATURE)),
            max_tokens: clamp_max_tokens(self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)),
            use_web: self.use_web.unwrap_or(false),
            language,
        })
    }
}

pub fn clamp_temperature(temperature: f64) -> f32 {
    temperature.clamp(0.0, MAX_TEMPERATURE) as f32
}

pub fn clamp_max_tokens(max_tokens: i64) -> u32 {
    max_tokens.clamp(1, MAX_OUTPUT_TOKENS) as u32
}

/// The text after a case-insensitive `web:` prefix, trimmed.
fn strip_web_prefix(message: &str) -> Option<&str> {
    let prefix = message.get(..WEB_PREFIX.len())?;
    if prefix.eq_ignore_ascii_case(WEB_PREFIX) {
        Some(message[WEB_PREFIX.len()..].trim())
    } else {
        None
    }
}

/// The query to send to the search provider, if this message wants web context.
pub fn web_query(message: &str, use_web: bool) -> Option<String> {
    match strip_web_prefix(message) {
        Some(query) if query.is_empty() => None,
        Some(query) => Some(query.to_string()),
        None if use_web => Some(message.to_string()),
        None => None,
    }
}

/// The user's question as it should appear in the prompt.
pub fn prompt_query(message: &str) -> &str {
    strip_web_prefix(message)
        .filter(|query| !query.is_empty())
        .unwrap_or(message)
}

/// Search without failing the completion: errors become zero results.
pub async fn gather_sources(search: &dyn SearchProvider, query: &str) -> Vec<Source> {
    match search.search(query).await {
        Ok(sources) => {
            log::info!("Web search for {:?} returned {} results", query, sources.len());
            sources
        }
        Err(e) => {
            log::warn!("Web search failed, continuing without web context: {}", e);
            Vec::new()
        }
    }
}

/// Embed search results ahead of the user's question.
pub fn build_user_prompt(query: &str, sources: &[Source]) -> String {
    if sources.is_empty() {
        return query.to_string();
    }

    let mut prompt = String::from("Web Search Results:\n");
    for source in sources {
        let _ = writeln!(prompt, "- {}: {} ({})", source.title, source.snippet, source.href);
    }
    let _ = write!(
        prompt,
        "\nUser Query: {}\n\nAnswer the query using the results above and cite the sources you use.",
        query
    );
    prompt
}

pub fn system_prompt(language: &str) -> String {
    format!("{}\nRespond in {}.", SYSTEM_PROMPT, language)
}

pub fn build_completion_request(params: &ChatParams, user_prompt: String) -> CompletionRequest {
    CompletionRequest {
        model: params.model.clone(),
        messages: vec![
            ChatMessage::system(system_prompt(&params.language)),
            ChatMessage::user(user_prompt),
        ],
        temperature: params.temperature,
        max_tokens: params.max_tokens,
    }
}

/// JSON for the `X-Sources` header.
///
/// Characters outside printable ASCII are written as `\uXXXX` escapes so the
/// value is a legal header and still parses to the same JSON.
pub fn encode_sources_header(sources: &[Source]) -> String {
    let json = serde_json::to_string(sources).unwrap_or_else(|_| "[]".to_string());

    let mut encoded = String::with_capacity(json.len());
    for c in json.chars() {
        if c.is_ascii() && !c.is_ascii_control() {
            encoded.push(c);
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                let _ = write!(encoded, "\\u{:04x}", unit);
            }
        }
    }
    encoded
}

/// Forward provider tokens as body bytes in emission order.
///
/// The relay ends when the provider finishes, when `cancel` fires, or after
/// forwarding the first provider error. Dropping the returned stream drops
/// the provider request with it.
pub fn relay_tokens(
    mut upstream: LLMStream,
    cancel: CancellationToken,
    guard: ActiveStreamGuard,
) -> impl Stream<Item = Result<Bytes, LLMError>> + 'static {
    async_stream::stream! {
        let guard = guard;
        let mut relayed = 0usize;

        loop {
            let item = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    log::info!("[{}] Relay cancelled after {} chunks", guard.id(), relayed);
                    break;
                }
                item = upstream.next() => item,
            };

            match item {
                Some(Ok(LLMChunk::Token(token))) => {
                    if token.is_empty() {
                        continue;
                    }
                    relayed += 1;
                    yield Ok(Bytes::from(token));
                }
                Some(Ok(LLMChunk::Done)) | None => {
                    log::info!("[{}] Relay complete: {} chunks", guard.id(), relayed);
                    break;
                }
                Some(Err(e)) => {
                    log::error!("[{}] Provider stream failed after {} chunks: {}", guard.id(), relayed, e);
                    yield Err(e);
                    break;
                }
            }
        }
    }
}
