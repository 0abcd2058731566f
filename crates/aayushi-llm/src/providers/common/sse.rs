//! Shared SSE -> [`LLMStream`] adapter.

use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use reqwest::Response;

use crate::provider::{LLMError, LLMStream, Result};
use crate::types::LLMChunk;

fn to_stream_error(err: LLMError) -> LLMError {
    match err {
        LLMError::Stream(msg) => LLMError::Stream(msg),
        // Provider error payloads keep their status so callers can report it.
        api @ LLMError::Api { .. } => api,
        other => LLMError::Stream(other.to_string()),
    }
}

/// Convert an SSE HTTP [`Response`] into an [`LLMStream`].
///
/// `handler` receives the SSE event name and data payload for each event, and can either:
/// - return `Ok(Some(chunk))` to emit a chunk
/// - return `Ok(None)` to skip an event
/// - return `Err(_)` to emit a stream error
///
/// The stream ends after the first [`LLMChunk::Done`] the handler produces, which is
/// not forwarded.
pub fn llm_stream_from_sse<H>(response: Response, mut handler: H) -> LLMStream
where
    H: FnMut(&str, &str) -> Result<Option<LLMChunk>> + Send + 'static,
{
    let stream = response
        .bytes_stream()
        .eventsource()
        .map(move |event| {
            let event = event.map_err(|e| LLMError::Stream(e.to_string()))?;
            handler(event.event.as_str(), event.data.as_str()).map_err(to_stream_error)
        })
        .take_while(|result| {
            let done = matches!(result, Ok(Some(LLMChunk::Done)));
            async move { !done }
        })
        .filter_map(|result| async move {
            match result {
                Ok(Some(chunk)) => Some(Ok(chunk)),
                Ok(None) => None,
                Err(err) => Some(Err(err)),
            }
        });

    Box::pin(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn sse_response(body: &'static str) -> (MockServer, Response) {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/sse"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(body),
            )
            .mount(&mock_server)
            .await;

        let response = reqwest::Client::new()
            .get(format!("{}/sse", mock_server.uri()))
            .send()
            .await
            .expect("response");

        (mock_server, response)
    }

    #[tokio::test]
    async fn filters_none_and_passes_event_name_and_data() {
        let (_server, response) = sse_response(concat!(
            "event: token\n",
            "data: hello\n",
            "\n",
            "event: token\n",
            "data: skip\n",
            "\n",
        ))
        .await;

        let mut stream = llm_stream_from_sse(response, |event, data| {
            if data == "skip" {
                return Ok(None);
            }
            Ok(Some(LLMChunk::Token(format!("{event}:{data}"))))
        });

        let mut out = Vec::new();
        while let Some(item) = stream.next().await {
            out.push(item.expect("chunk"));
        }

        assert_eq!(out, vec![LLMChunk::Token("token:hello".to_string())]);
    }

    #[tokio::test]
    async fn stops_at_done() {
        let (_server, response) = sse_response(concat!(
            "data: a\n\n",
            "data: [DONE]\n\n",
            "data: b\n\n",
        ))
        .await;

        let stream = llm_stream_from_sse(response, |_event, data| {
            if data == "[DONE]" {
                return Ok(Some(LLMChunk::Done));
            }
            Ok(Some(LLMChunk::Token(data.to_string())))
        });

        let out: Vec<_> = stream.map(|item| item.expect("chunk")).collect().await;
        assert_eq!(out, vec![LLMChunk::Token("a".to_string())]);
    }

    #[tokio::test]
    async fn maps_handler_errors_to_stream_error() {
        let (_server, response) = sse_response(concat!("event: token\n", "data: boom\n", "\n")).await;

        let mut stream = llm_stream_from_sse(response, |_event, _data| {
            Err(LLMError::Json(
                serde_json::from_str::<serde_json::Value>("{").unwrap_err(),
            ))
        });

        let Some(item) = stream.next().await else {
            panic!("expected one stream item");
        };

        match item {
            Ok(chunk) => panic!("expected error, got chunk: {chunk:?}"),
            Err(LLMError::Stream(msg)) => assert!(msg.contains("JSON error")),
            Err(other) => panic!("expected LLMError::Stream, got: {other:?}"),
        }
    }
}
