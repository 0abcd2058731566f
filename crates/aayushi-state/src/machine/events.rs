use serde::{Deserialize, Serialize};

/// Events that drive a send cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SendEvent {
    /// The completion request was issued.
    RequestSent,

    /// Status and headers arrived with a success status.
    HeadersReceived,

    /// One body chunk was applied to the transcript.
    ChunkReceived,

    /// The body ended normally.
    StreamEnded,

    /// Network or provider failure, before or during the body.
    RequestFailed { error: String },

    /// The user aborted the in-flight request.
    Cancelled,

    /// The failure has been surfaced; go back to idle.
    ErrorAcknowledged,
}

impl SendEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::RequestSent => "request_sent",
            Self::HeadersReceived => "headers_received",
            Self::ChunkReceived => "chunk_received",
            Self::StreamEnded => "stream_ended",
            Self::RequestFailed { .. } => "request_failed",
            Self::Cancelled => "cancelled",
            Self::ErrorAcknowledged => "error_acknowledged",
        }
    }
}
