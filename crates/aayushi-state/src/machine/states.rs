use serde::{Deserialize, Serialize};

/// Where a composer is within one send cycle.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SendState {
    /// Ready for the next message.
    #[default]
    Idle,

    /// The completion request is out; no response headers yet.
    AwaitingHeaders,

    /// Headers received, body chunks are being applied.
    Streaming,

    /// The request or the stream failed. Any partial content is kept.
    Error { message: String },
}

impl SendState {
    /// A new send may only start from `Idle`.
    pub fn accepts_user_input(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn description(&self) -> &str {
        match self {
            Self::Idle => "Ready for input",
            Self::AwaitingHeaders => "Waiting for response",
            Self::Streaming => "Receiving response",
            Self::Error { .. } => "Failed",
        }
    }
}
