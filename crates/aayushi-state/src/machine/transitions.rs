use thiserror::Error;

use super::events::SendEvent;
use super::states::SendState;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Invalid transition from {from:?} with event {event}")]
    InvalidTransition { from: SendState, event: String },
}

#[derive(Debug, Clone)]
pub struct StateTransition {
    pub from: SendState,
    pub to: SendState,
    pub event: SendEvent,
    pub changed: bool,
}

#[derive(Debug, Clone)]
pub struct StateMachine {
    current_state: SendState,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    pub fn new() -> Self {
        Self::with_state(SendState::Idle)
    }

    pub fn with_state(state: SendState) -> Self {
        Self {
            current_state: state,
        }
    }

    pub fn state(&self) -> &SendState {
        &self.current_state
    }

    /// Apply an event. Events that make no sense in the current state are
    /// rejected and leave the state untouched.
    pub fn handle_event(&mut self, event: SendEvent) -> Result<StateTransition, TransitionError> {
        let old_state = self.current_state.clone();
        let new_state = Self::compute_next_state(&old_state, &event).ok_or_else(|| {
            TransitionError::InvalidTransition {
                from: old_state.clone(),
                event: event.name().to_string(),
            }
        })?;
        let changed = old_state != new_state;

        if changed {
            log::debug!("Send state {:?} -> {:?} on {}", old_state, new_state, event.name());
        }
        self.current_state = new_state.clone();

        Ok(StateTransition {
            from: old_state,
            to: new_state,
            event,
            changed,
        })
    }

    fn compute_next_state(state: &SendState, event: &SendEvent) -> Option<SendState> {
        use SendEvent::*;
        use SendState::*;

        let next = match (state, event) {
            (Idle, RequestSent) => AwaitingHeaders,

            (AwaitingHeaders, HeadersReceived) => Streaming,

            (Streaming, ChunkReceived) => Streaming,
            (Streaming, StreamEnded) => Idle,

            (AwaitingHeaders | Streaming, RequestFailed { error }) => Error {
                message: error.clone(),
            },
            (AwaitingHeaders | Streaming, Cancelled) => Idle,

            (Error { .. }, ErrorAcknowledged) => Idle,

            _ => return None,
        };

        Some(next)
    }

    pub fn reset(&mut self) {
        self.current_state = SendState::Idle;
    }
}
