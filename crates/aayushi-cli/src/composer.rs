//! The send cycle: one user message in, one streamed assistant message out.

use aayushi_core::{Conversation, ConversationStore, Message, Source, StoreError};
use aayushi_state::{SendEvent, SendState, StateMachine, TransitionError};
use futures::StreamExt;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::client::{ChunkStream, ClientError, CompletionClient, CompletionOptions};

#[derive(Error, Debug)]
pub enum ComposerError {
    #[error("Message is empty")]
    EmptyMessage,

    #[error("Cannot send while busy: {0}")]
    Busy(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Transition(#[from] TransitionError),
}

/// What the transcript should render as a send progresses.
#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptEvent<'a> {
    /// Headers arrived; the assistant message now exists.
    Started { sources: &'a [Source] },
    Chunk(&'a str),
    Completed,
    Cancelled,
    Failed(&'a str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendOutcome {
    pub conversation_id: String,
    pub message_id: String,
    pub status: SendStatus,
}

enum StreamEnd {
    Finished,
    Cancelled,
}

pub struct Composer {
    store: ConversationStore,
    machine: StateMachine,
    client: CompletionClient,
}

impl Composer {
    pub fn new(store: ConversationStore, client: CompletionClient) -> Self {
        Self {
            store,
            machine: StateMachine::new(),
            client,
        }
    }

    pub fn state(&self) -> &SendState {
        self.machine.state()
    }

    pub fn conversations(&self) -> &[Conversation] {
        self.store.conversations()
    }

    pub fn active(&self) -> Option<&Conversation> {
        self.store.active()
    }

    pub async fn new_conversation(&mut self) -> Result<String, ComposerError> {
        Ok(self.store.create_conversation(None).await?)
    }

    pub fn select_conversation(&mut self, conversation_id: &str) -> Result<(), ComposerError> {
        Ok(self.store.select_conversation(conversation_id)?)
    }

    pub async fn rename_conversation(
        &mut self,
        conversation_id: &str,
        title: &str,
    ) -> Result<(), ComposerError> {
        Ok(self.store.rename_conversation(conversation_id, title).await?)
    }

    pub async fn delete_conversation(&mut self, conversation_id: &str) -> Result<(), ComposerError> {
        Ok(self.store.delete_conversation(conversation_id).await?)
    }

    pub async fn clear_history(&mut self) -> Result<(), ComposerError> {
        Ok(self.store.clear_all().await?)
    }

    /// Send `text` in the active conversation and stream the reply into it.
    ///
    /// The user message is stored before the request leaves. Every turn gets
    /// an assistant message: when no reply arrives it stays empty and is
    /// marked truncated, as is a reply cut short by `cancel` or a stream error.
    pub async fn send<F>(
        &mut self,
        text: &str,
        options: &CompletionOptions,
        cancel: &CancellationToken,
        mut on_event: F,
    ) -> Result<SendOutcome, ComposerError>
    where
        F: FnMut(TranscriptEvent<'_>),
    {
        let text = text.trim();
        if text.is_empty() {
            return Err(ComposerError::EmptyMessage);
        }
        if !self.machine.state().accepts_user_input() {
            return Err(ComposerError::Busy(self.machine.state().description().to_string()));
        }

        let conversation_id = match self.store.active_id() {
            Some(id) => id.to_string(),
            None => self.store.create_conversation(None).await?,
        };
        self.store
            .append_message(&conversation_id, Message::user(text))
            .await?;

        self.machine.handle_event(SendEvent::RequestSent)?;
        log::debug!("[{}] Completion requested", conversation_id);

        let started = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = self.client.start(text, options) => Some(result),
        };

        let response = match started {
            Some(Ok(response)) => response,
            Some(Err(e)) => {
                log::error!("[{}] Completion request failed: {}", conversation_id, e);
                self.report_failure(&e.to_string());
                self.append_unanswered(&conversation_id).await?;
                on_event(TranscriptEvent::Failed(&e.to_string()));
                return Err(e.into());
            }
            None => {
                self.machine.handle_event(SendEvent::Cancelled)?;
                let message_id = self.append_unanswered(&conversation_id).await?;
                on_event(TranscriptEvent::Cancelled);
                return Ok(SendOutcome {
                    conversation_id,
                    message_id,
                    status: SendStatus::Cancelled,
                });
            }
        };

        self.machine.handle_event(SendEvent::HeadersReceived)?;
        let message_id = match self
            .store
            .append_message(&conversation_id, Message::assistant("", response.sources.clone()))
            .await
        {
            Ok(id) => id,
            Err(e) => {
                self.report_failure(&e.to_string());
                return Err(e.into());
            }
        };
        on_event(TranscriptEvent::Started {
            sources: &response.sources,
        });

        let end = self
            .consume(&conversation_id, &message_id, response.chunks, cancel, &mut on_event)
            .await;

        match end {
            Ok(StreamEnd::Finished) => {
                self.machine.handle_event(SendEvent::StreamEnded)?;
                log::debug!("[{}] Reply {} complete", conversation_id, message_id);
                on_event(TranscriptEvent::Completed);
                Ok(SendOutcome {
                    conversation_id,
                    message_id,
                    status: SendStatus::Completed,
                })
            }
            Ok(StreamEnd::Cancelled) => {
                self.machine.handle_event(SendEvent::Cancelled)?;
                if let Some(request_id) = response.request_id.as_deref() {
                    if let Err(e) = self.client.stop(request_id).await {
                        log::debug!("[{}] Stop request failed: {}", request_id, e);
                    }
                }
                self.store.mark_truncated(&conversation_id, &message_id).await?;
                on_event(TranscriptEvent::Cancelled);
                Ok(SendOutcome {
                    conversation_id,
                    message_id,
                    status: SendStatus::Cancelled,
                })
            }
            Err(e) => {
                log::error!("[{}] Reply {} failed mid-stream: {}", conversation_id, message_id, e);
                self.report_failure(&e.to_string());
                if let Err(mark) = self.store.mark_truncated(&conversation_id, &message_id).await {
                    log::warn!("[{}] Could not mark reply truncated: {}", conversation_id, mark);
                }
                on_event(TranscriptEvent::Failed(&e.to_string()));
                Err(e)
            }
        }
    }

    async fn consume<F>(
        &mut self,
        conversation_id: &str,
        message_id: &str,
        mut chunks: ChunkStream,
        cancel: &CancellationToken,
        on_event: &mut F,
    ) -> Result<StreamEnd, ComposerError>
    where
        F: FnMut(TranscriptEvent<'_>),
    {
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(StreamEnd::Cancelled),
                next = chunks.next() => next,
            };

            match next {
                Some(Ok(chunk)) => {
                    self.store
                        .append_chunk(conversation_id, message_id, &chunk)
                        .await?;
                    self.machine.handle_event(SendEvent::ChunkReceived)?;
                    on_event(TranscriptEvent::Chunk(&chunk));
                }
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(StreamEnd::Finished),
            }
        }
    }

    /// Record a turn that received no reply so the conversation keeps alternating.
    async fn append_unanswered(&mut self, conversation_id: &str) -> Result<String, ComposerError> {
        Ok(self
            .store
            .append_message(conversation_id, Message::unanswered())
            .await?)
    }

    /// Move the machine through `Error` back to `Idle` once a failure is reported.
    fn report_failure(&mut self, error: &str) {
        let failed = self.machine.handle_event(SendEvent::RequestFailed {
            error: error.to_string(),
        });
        if let Err(e) = failed.and_then(|_| self.machine.handle_event(SendEvent::ErrorAcknowledged)) {
            log::warn!("Resetting send state after {}", e);
            self.machine.reset();
        }
    }
}
