//! aayushi-cli - Terminal composer for the Aayushi chat assistant
//!
//! The [`Composer`] owns the local conversation history and drives one send
//! at a time against the completion server through [`CompletionClient`].

pub mod client;
pub mod composer;

pub use client::{ClientError, CompletionClient, CompletionOptions, CompletionResponse};
pub use composer::{Composer, ComposerError, SendOutcome, SendStatus, TranscriptEvent};
