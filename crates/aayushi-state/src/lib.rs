//! aayushi-state - State machine for one composer send cycle
//!
//! A send moves from `Idle` to `AwaitingHeaders` when the completion request
//! leaves, to `Streaming` once the response headers arrive, and back to
//! `Idle` when the body ends. Failures park the machine in `Error` until the
//! composer has reported them.

pub mod machine;

pub use machine::{SendEvent, SendState, StateMachine, StateTransition, TransitionError};
