mod events;
mod states;
mod transitions;

pub use events::SendEvent;
pub use states::SendState;
pub use transitions::{StateMachine, StateTransition, TransitionError};
