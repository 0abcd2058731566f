pub mod error;
pub mod storage;
pub mod store;
pub mod types;

pub use error::StoreError;
pub use storage::{JsonFileStorage, MemoryStorage, Storage};
pub use store::{ConversationStore, CONVERSATIONS_KEY};
pub use types::{derive_title, Conversation, Message, Role, Source, DEFAULT_TITLE};
