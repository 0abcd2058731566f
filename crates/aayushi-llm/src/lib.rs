pub mod provider;
pub mod providers;
pub mod search;
pub mod types;

pub use provider::{LLMError, LLMProvider, LLMStream};
pub use providers::GroqProvider;
pub use search::{ExaSearchProvider, SearchError, SearchProvider, SEARCH_RESULT_COUNT};
pub use types::{ChatMessage, ChatRole, CompletionRequest, LLMChunk};
