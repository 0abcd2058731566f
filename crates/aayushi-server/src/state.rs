use aayushi_llm::{ExaSearchProvider, GroqProvider, LLMProvider, SearchProvider};
use dashmap::DashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::ServerConfig;

#[derive(Clone)]
pub struct AppState {
    pub llm: Arc<dyn LLMProvider>,
    pub search: Arc<dyn SearchProvider>,
    /// Cancellation tokens of the completions currently being relayed.
    pub active_streams: Arc<DashMap<String, CancellationToken>>,
}

impl AppState {
    pub fn new(llm: Arc<dyn LLMProvider>, search: Arc<dyn SearchProvider>) -> Self {
        Self {
            llm,
            search,
            active_streams: Arc::new(DashMap::new()),
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        log::info!("Completion provider base URL: {}", config.llm_base_url);
        log::info!("Search provider base URL: {}", config.search_base_url);

        let llm = GroqProvider::new(config.groq_api_key.clone())
            .with_base_url(config.llm_base_url.clone());
        let search = ExaSearchProvider::new(config.exa_api_key.clone())
            .with_base_url(config.search_base_url.clone());

        Self::new(Arc::new(llm), Arc::new(search))
    }

    /// Register a new relay and hand back its id, token and guard.
    ///
    /// The registration lasts as long as the guard.
    pub fn register_stream(&self) -> (String, CancellationToken, ActiveStreamGuard) {
        ActiveStreamGuard::register(&self.active_streams)
    }

    /// Cancel a registered relay. Returns false when none is active under `id`.
    pub fn cancel_stream(&self, id: &str) -> bool {
        match self.active_streams.remove(id) {
            Some((_, token)) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

/// Removes a relay's cancellation token when the relay ends or is dropped.
pub struct ActiveStreamGuard {
    id: String,
    streams: Arc<DashMap<String, CancellationToken>>,
}

impl ActiveStreamGuard {
    pub fn register(
        streams: &Arc<DashMap<String, CancellationToken>>,
    ) -> (String, CancellationToken, ActiveStreamGuard) {
        let id = Uuid::new_v4().to_string();
        let token = CancellationToken::new();
        streams.insert(id.clone(), token.clone());

        let guard = ActiveStreamGuard {
            id: id.clone(),
            streams: streams.clone(),
        };
        (id, token, guard)
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Drop for ActiveStreamGuard {
    fn drop(&mut self) {
        self.streams.remove(&self.id);
    }
}
