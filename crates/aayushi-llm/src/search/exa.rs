use aayushi_core::Source;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{normalize_result, SearchError, SearchProvider, SEARCH_RESULT_COUNT};

pub const DEFAULT_EXA_BASE_URL: &str = "https://api.exa.ai";

/// Exa neural search with page contents and highlights.
pub struct ExaSearchProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ExaSearchResponse {
    #[serde(default)]
    results: Vec<ExaResult>,
}

#[derive(Debug, Deserialize)]
struct ExaResult {
    title: Option<String>,
    url: String,
    text: Option<String>,
    #[serde(default)]
    highlights: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct ExaErrorBody {
    error: String,
}

impl ExaSearchProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_EXA_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn request_body(query: &str) -> serde_json::Value {
        serde_json::json!({
            "query": query,
            "numResults": SEARCH_RESULT_COUNT,
            "useAutoprompt": true,
            "contents": {
                "text": true,
                "highlights": true,
            },
        })
    }
}

#[async_trait]
impl SearchProvider for ExaSearchProvider {
    async fn search(&self, query: &str) -> Result<Vec<Source>, SearchError> {
        let url = format!("{}/search", self.base_url);
        log::debug!("Exa search: {}", query);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .json(&Self::request_body(query))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ExaErrorBody>(&text)
                .map(|body| body.error)
                .unwrap_or_else(|_| format!("HTTP {}", status));
            return Err(SearchError::Api {
                status: Some(status.as_u16()),
                message,
            });
        }

        let body: ExaSearchResponse = response.json().await?;

        let sources = body
            .results
            .iter()
            .take(SEARCH_RESULT_COUNT)
            .map(|r| {
                normalize_result(
                    r.title.as_deref(),
                    &r.url,
                    r.highlights.as_deref().unwrap_or_default(),
                    r.text.as_deref(),
                )
            })
            .collect();

        Ok(sources)
    }
}
