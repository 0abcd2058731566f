use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: Option<String>,
}

pub async fn handler(
    state: web::Data<AppState>,
    req: web::Json<SearchRequest>,
) -> Result<HttpResponse, ApiError> {
    let query = req
        .into_inner()
        .query
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .ok_or_else(|| {
            ApiError::InvalidInput("Query is required and must be a non-empty string".to_string())
        })?;

    let sources = state.search.search(&query).await.map_err(|e| {
        log::error!("Web search for {:?} failed: {}", query, e);
        ApiError::from(e)
    })?;

    log::debug!("Web search for {:?} returned {} results", query, sources.len());
    Ok(HttpResponse::Ok().json(sources))
}
