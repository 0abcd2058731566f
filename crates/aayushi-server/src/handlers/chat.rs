use actix_web::http::header;
use actix_web::{web, HttpResponse};

use crate::completion::{
    build_completion_request, build_user_prompt, encode_sources_header, gather_sources,
    prompt_query, relay_tokens, web_query, ChatRequest,
};
use crate::error::ApiError;
use crate::state::AppState;

pub async fn handler(
    state: web::Data<AppState>,
    req: web::Json<ChatRequest>,
) -> Result<HttpResponse, ApiError> {
    let params = req.into_inner().validate().map_err(|e| {
        log::warn!("Rejected chat request: {}", e);
        e
    })?;

    let sources = match web_query(&params.message, params.use_web) {
        Some(query) => gather_sources(state.search.as_ref(), &query).await,
        None => Vec::new(),
    };

    let user_prompt = build_user_prompt(prompt_query(&params.message), &sources);
    let request = build_completion_request(&params, user_prompt);

    let upstream = state.llm.chat_stream(&request).await.map_err(|e| {
        log::error!("Completion provider request failed: {}", e);
        ApiError::from(e)
    })?;

    let (request_id, cancel, guard) = state.register_stream();
    log::info!(
        "[{}] Streaming {} completion with {} sources",
        request_id,
        params.model,
        sources.len()
    );

    Ok(HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .insert_header(("X-Sources", encode_sources_header(&sources)))
        .insert_header(("X-Request-Id", request_id))
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .streaming(relay_tokens(upstream, cancel, guard)))
}
