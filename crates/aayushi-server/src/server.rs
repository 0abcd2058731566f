use actix_cors::Cors;
use actix_web::{error, web, App, HttpServer};
use std::io;

use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::handlers;
use crate::state::AppState;

/// Register the `/api` routes and JSON body handling on an app.
pub fn configure(cfg: &mut web::ServiceConfig) {
    let json = web::JsonConfig::default()
        .content_type_required(false)
        .error_handler(|err, _req| {
            log::warn!("Invalid JSON body: {}", err);
            error::Error::from(ApiError::InvalidInput(format!("Invalid request body: {}", err)))
        });

    cfg.app_data(json).service(
        web::scope("/api")
            .route("/chat", web::post().to(handlers::chat::handler))
            .route(
                "/chat/{request_id}/stop",
                web::post().to(handlers::stop::handler),
            )
            .route("/web", web::post().to(handlers::web::handler))
            .route("/health", web::get().to(handlers::health::handler)),
    );
}

pub async fn run_server(config: ServerConfig) -> io::Result<()> {
    config.warn_missing_keys();

    let state = web::Data::new(AppState::from_config(&config));
    let address = config.bind_address();
    log::info!("Starting Aayushi server on {}", address);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Cors::permissive())
            .configure(configure)
    })
    .bind(address)?
    .run()
    .await
}
