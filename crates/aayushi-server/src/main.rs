use aayushi_server::{logging::init_logging, run_server, ServerConfig};
use clap::Parser;
use std::io;

#[actix_web::main]
async fn main() -> io::Result<()> {
    // A missing .env file is fine; real environment variables still apply.
    let _ = dotenvy::dotenv();
    let config = ServerConfig::parse();

    if config.log_level.is_some() {
        env_logger::init();
    } else {
        init_logging(config.debug);
    }

    log::debug!("Completion base URL: {}", config.llm_base_url);
    log::debug!("Search base URL: {}", config.search_base_url);

    run_server(config).await
}
