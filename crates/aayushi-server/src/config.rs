use clap::Parser;

/// Runtime settings for the proxy server, read from flags or the environment.
#[derive(Parser, Debug, Clone)]
#[command(name = "aayushi-server")]
#[command(about = "Completion and web search proxy for the Aayushi chat assistant")]
#[command(version)]
pub struct ServerConfig {
    /// Server port
    #[arg(long, env = "PORT", default_value = "3000")]
    pub port: u16,

    /// Interface to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Groq API key
    #[arg(long, env = "GROQ_API_KEY", default_value = "", hide_env_values = true)]
    pub groq_api_key: String,

    /// Completion API base URL
    #[arg(long, env = "GROQ_BASE_URL", default_value = "https://api.groq.com/openai/v1")]
    pub llm_base_url: String,

    /// Exa API key
    #[arg(long, env = "EXA_API_KEY", default_value = "", hide_env_values = true)]
    pub exa_api_key: String,

    /// Search API base URL
    #[arg(long, env = "EXA_BASE_URL", default_value = "https://api.exa.ai")]
    pub search_base_url: String,

    /// Enable debug logging
    #[arg(long, env = "DEBUG", default_value = "false")]
    pub debug: bool,

    /// Log level (overrides the debug flag)
    #[arg(long, env = "RUST_LOG")]
    pub log_level: Option<String>,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Log a warning for every provider credential that is missing.
    ///
    /// The server still starts; affected routes fail at request time.
    pub fn warn_missing_keys(&self) {
        if self.groq_api_key.trim().is_empty() {
            log::warn!("GROQ_API_KEY is not set, /api/chat requests will fail");
        }
        if self.exa_api_key.trim().is_empty() {
            log::warn!("EXA_API_KEY is not set, web search will return no results");
        }
    }
}
