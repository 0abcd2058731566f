use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use aayushi_llm::{LLMError, SearchError};
use thiserror::Error;

/// Errors a route reports to its caller as `{"error": "..."}`.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Client-correctable request problem.
    #[error("{0}")]
    InvalidInput(String),

    /// A hosted provider failed; `status` is passed through when it has one.
    #[error("{message}")]
    Upstream {
        status: Option<u16>,
        message: String,
    },
}

impl From<LLMError> for ApiError {
    fn from(err: LLMError) -> Self {
        Self::Upstream {
            status: err.status(),
            message: err.to_string(),
        }
    }
}

impl From<SearchError> for ApiError {
    fn from(err: SearchError) -> Self {
        Self::Upstream {
            status: err.status(),
            message: err.to_string(),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Upstream { status, .. } => status
                .and_then(|s| StatusCode::from_u16(s).ok())
                .filter(|s| s.is_client_error() || s.is_server_error())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.to_string()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_input_is_bad_request() {
        let err = ApiError::InvalidInput("Invalid model selected".to_string());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn upstream_status_is_passed_through() {
        let err = ApiError::Upstream {
            status: Some(429),
            message: "slow down".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn upstream_without_usable_status_is_server_error() {
        let missing = ApiError::Upstream {
            status: None,
            message: "connection reset".to_string(),
        };
        let success = ApiError::Upstream {
            status: Some(200),
            message: "odd".to_string(),
        };
        assert_eq!(missing.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(success.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn llm_errors_keep_provider_status() {
        let err: ApiError = LLMError::Api {
            status: Some(401),
            message: "Invalid API key".to_string(),
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.to_string(), "API error: Invalid API key");
    }
}
