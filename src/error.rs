use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Error, Debug)]
pub enum WeatherError {
    #[error("City '{0}' not found")]
    CityNotFound(String),
    #[error("Maximum number of cities allowed is {max}")]
    TooManyCities { max: usize },
    #[error("Too many requests. Please try again later.")]
    RateLimitExceeded,
    #[error("HTTP request for '{city}' failed: {source}")]
    UpstreamRequest {
        city: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Upstream returned HTTP {status} for '{city}'")]
    UpstreamStatus {
        city: String,
        status: reqwest::StatusCode,
    },
    #[error("JSON parsing for '{city}' failed: {source}")]
    UpstreamParse {
        city: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("HTTP client construction failed: {0}")]
    HttpClient(#[from] reqwest::Error),
}

impl WeatherError {
    pub fn status(&self) -> StatusCode {
        match self {
            WeatherError::CityNotFound(_) => StatusCode::NOT_FOUND,
            WeatherError::TooManyCities { .. } => StatusCode::BAD_REQUEST,
            WeatherError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            WeatherError::CityNotFound(_) => "CITY_NOT_FOUND",
            WeatherError::TooManyCities { .. } => "TOO_MANY_CITIES",
            WeatherError::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            _ => "INTERNAL_ERROR",
        }
    }
}

/// Error body returned by every failing API call.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: &str, message: &str) -> Self {
        Self {
            code: code.to_string(),
            message: message.to_string(),
        }
    }
}

impl IntoResponse for WeatherError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Upstream detail stays in the logs.
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "Request failed with internal error");
            "An internal error occurred".to_string()
        } else {
            self.to_string()
        };

        (status, Json(ErrorResponse::new(self.code(), &message))).into_response()
    }
}
