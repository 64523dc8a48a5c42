use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("failed to bind {0}: {1}")]
    Bind(String, std::io::Error),
    #[error("server error: {0}")]
    Server(String),
}

/// Handler failure, always rendered as a JSON body `{error, details?}`.
#[derive(Debug, Error)]
pub(crate) enum ApiError {
    /// Required request fields absent or empty. Nothing was mutated.
    #[error("{0}")]
    MissingInput(&'static str),
    /// Body could not be read as JSON for the endpoint.
    #[error("invalid request body")]
    Rejected { details: String },
    #[error("request body too large")]
    PayloadTooLarge { details: String },
    #[error("missing or invalid bearer token")]
    Unauthorized,
    #[error("too many requests")]
    RateLimited,
    /// Store and model are not ready yet.
    #[error("context store not initialized")]
    Uninitialized,
    #[error("{message}")]
    Internal {
        message: &'static str,
        details: String,
    },
}

impl ApiError {
    pub(crate) fn internal(message: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Internal {
            message,
            details: err.to_string(),
        }
    }

    /// Oversized bodies keep their 413; every other JSON rejection is a 400.
    pub(crate) fn rejected(rejection: &JsonRejection) -> Self {
        let details = rejection.body_text();
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge { details }
        } else {
            Self::Rejected { details }
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::MissingInput(_) | Self::Rejected { .. } => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Uninitialized | Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn details(&self) -> Option<&str> {
        match self {
            Self::Rejected { details }
            | Self::PayloadTooLarge { details }
            | Self::Internal { details, .. } => Some(details),
            Self::MissingInput(_) | Self::Unauthorized | Self::RateLimited | Self::Uninitialized => {
                None
            }
        }
    }
}

#[derive(serde::Serialize)]
struct ErrorBody<'a> {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a str>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(details = self.details(), "request failed: {self}");
        }
        let body = ErrorBody {
            error: self.to_string(),
            details: self.details(),
        };
        (status, Json(body)).into_response()
    }
}
