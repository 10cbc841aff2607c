use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

/// Error taxonomy for the generation pipeline.
///
/// Every variant maps to one HTTP status at the request boundary; nothing
/// here is retried automatically.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Upstream LLM call failed (network, auth, quota, vendor 4xx/5xx).
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("unknown provider '{requested}'. Valid options: {valid}")]
    UnknownProvider { requested: String, valid: String },

    /// Model output could not be coerced into JSON after all recovery steps.
    #[error("model response is not valid JSON: {reason}")]
    MalformedResponse { reason: String, excerpt: String },

    /// A resolved path escapes the project source root. Never repaired.
    #[error("unsafe path: {0}")]
    UnsafePath(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Empty plan, or an executed batch that produced zero files overall.
    #[error("{0}")]
    EmptyResult(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("API key not configured for provider '{0}'")]
    MissingApiKey(String),

    #[error("request to {provider} failed: {source}")]
    Transport {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} API error (HTTP {status}): {detail}")]
    Api {
        provider: &'static str,
        status: u16,
        detail: String,
    },

    #[error("unexpected {provider} response shape: {message}")]
    Shape {
        provider: &'static str,
        message: String,
    },
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::UnsafePath(_) | AppError::BadRequest(_) | AppError::UnknownProvider { .. } => {
                StatusCode::BAD_REQUEST
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Provider(_)
            | AppError::MalformedResponse { .. }
            | AppError::EmptyResult(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            AppError::Provider(_) => "provider_error",
            AppError::UnknownProvider { .. } => "unknown_provider",
            AppError::MalformedResponse { .. } => "malformed_response",
            AppError::UnsafePath(_) => "unsafe_path",
            AppError::NotFound(_) => "not_found",
            AppError::EmptyResult(_) => "empty_result",
            AppError::BadRequest(_) => "bad_request",
            AppError::Internal(_) => "internal_error",
        }
    }

    fn details(&self) -> Option<Value> {
        match self {
            AppError::MalformedResponse { excerpt, .. } => Some(json!({ "excerpt": excerpt })),
            AppError::Provider(ProviderError::Api { status, detail, .. }) => {
                Some(json!({ "upstream_status": status, "upstream_body": detail }))
            }
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::warn!(error = %self, "request rejected");
        }

        let mut body = json!({
            "error": self.kind(),
            "message": self.to_string(),
        });
        if let Some(details) = self.details() {
            body["details"] = details;
        }
        (status, Json(body)).into_response()
    }
}
