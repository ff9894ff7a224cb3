//! Error types for conversion requests and extraction strategies
//!
//! `ExtractError` describes why one identifier could not be converted. It is
//! always turned into an error-shaped result, never propagated past the
//! fan-out boundary. `ServiceError` is the request-level taxonomy surfaced by
//! the HTTP layer.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Which limiter refused the request. Both map to 429; only the message differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitKind {
    /// The service's own per-caller limiter
    Platform,
    /// An upstream API reported it is throttling us
    Upstream,
}

/// Failure of a single extraction
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// The resource does not exist upstream
    #[error("Not found: {0}")]
    NotFound(String),

    /// The identifier has the right host but not a usable shape
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Upstream throttled us on every available path
    #[error("Upstream rate limit exceeded: {0}")]
    RateLimited(String),

    /// The rendering engine could not be made available
    #[error("Rendering engine unavailable: {0}")]
    EngineUnavailable(String),

    /// Upstream credentials were rejected after a refresh
    #[error("Upstream authentication failed: {0}")]
    UpstreamAuth(String),

    /// Every step of the extraction fallback chain failed
    #[error("Extraction failed: {0}")]
    Failed(String),

    /// Anything else, with the full diagnostic chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ExtractError {
    /// HTTP-like status for this failure.
    ///
    /// Timeouts are recognised by a timeout signature in the message, since
    /// browser and HTTP layers report them as plain text. Not-found is
    /// distinguished by message only.
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            Self::RateLimited(_) => 429,
            other if is_timeout_message(&format!("{other:#}")) => 504,
            _ => 500,
        }
    }

    /// Full diagnostic text including the anyhow context chain.
    #[must_use]
    pub fn details(&self) -> String {
        match self {
            Self::Other(e) => format!("{e:#}"),
            other => other.to_string(),
        }
    }
}

/// Whether failure text carries a timeout signature
#[must_use]
pub fn is_timeout_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("timeout") || lower.contains("timed out") || lower.contains("deadline")
}

/// Key-value store failures. The cache layer logs these and falls through to
/// the fetch, so a broken cache never fails a conversion.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache backend error: {0}")]
    Backend(String),

    #[error("Invalid TTL for key {key}")]
    InvalidTtl { key: String },
}

/// Failures of the LLM inference collaborator
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("LLM request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("LLM returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("LLM returned an empty completion")]
    EmptyCompletion,
}

/// Request-level failures surfaced to HTTP callers
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Missing or invalid url parameter: {0}")]
    Validation(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Rendering engine unavailable after {attempts} attempts")]
    ResourceUnavailable { attempts: u32 },

    #[error("{message}")]
    RateLimited { kind: RateLimitKind, message: String },

    #[error("Extraction failed for {url}: {message}")]
    Extraction {
        url: String,
        status: u16,
        message: String,
    },
}

impl ServiceError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Extraction { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            Self::ResourceUnavailable { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), "{self:#}");
        } else {
            tracing::debug!(status = status.as_u16(), "{self}");
        }

        let body = json!({
            "error": true,
            "status": status.as_u16(),
            "message": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_signature_maps_to_504() {
        let err = ExtractError::Other(anyhow::anyhow!("Navigation timeout after 30 seconds"));
        assert_eq!(err.status(), 504);
        let err = ExtractError::Failed("request timed out".into());
        assert_eq!(err.status(), 504);
    }

    #[test]
    fn generic_failures_map_to_500() {
        assert_eq!(ExtractError::Failed("boom".into()).status(), 500);
        assert_eq!(
            ExtractError::EngineUnavailable("gone".into()).status(),
            500
        );
        assert_eq!(ExtractError::RateLimited("slow down".into()).status(), 429);
    }

    #[test]
    fn details_include_context_chain() {
        let inner = anyhow::anyhow!("connection reset").context("Failed to load page");
        let err = ExtractError::Other(inner);
        let details = err.details();
        assert!(details.contains("Failed to load page"));
        assert!(details.contains("connection reset"));
    }
}
