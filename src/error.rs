//! Rewards error types with HTTP status code mapping.
//!
//! [`RewardsError`] is the central error type for the service. Each variant
//! maps to a specific HTTP status code and structured JSON error response,
//! and carries a class used by the background pipeline to decide between
//! skipping a single log and retrying a whole batch on the next tick.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2001,
///     "message": "user not found: 0xabc...",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category         | HTTP Status               |
/// |-----------|------------------|---------------------------|
/// | 1000–1999 | Validation       | 400 Bad Request           |
/// | 2000–2999 | Not Found        | 404 Not Found             |
/// | 3000–3999 | Server           | 500 Internal Server Error |
/// | 5000–5999 | Upstream (chain) | 502 Bad Gateway           |
#[derive(Debug, thiserror::Error)]
pub enum RewardsError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No user exists for the given wallet address.
    #[error("user not found: {0}")]
    UserNotFound(String),

    /// No campaign has been configured yet.
    #[error("no campaign configured")]
    CampaignNotFound,

    /// Chain RPC failure (timeout, transport, node error).
    #[error("chain error: {0}")]
    Chain(String),

    /// A raw log could not be decoded into a swap.
    #[error("decode error: {0}")]
    Decode(String),

    /// A decoded swap could not be converted to a USD value.
    #[error("valuation error: {0}")]
    Valuation(String),

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RewardsError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::Decode(_) => 1002,
            Self::Valuation(_) => 1003,
            Self::UserNotFound(_) => 2001,
            Self::CampaignNotFound => 2002,
            Self::Internal(_) => 3000,
            Self::Persistence(_) => 3001,
            Self::Chain(_) => 5001,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::Decode(_) | Self::Valuation(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::UserNotFound(_) | Self::CampaignNotFound => StatusCode::NOT_FOUND,
            Self::Persistence(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Chain(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Transient infrastructure failure: the current batch must not be
    /// acknowledged and is retried on the next scheduled tick.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Chain(_) | Self::Persistence(_))
    }

    /// Failure confined to a single log: skip it and continue the batch.
    #[must_use]
    pub const fn is_skippable(&self) -> bool {
        matches!(self, Self::Decode(_) | Self::Valuation(_))
    }
}

impl From<sqlx::Error> for RewardsError {
    fn from(err: sqlx::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl IntoResponse for RewardsError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn classes_partition_pipeline_errors() {
        assert!(RewardsError::Chain("timeout".into()).is_transient());
        assert!(RewardsError::Persistence("reset".into()).is_transient());
        assert!(RewardsError::Decode("short data".into()).is_skippable());
        assert!(RewardsError::Valuation("empty swap".into()).is_skippable());
        assert!(!RewardsError::Decode("x".into()).is_transient());
        assert!(!RewardsError::Chain("x".into()).is_skippable());
    }

    #[test]
    fn not_found_maps_to_404() {
        let err = RewardsError::UserNotFound("0xabc".into());
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.error_code(), 2001);
    }

    #[test]
    fn chain_failure_maps_to_bad_gateway() {
        let err = RewardsError::Chain("rpc down".into());
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
    }
}
