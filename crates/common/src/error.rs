//! Common error types shared across crates.

use thiserror::Error;

/// Top-level gateway error type.
///
/// Variants map to HTTP status codes returned to callers:
/// - [`GatewayError::BadRequest`] → 400
/// - [`GatewayError::Forbidden`] → 403
/// - [`GatewayError::Unavailable`] → 503
/// - [`GatewayError::Internal`] → 500
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The request was malformed — missing header, bad timestamp, or invalid
    /// transport encoding. Never retried.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A security check failed — expired timestamp, replayed nonce, or an
    /// AEAD authentication failure. Never retried.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// A backing service (key source, replay store) is unreachable. An outer
    /// layer may retry with backoff; this core does not.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// An unexpected internal error occurred (including misconfiguration
    /// detected after startup).
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Returns the HTTP status code that should be sent for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            GatewayError::BadRequest(_) => 400,
            GatewayError::Forbidden(_) => 403,
            GatewayError::Unavailable(_) => 503,
            GatewayError::Internal(_) => 500,
        }
    }

    /// Short machine-readable code used in the JSON error body.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::BadRequest(_) => "bad_request",
            GatewayError::Forbidden(_) => "forbidden",
            GatewayError::Unavailable(_) => "service_unavailable",
            GatewayError::Internal(_) => "internal_error",
        }
    }
}
