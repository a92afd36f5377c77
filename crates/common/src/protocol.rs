//! Request and response types exchanged at the HTTP boundary.
//!
//! Encrypted bodies themselves travel as plain Base64 text, not JSON; these
//! types cover the JSON surfaces (errors, health).

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Error response
// ---------------------------------------------------------------------------

/// Standard error response body returned on any non-2xx status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Short machine-readable error code (e.g. `"bad_request"`).
    pub code: String,
    /// Human-readable description safe to expose to callers.
    pub message: String,
}

impl ErrorResponse {
    /// Construct an [`ErrorResponse`] from a code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Response body for `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Overall service status: `"ok"`.
    pub status: String,
    /// Name of the active cipher engine (e.g. `"aes-gcm"`).
    pub algorithm: String,
    /// Name of the active key source (e.g. `"static-config"`).
    pub key_source: String,
    /// Name of the active replay store (e.g. `"local"`).
    pub replay_store: String,
}
