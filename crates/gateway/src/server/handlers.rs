//! Axum request handlers for all service endpoints.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use common::protocol::{ErrorResponse, HealthResponse};

use super::error::ApiError;
use super::state::AppState;
use crate::replay::{NONCE_HEADER, TIMESTAMP_HEADER};

/// `POST /exchange` — the full inbound security pipeline.
///
/// 1. Replay guard over the `X-Nonce` / `X-Timestamp` headers.
/// 2. Decrypt the Base64 request body under the configured key slot.
/// 3. Business handling (a pass-through here; the real gateway forwards the
///    plaintext upstream at this point).
/// 4. Encrypt the response body under the current primary key.
///
/// Decrypt completes before step 3 and encrypt completes before the response
/// is written; dropping the connection abandons whichever step is pending.
pub async fn exchange(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let nonce = header_str(&headers, NONCE_HEADER);
    let timestamp = header_str(&headers, TIMESTAMP_HEADER);
    if let Err(e) = state.guard.check(nonce, timestamp).await {
        return ApiError::from(e).into_response();
    }

    let plaintext = match state.crypto.decrypt_from_transport(&body).await {
        Ok(p) => p,
        Err(e) => return ApiError::from(e).into_response(),
    };

    // Business handling happens here; this core echoes the plaintext back.
    let response_plaintext = plaintext;

    match state.crypto.encrypt_for_transport(&response_plaintext).await {
        Ok(wire) => (StatusCode::OK, wire).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// `GET /health` — liveness check reporting the active strategies.
pub async fn health(State(state): State<AppState>) -> Response {
    let body = HealthResponse {
        status: "ok".into(),
        algorithm: state.crypto.algorithm().into(),
        key_source: state.crypto.key_source().into(),
        replay_store: state.guard.store_name().into(),
    };
    (StatusCode::OK, Json(body)).into_response()
}

/// Catch-all 404 handler.
pub async fn not_found() -> impl IntoResponse {
    let err = ErrorResponse::new("not_found", "the requested resource does not exist");
    (StatusCode::NOT_FOUND, Json(err))
}

/// Header lookup is case-insensitive; non-UTF-8 values read as absent.
fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
