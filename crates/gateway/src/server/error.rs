//! Mapping of module errors onto the HTTP status contract.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use common::protocol::ErrorResponse;
use common::GatewayError;
use tracing::{error, warn};

use crate::crypto::CipherError;
use crate::keys::KeyError;
use crate::replay::ReplayError;
use crate::transport::TransportError;

/// Response wrapper around [`GatewayError`] (the trait impl cannot live on
/// the `common` type directly).
pub struct ApiError(pub GatewayError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self.0 {
            // Security violations: warning level, minimal detail.
            GatewayError::Forbidden(msg) => warn!(reason = %msg, "request rejected"),
            GatewayError::Unavailable(msg) => error!(reason = %msg, "backend unavailable"),
            GatewayError::Internal(msg) => error!(reason = %msg, "internal error"),
            GatewayError::BadRequest(_) => {}
        }
        let status = StatusCode::from_u16(self.0.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorResponse::new(self.0.code(), self.0.to_string());
        (status, Json(body)).into_response()
    }
}

impl From<ReplayError> for ApiError {
    fn from(err: ReplayError) -> Self {
        let inner = match err {
            ReplayError::MissingHeader(_) | ReplayError::MalformedTimestamp => {
                GatewayError::BadRequest(err.to_string())
            }
            ReplayError::Expired | ReplayError::ReplayDetected => {
                GatewayError::Forbidden(err.to_string())
            }
            ReplayError::Store(e) => GatewayError::Unavailable(e.to_string()),
        };
        ApiError(inner)
    }
}

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        let inner = match &err {
            TransportError::MalformedEncoding => GatewayError::BadRequest(err.to_string()),
            // Indistinguishable wrong-key/tamper: a security violation.
            TransportError::Cipher(CipherError::AuthenticationFailure)
            | TransportError::Cipher(CipherError::TruncatedEnvelope) => {
                GatewayError::Forbidden("payload failed authentication".into())
            }
            TransportError::Key(KeyError::Unavailable(_)) => {
                GatewayError::Unavailable(err.to_string())
            }
            // Unknown key id/version or undecodable material is server-side
            // misconfiguration, not something the client can correct.
            TransportError::Key(_)
            | TransportError::InvalidKeyMaterial(_)
            | TransportError::Cipher(_)
            | TransportError::TaskAborted => GatewayError::Internal(err.to_string()),
        };
        ApiError(inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::store::ReplayStoreError;

    #[test]
    fn replay_errors_map_to_contract_statuses() {
        let e: ApiError = ReplayError::MissingHeader("x-nonce").into();
        assert_eq!(e.0.http_status(), 400);
        let e: ApiError = ReplayError::MalformedTimestamp.into();
        assert_eq!(e.0.http_status(), 400);
        let e: ApiError = ReplayError::Expired.into();
        assert_eq!(e.0.http_status(), 403);
        let e: ApiError = ReplayError::ReplayDetected.into();
        assert_eq!(e.0.http_status(), 403);
        let e: ApiError = ReplayError::Store(ReplayStoreError::Unavailable("down".into())).into();
        assert_eq!(e.0.http_status(), 503);
    }

    #[test]
    fn transport_errors_map_to_contract_statuses() {
        let e: ApiError = TransportError::MalformedEncoding.into();
        assert_eq!(e.0.http_status(), 400);
        let e: ApiError = TransportError::Cipher(CipherError::AuthenticationFailure).into();
        assert_eq!(e.0.http_status(), 403);
        let e: ApiError = TransportError::Key(KeyError::Unavailable("down".into())).into();
        assert_eq!(e.0.http_status(), 503);
        let e: ApiError = TransportError::Key(KeyError::UnknownKeyId("k".into())).into();
        assert_eq!(e.0.http_status(), 500);
    }

    #[test]
    fn authentication_failure_body_does_not_leak_detail() {
        let e: ApiError = TransportError::Cipher(CipherError::AuthenticationFailure).into();
        assert_eq!(e.0.to_string(), "forbidden: payload failed authentication");
    }
}
