//! Three-stage replay validation: presence → freshness → uniqueness.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use thiserror::Error;

use super::store::{ReplayStore, ReplayStoreError};

/// Request header carrying the client-generated replay nonce.
pub const NONCE_HEADER: &str = "x-nonce";

/// Request header carrying the request timestamp (epoch milliseconds).
pub const TIMESTAMP_HEADER: &str = "x-timestamp";

/// Terminal failures of the replay validation pipeline.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// A required header is absent. Client error.
    #[error("missing required header: {0}")]
    MissingHeader(&'static str),

    /// The timestamp header is not a decimal epoch-milliseconds value.
    /// Client error.
    #[error("timestamp header is not valid epoch milliseconds")]
    MalformedTimestamp,

    /// The timestamp lies outside the freshness window. Forbidden.
    #[error("request timestamp outside the freshness window")]
    Expired,

    /// The nonce has been seen before within the TTL window. Forbidden.
    #[error("nonce has already been used")]
    ReplayDetected,

    /// The backing store failed; the request cannot be judged.
    #[error(transparent)]
    Store(#[from] ReplayStoreError),
}

/// Validates the nonce/timestamp headers of inbound requests.
///
/// Holds no mutable state between invocations; one instance is shared across
/// all concurrent requests. The TTL serves double duty as the timestamp
/// freshness window and the nonce retention period, so a nonce outlives every
/// request that could legitimately carry it.
pub struct ReplayGuard {
    store: Arc<dyn ReplayStore>,
    ttl: Duration,
}

impl ReplayGuard {
    pub fn new(store: Arc<dyn ReplayStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Name of the backing store (for health reporting).
    pub fn store_name(&self) -> &'static str {
        self.store.name()
    }

    /// Run the validation pipeline against the request's header values.
    ///
    /// Each stage short-circuits: presence, then freshness, then uniqueness.
    /// The store is only consulted once the cheap local checks have passed,
    /// so malformed requests cost no backend round trip.
    pub async fn check(
        &self,
        nonce: Option<&str>,
        timestamp: Option<&str>,
    ) -> Result<(), ReplayError> {
        self.check_at(nonce, timestamp, now_millis()).await
    }

    async fn check_at(
        &self,
        nonce: Option<&str>,
        timestamp: Option<&str>,
        now_ms: i64,
    ) -> Result<(), ReplayError> {
        // Stage 1: presence.
        let nonce = nonce.ok_or(ReplayError::MissingHeader(NONCE_HEADER))?;
        let timestamp = timestamp.ok_or(ReplayError::MissingHeader(TIMESTAMP_HEADER))?;

        // Stage 2: freshness.
        let ts_ms: i64 = timestamp
            .trim()
            .parse()
            .map_err(|_| ReplayError::MalformedTimestamp)?;
        let skew = now_ms.abs_diff(ts_ms) as u128;
        if skew > self.ttl.as_millis() {
            return Err(ReplayError::Expired);
        }

        // Stage 3: uniqueness.
        if !self.store.insert_if_absent(nonce, self.ttl).await? {
            return Err(ReplayError::ReplayDetected);
        }
        Ok(())
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
