//! Nonce stores: atomic insert-if-absent with TTL.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use dashmap::DashMap;
use thiserror::Error;
use tokio::time::Instant;

/// Errors produced by a replay store backend.
#[derive(Debug, Error)]
pub enum ReplayStoreError {
    /// The backing store is unreachable. Surfaced as 503, never retried here.
    #[error("replay store unavailable: {0}")]
    Unavailable(String),
}

/// Atomic "first sighting" recorder for nonces.
///
/// `insert_if_absent` must be atomic under concurrent callers — including
/// across process boundaries for implementations intended for multi-instance
/// deployments. No read-modify-write without atomicity.
#[async_trait]
pub trait ReplayStore: Send + Sync {
    /// Short stable name of this store (used in health reporting).
    fn name(&self) -> &'static str;

    /// Record `nonce` for `ttl`.
    ///
    /// Returns `true` if this is the first time the nonce has been seen
    /// within the TTL window, `false` if it is a replay.
    async fn insert_if_absent(&self, nonce: &str, ttl: Duration) -> Result<bool, ReplayStoreError>;
}

// ---------------------------------------------------------------------------
// Local (single-instance) store
// ---------------------------------------------------------------------------

/// How many inserts between amortized sweeps of expired entries.
const PURGE_EVERY: usize = 1024;

/// In-process replay store backed by an atomic expiry map.
///
/// Correct only within one instance: two gateway instances with separate
/// `LocalReplayStore`s will each accept the same nonce once. **Not safe for
/// horizontally scaled deployments** — use [`DynamoReplayStore`] there.
pub struct LocalReplayStore {
    seen: DashMap<String, Instant>,
    inserts: AtomicUsize,
}

impl LocalReplayStore {
    pub fn new() -> Self {
        Self {
            seen: DashMap::new(),
            inserts: AtomicUsize::new(0),
        }
    }

    /// Drop expired entries. Amortized over inserts so the map cannot grow
    /// unboundedly between quiet periods.
    fn maybe_purge(&self) {
        if self.inserts.fetch_add(1, Ordering::Relaxed) % PURGE_EVERY == PURGE_EVERY - 1 {
            let now = Instant::now();
            self.seen.retain(|_, expires_at| *expires_at > now);
        }
    }
}

impl Default for LocalReplayStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReplayStore for LocalReplayStore {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn insert_if_absent(&self, nonce: &str, ttl: Duration) -> Result<bool, ReplayStoreError> {
        self.maybe_purge();
        let now = Instant::now();
        // The entry guard makes the check-and-insert atomic per nonce.
        let first = match self.seen.entry(nonce.to_owned()) {
            dashmap::mapref::entry::Entry::Occupied(mut occupied) => {
                if *occupied.get() > now {
                    false
                } else {
                    // Expired sighting: the nonce may be recorded again.
                    occupied.insert(now + ttl);
                    true
                }
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(now + ttl);
                true
            }
        };
        Ok(first)
    }
}

// ---------------------------------------------------------------------------
// Distributed store
// ---------------------------------------------------------------------------

/// Replay store backed by DynamoDB conditional writes.
///
/// A nonce is recorded with a conditional `PutItem`:
///
/// ```text
/// attribute_not_exists(nonce) OR expires_at < :now
/// ```
///
/// The condition is evaluated atomically server-side, so the store is correct
/// under concurrent callers across gateway instances. The `expires_at`
/// attribute doubles as the table's item-TTL attribute; because DynamoDB
/// deletes expired items lazily, the condition re-checks expiry rather than
/// trusting deletion.
pub struct DynamoReplayStore {
    client: aws_sdk_dynamodb::Client,
    table: String,
}

impl DynamoReplayStore {
    /// Create a store writing to `table` (partition key: `nonce`, string).
    pub fn new(client: aws_sdk_dynamodb::Client, table: String) -> Self {
        Self { client, table }
    }
}

#[async_trait]
impl ReplayStore for DynamoReplayStore {
    fn name(&self) -> &'static str {
        "distributed"
    }

    async fn insert_if_absent(&self, nonce: &str, ttl: Duration) -> Result<bool, ReplayStoreError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| ReplayStoreError::Unavailable(e.to_string()))?
            .as_secs();
        let expires_at = now + ttl.as_secs();

        let result = self
            .client
            .put_item()
            .table_name(&self.table)
            .item("nonce", AttributeValue::S(nonce.to_owned()))
            .item("expires_at", AttributeValue::N(expires_at.to_string()))
            .condition_expression("attribute_not_exists(nonce) OR expires_at < :now")
            .expression_attribute_values(":now", AttributeValue::N(now.to_string()))
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(e) => {
                let service_err = e.into_service_error();
                if service_err.is_conditional_check_failed_exception() {
                    Ok(false)
                } else {
                    Err(ReplayStoreError::Unavailable(service_err.to_string()))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(300);

    #[tokio::test]
    async fn first_sighting_is_accepted_exactly_once() {
        let store = LocalReplayStore::new();
        assert!(store.insert_if_absent("abc123", TTL).await.unwrap());
        assert!(!store.insert_if_absent("abc123", TTL).await.unwrap());
        assert!(!store.insert_if_absent("abc123", TTL).await.unwrap());
    }

    #[tokio::test]
    async fn distinct_nonces_are_independent() {
        let store = LocalReplayStore::new();
        assert!(store.insert_if_absent("nonce-a", TTL).await.unwrap());
        assert!(store.insert_if_absent("nonce-b", TTL).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn nonce_is_accepted_again_after_expiry() {
        let store = LocalReplayStore::new();
        assert!(store.insert_if_absent("abc123", TTL).await.unwrap());
        tokio::time::advance(TTL + Duration::from_secs(1)).await;
        assert!(store.insert_if_absent("abc123", TTL).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn nonce_is_still_rejected_just_before_expiry() {
        let store = LocalReplayStore::new();
        assert!(store.insert_if_absent("abc123", TTL).await.unwrap());
        tokio::time::advance(TTL - Duration::from_secs(1)).await;
        assert!(!store.insert_if_absent("abc123", TTL).await.unwrap());
    }

    #[tokio::test]
    async fn concurrent_inserts_accept_exactly_one() {
        use std::sync::Arc;
        let store = Arc::new(LocalReplayStore::new());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.insert_if_absent("contended", TTL).await.unwrap()
            }));
        }
        let mut accepted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn purge_drops_expired_entries() {
        let store = LocalReplayStore::new();
        for i in 0..10 {
            store
                .insert_if_absent(&format!("nonce-{i}"), TTL)
                .await
                .unwrap();
        }
        tokio::time::advance(TTL + Duration::from_secs(1)).await;
        // Drive enough inserts to cross the purge threshold.
        for i in 0..PURGE_EVERY {
            store
                .insert_if_absent(&format!("later-{i}"), TTL)
                .await
                .unwrap();
        }
        assert!(store.seen.len() <= PURGE_EVERY);
        assert!(!store.seen.contains_key("nonce-0"));
    }
}
