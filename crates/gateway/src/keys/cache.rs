//! TTL caching decorator for any [`KeySource`].
//!
//! Cache keys have the form `source:keyId:version`, with the literal marker
//! `"primary"` standing in for the version when the caller asked for the
//! primary slot. Because the primary's *version* changes on rotation, a
//! cached primary entry goes stale for up to one TTL after a rotation; that
//! staleness window is an accepted part of the contract, bounded by
//! `crypto.key_cache_ttl_secs` and cut short by [`CachedKeySource::invalidate`].
//!
//! Each cache key owns a slot guarded by its own async mutex, so concurrent
//! misses for the same key serialize on the slot and only the first caller
//! reaches the delegate (single-flight). Entries are written only after a
//! successful delegate return and are replaced wholesale, never mutated, so
//! a cancelled lookup leaves no partial state behind.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::{KeyDetail, KeyError, KeySource};

/// Version marker under which the primary key is cached.
pub const PRIMARY_MARKER: &str = "primary";

/// Cached key material in the shape the caller asked for it.
#[derive(Clone)]
enum CachedKey {
    /// Plain secret material from a versioned `fetch_key`.
    Secret(String),
    /// Full primary detail; also serves versionless `fetch_key` calls.
    Primary(KeyDetail),
}

struct CacheEntry {
    value: CachedKey,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_fresh(&self) -> bool {
        self.expires_at > Instant::now()
    }
}

type Slot = Arc<Mutex<Option<CacheEntry>>>;

/// Decorator composing a [`KeySource`] with a TTL cache.
///
/// Implements [`KeySource`] itself, so callers depend only on the trait;
/// this is the single caching layer for key material in the whole pipeline.
pub struct CachedKeySource {
    inner: Arc<dyn KeySource>,
    ttl: Duration,
    slots: DashMap<String, Slot>,
}

impl CachedKeySource {
    /// Wrap `inner` with a cache whose entries live for `ttl`.
    pub fn new(inner: Arc<dyn KeySource>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            slots: DashMap::new(),
        }
    }

    /// Drop every cached entry for `key_id`, forcing the next lookup through
    /// to the delegate. Used when a rotation must be observed before the TTL
    /// would expire naturally.
    pub fn invalidate(&self, key_id: &str) {
        let prefix = format!("{}:{}:", self.inner.name(), key_id);
        self.slots.retain(|cache_key, _| !cache_key.starts_with(&prefix));
    }

    fn cache_key(&self, key_id: &str, version: Option<&str>) -> String {
        format!(
            "{}:{}:{}",
            self.inner.name(),
            key_id,
            version.unwrap_or(PRIMARY_MARKER)
        )
    }

    fn slot(&self, cache_key: &str) -> Slot {
        // The map guard is dropped before any await point.
        self.slots.entry(cache_key.to_owned()).or_default().clone()
    }
}

#[async_trait]
impl KeySource for CachedKeySource {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn fetch_key<'a>(
        &self,
        key_id: &str,
        version: Option<&'a str>,
    ) -> Result<String, KeyError> {
        let slot = self.slot(&self.cache_key(key_id, version));
        let mut entry = slot.lock().await;

        if let Some(cached) = entry.as_ref() {
            if cached.is_fresh() {
                // A cached primary detail carries the secret too.
                return Ok(match &cached.value {
                    CachedKey::Secret(secret) => secret.clone(),
                    CachedKey::Primary(detail) => detail.secret_base64.clone(),
                });
            }
        }

        let secret = self.inner.fetch_key(key_id, version).await?;
        *entry = Some(CacheEntry {
            value: CachedKey::Secret(secret.clone()),
            expires_at: Instant::now() + self.ttl,
        });
        Ok(secret)
    }

    async fn fetch_primary(&self, key_id: &str) -> Result<KeyDetail, KeyError> {
        let slot = self.slot(&self.cache_key(key_id, None));
        let mut entry = slot.lock().await;

        if let Some(cached) = entry.as_ref() {
            // A plain secret in the primary slot lacks the version; treat it
            // as a miss and upgrade the entry to the full detail.
            if let (true, CachedKey::Primary(detail)) = (cached.is_fresh(), &cached.value) {
                return Ok(detail.clone());
            }
        }

        let detail = self.inner.fetch_primary(key_id).await?;
        *entry = Some(CacheEntry {
            value: CachedKey::Primary(detail.clone()),
            expires_at: Instant::now() + self.ttl,
        });
        Ok(detail)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::keys::MockKeySource;

    const TTL: Duration = Duration::from_secs(3600);

    fn detail(version: &str) -> KeyDetail {
        KeyDetail {
            version: version.into(),
            secret_base64: format!("material-{version}"),
        }
    }

    #[tokio::test]
    async fn hit_skips_the_delegate() {
        let mut mock = MockKeySource::new();
        mock.expect_name().return_const("mock");
        mock.expect_fetch_key()
            .times(1)
            .returning(|_, _| Ok("material-1".into()));

        let cached = CachedKeySource::new(Arc::new(mock), TTL);
        let first = cached.fetch_key("default-key", Some("1")).await.unwrap();
        let second = cached.fetch_key("default-key", Some("1")).await.unwrap();
        assert_eq!(first, "material-1");
        assert_eq!(second, "material-1");
    }

    #[tokio::test]
    async fn distinct_versions_are_cached_separately() {
        let mut mock = MockKeySource::new();
        mock.expect_name().return_const("mock");
        mock.expect_fetch_key()
            .times(2)
            .returning(|_, version| Ok(format!("material-{}", version.unwrap())));

        let cached = CachedKeySource::new(Arc::new(mock), TTL);
        assert_eq!(cached.fetch_key("k", Some("1")).await.unwrap(), "material-1");
        assert_eq!(cached.fetch_key("k", Some("2")).await.unwrap(), "material-2");
    }

    #[tokio::test]
    async fn delegate_errors_are_not_cached() {
        let mut mock = MockKeySource::new();
        mock.expect_name().return_const("mock");
        let calls = AtomicUsize::new(0);
        mock.expect_fetch_key().times(2).returning(move |_, _| {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(KeyError::Unavailable("backend down".into()))
            } else {
                Ok("material-1".into())
            }
        });

        let cached = CachedKeySource::new(Arc::new(mock), TTL);
        assert!(cached.fetch_key("k", Some("1")).await.is_err());
        // The failed lookup left no entry; the retry reaches the delegate.
        assert_eq!(cached.fetch_key("k", Some("1")).await.unwrap(), "material-1");
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entry_is_refetched() {
        let mut mock = MockKeySource::new();
        mock.expect_name().return_const("mock");
        mock.expect_fetch_primary()
            .times(2)
            .returning(|_| Ok(detail("1")));

        let cached = CachedKeySource::new(Arc::new(mock), Duration::from_secs(60));
        cached.fetch_primary("default-key").await.unwrap();
        tokio::time::advance(Duration::from_secs(61)).await;
        cached.fetch_primary("default-key").await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn entry_is_fresh_just_before_ttl() {
        let mut mock = MockKeySource::new();
        mock.expect_name().return_const("mock");
        mock.expect_fetch_primary()
            .times(1)
            .returning(|_| Ok(detail("1")));

        let cached = CachedKeySource::new(Arc::new(mock), Duration::from_secs(60));
        cached.fetch_primary("default-key").await.unwrap();
        tokio::time::advance(Duration::from_secs(59)).await;
        cached.fetch_primary("default-key").await.unwrap();
    }

    #[tokio::test]
    async fn cached_primary_serves_versionless_fetch_key() {
        let mut mock = MockKeySource::new();
        mock.expect_name().return_const("mock");
        mock.expect_fetch_primary()
            .times(1)
            .returning(|_| Ok(detail("3")));
        // No expect_fetch_key: a delegate call would panic the mock.

        let cached = CachedKeySource::new(Arc::new(mock), TTL);
        cached.fetch_primary("default-key").await.unwrap();
        let secret = cached.fetch_key("default-key", None).await.unwrap();
        assert_eq!(secret, "material-3");
    }

    #[tokio::test]
    async fn plain_secret_does_not_serve_fetch_primary() {
        let mut mock = MockKeySource::new();
        mock.expect_name().return_const("mock");
        mock.expect_fetch_key()
            .times(1)
            .returning(|_, _| Ok("material-3".into()));
        mock.expect_fetch_primary()
            .times(1)
            .returning(|_| Ok(detail("3")));

        let cached = CachedKeySource::new(Arc::new(mock), TTL);
        cached.fetch_key("default-key", None).await.unwrap();
        let primary = cached.fetch_primary("default-key").await.unwrap();
        assert_eq!(primary.version, "3");
    }

    #[tokio::test]
    async fn invalidate_forces_refetch() {
        let mut mock = MockKeySource::new();
        mock.expect_name().return_const("mock");
        mock.expect_fetch_primary()
            .times(2)
            .returning(|_| Ok(detail("1")));

        let cached = CachedKeySource::new(Arc::new(mock), TTL);
        cached.fetch_primary("default-key").await.unwrap();
        cached.invalidate("default-key");
        cached.fetch_primary("default-key").await.unwrap();
    }

    /// Delegate that records call counts and yields mid-fetch, so overlapping
    /// callers genuinely interleave.
    struct CountingSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl KeySource for CountingSource {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn fetch_key<'a>(
            &self,
            _key_id: &str,
            _version: Option<&'a str>,
        ) -> Result<String, KeyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok("material-1".into())
        }

        async fn fetch_primary(&self, _key_id: &str) -> Result<KeyDetail, KeyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(detail("1"))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_misses_are_single_flighted() {
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
        });
        let cached = Arc::new(CachedKeySource::new(source.clone(), TTL));

        let (a, b, c) = tokio::join!(
            cached.fetch_key("default-key", Some("1")),
            cached.fetch_key("default-key", Some("1")),
            cached.fetch_key("default-key", Some("1")),
        );
        assert_eq!(a.unwrap(), "material-1");
        assert_eq!(b.unwrap(), "material-1");
        assert_eq!(c.unwrap(), "material-1");
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }
}
