//! Key material sourcing, versioning, and caching.
//!
//! # Lifecycle
//!
//! 1. At startup, [`build_source`] resolves the configured key-source
//!    strategy and wraps it in the [`CachedKeySource`] decorator.
//! 2. Every key lookup goes through the decorator; only the decorator caches
//!    key material — there is deliberately no second caching path anywhere
//!    else in the pipeline.
//! 3. Rotation is observed when the cached primary entry expires (or is
//!    explicitly invalidated); older versions stay resolvable for decryption.
//!
//! # Security invariants
//!
//! - Key material is **never** logged, traced, or printed via `Debug`.
//! - A static configuration with zero or multiple primary entries for one
//!   key id refuses to start.

pub mod cache;
pub mod remote;
pub mod secrets_manager;
pub mod static_source;

pub use cache::CachedKeySource;
pub use remote::RemoteKeySource;
pub use secrets_manager::SecretsManagerKeySource;
pub use static_source::StaticKeySource;

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use thiserror::Error;

use crate::aws::AwsClients;
use crate::config::{CryptoConfig, KeySourceKind};

/// An immutable snapshot of one key version's material.
///
/// Produced by a [`KeySource`]; superseded by a new `KeyDetail` with a new
/// version, never mutated.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyDetail {
    /// Version label of this key (opaque to callers, ordered by the source).
    pub version: String,
    /// Base64-encoded key material.
    pub secret_base64: String,
}

impl std::fmt::Debug for KeyDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material — not even in debug builds.
        f.debug_struct("KeyDetail")
            .field("version", &self.version)
            .field("secret_base64", &"[REDACTED]")
            .finish()
    }
}

/// Errors produced by the key-source layer.
#[derive(Debug, Error)]
pub enum KeyError {
    /// The key id has no entry in the backing source.
    #[error("unknown key id: {0}")]
    UnknownKeyId(String),

    /// The key id exists but the requested version does not.
    #[error("unknown version {version} for key id {key_id}")]
    UnknownVersion { key_id: String, version: String },

    /// The backing source is unreachable. Propagated, never retried here:
    /// retrying a fetch that is actually a misconfiguration would mask a
    /// startup-time invariant violation.
    #[error("key source unavailable: {0}")]
    Unavailable(String),

    /// The source returned material this service cannot use.
    #[error("invalid key material: {0}")]
    InvalidMaterial(String),
}

/// Supplier of key material by id and version.
///
/// Implementations are stateless or lazily initialised and safe to share
/// across concurrent requests behind an `Arc`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KeySource: Send + Sync {
    /// Short stable name of this source (used in cache keys and health
    /// reporting).
    fn name(&self) -> &'static str;

    /// Fetch the base64 key material for `key_id` at `version`.
    ///
    /// When `version` is `None`, implementations fall back to the primary
    /// key's secret — used at decrypt time when the caller does not know
    /// which version encrypted a given envelope.
    ///
    /// The lifetime on `version` is named so the generated test mock can
    /// refer to it.
    async fn fetch_key<'a>(
        &self,
        key_id: &str,
        version: Option<&'a str>,
    ) -> Result<String, KeyError>;

    /// Fetch the current primary key (used for new encryptions).
    async fn fetch_primary(&self, key_id: &str) -> Result<KeyDetail, KeyError>;
}

/// Resolve the configured key-source strategy and wrap it in the caching
/// decorator.
///
/// `aws` must be `Some` when the `secret-manager` strategy is selected; the
/// caller initialises clients only for the strategies in use.
///
/// # Errors
///
/// Fails fast on an invalid static key set or missing backend settings for
/// the selected strategy.
pub fn build_source(cfg: &CryptoConfig, aws: Option<&AwsClients>) -> Result<Arc<CachedKeySource>> {
    let inner: Arc<dyn KeySource> = match cfg.key_source {
        KeySourceKind::StaticConfig => Arc::new(
            StaticKeySource::from_entries(&cfg.static_keys)
                .context("invalid static key configuration")?,
        ),
        KeySourceKind::RemoteService => {
            let base_url = cfg
                .remote_base_url
                .as_deref()
                .context("crypto.remote_base_url is required for the remote-service key source")?;
            Arc::new(RemoteKeySource::new(base_url))
        }
        KeySourceKind::SecretManager => {
            let clients = aws
                .context("AWS clients are required for the secret-manager key source")?;
            Arc::new(SecretsManagerKeySource::new(
                clients.secretsmanager.clone(),
                cfg.secret_prefix.clone(),
            ))
        }
    };

    Ok(Arc::new(CachedKeySource::new(inner, cfg.key_cache_ttl())))
}

#[cfg(test)]
mod tests {
    use super::*;

    // The generated mock must accept versioned and versionless lookups alike.
    #[tokio::test]
    async fn mock_source_handles_optional_version() {
        let mut mock = MockKeySource::new();
        mock.expect_fetch_key()
            .times(2)
            .returning(|_, version| Ok(format!("material-{}", version.unwrap_or("primary"))));

        let versioned = mock.fetch_key("default-key", Some("2")).await.unwrap();
        assert_eq!(versioned, "material-2");
        let fallback = mock.fetch_key("default-key", None).await.unwrap();
        assert_eq!(fallback, "material-primary");
    }
}
