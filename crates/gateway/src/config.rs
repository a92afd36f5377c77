//! Configuration loading and validation for the gateway security core.
//!
//! Values come from an optional TOML file (path in `GATEWAY_CONFIG`, default
//! `gateway.toml`) overlaid with `__`-separated environment variables, e.g.
//! `CRYPTO__ALGORITHM=SM4/GCM`. The process exits with a clear error message
//! if any value is missing or invalid for the selected strategies.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::crypto::Algorithm;

/// Key-source strategy selected by configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum KeySourceKind {
    /// Fixed key list from configuration; no I/O after startup.
    #[default]
    #[serde(rename = "static-config")]
    StaticConfig,
    /// External key-management HTTP endpoint.
    #[serde(rename = "remote-service")]
    RemoteService,
    /// AWS Secrets Manager with the transit-style export layout.
    #[serde(rename = "secret-manager")]
    SecretManager,
}

/// Replay-store strategy selected by configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum ReplayStoreKind {
    /// In-process store; single-instance deployments only.
    #[default]
    #[serde(rename = "local")]
    Local,
    /// DynamoDB-backed store; correct under multiple instances.
    #[serde(rename = "distributed")]
    Distributed,
}

/// One key version in the static key list.
#[derive(Debug, Clone, Deserialize)]
pub struct StaticKeyEntry {
    /// Logical key slot this version belongs to.
    #[serde(default = "default_key_id")]
    pub key_id: String,
    /// Version label, unique within the key id.
    pub version: String,
    /// Base64-encoded key material.
    pub secret: String,
    /// Whether this version is used for new encryptions. Exactly one entry
    /// per key id must set this.
    #[serde(default)]
    pub primary: bool,
}

/// Transport-encryption settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CryptoConfig {
    /// Cipher algorithm: `AES/GCM` or `SM4/GCM`.
    #[serde(default)]
    pub algorithm: Algorithm,

    /// Key-source strategy.
    #[serde(default)]
    pub key_source: KeySourceKind,

    /// Logical key slot used for transport encryption.
    #[serde(default = "default_key_id")]
    pub key_id: String,

    /// How long (seconds) resolved key material stays cached. Also bounds
    /// how long a rotation can go unobserved.
    #[serde(default = "default_key_cache_ttl")]
    pub key_cache_ttl_secs: u64,

    /// Key list for the `static-config` source.
    #[serde(default)]
    pub static_keys: Vec<StaticKeyEntry>,

    /// Base URL of the key-management endpoint (`remote-service` source).
    #[serde(default)]
    pub remote_base_url: Option<String>,

    /// Secret-name prefix for the `secret-manager` source.
    #[serde(default = "default_secret_prefix")]
    pub secret_prefix: String,
}

impl CryptoConfig {
    pub fn key_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.key_cache_ttl_secs)
    }
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::default(),
            key_source: KeySourceKind::default(),
            key_id: default_key_id(),
            key_cache_ttl_secs: default_key_cache_ttl(),
            static_keys: Vec::new(),
            remote_base_url: None,
            secret_prefix: default_secret_prefix(),
        }
    }
}

/// Replay-protection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplayConfig {
    /// Freshness window and nonce retention period, in seconds.
    #[serde(default = "default_replay_ttl")]
    pub ttl_secs: u64,

    /// Replay-store strategy.
    #[serde(default)]
    pub store: ReplayStoreKind,

    /// DynamoDB table for the `distributed` store (partition key `nonce`).
    #[serde(default = "default_nonce_table")]
    pub nonce_table: String,
}

impl ReplayConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_replay_ttl(),
            store: ReplayStoreKind::default(),
            nonce_table: default_nonce_table(),
        }
    }
}

/// Validated gateway configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crypto: CryptoConfig,

    #[serde(default)]
    pub replay: ReplayConfig,

    /// Port the HTTP server listens on.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_key_id() -> String {
    "default-key".into()
}
fn default_key_cache_ttl() -> u64 {
    3600
}
fn default_secret_prefix() -> String {
    "gateway/keys/".into()
}
fn default_replay_ttl() -> u64 {
    300
}
fn default_nonce_table() -> String {
    "gateway-nonces".into()
}
fn default_listen_port() -> u16 {
    8080
}
fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load and validate configuration from the file + environment overlay.
    ///
    /// # Errors
    ///
    /// Returns an error if a value cannot be parsed (including unknown
    /// strategy or algorithm names) or fails [`Config::validate`].
    pub fn load() -> Result<Self> {
        let file = std::env::var("GATEWAY_CONFIG").unwrap_or_else(|_| "gateway".into());
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(&file).required(false))
            .add_source(config::Environment::default().separator("__"))
            .build()
            .context("failed to build configuration")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        c.validate()?;
        Ok(c)
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    pub fn validate(&self) -> Result<()> {
        if self.crypto.key_id.trim().is_empty() {
            anyhow::bail!("crypto.key_id must not be empty");
        }
        if self.crypto.key_cache_ttl_secs == 0 {
            anyhow::bail!("crypto.key_cache_ttl_secs must be > 0");
        }
        if self.replay.ttl_secs == 0 {
            anyhow::bail!("replay.ttl_secs must be > 0");
        }
        match self.crypto.key_source {
            KeySourceKind::StaticConfig if self.crypto.static_keys.is_empty() => {
                anyhow::bail!("crypto.static_keys is required for the static-config key source");
            }
            KeySourceKind::RemoteService if self.crypto.remote_base_url.is_none() => {
                anyhow::bail!(
                    "crypto.remote_base_url is required for the remote-service key source"
                );
            }
            _ => {}
        }
        if self.replay.store == ReplayStoreKind::Distributed
            && self.replay.nonce_table.trim().is_empty()
        {
            anyhow::bail!("replay.nonce_table is required for the distributed replay store");
        }
        Ok(())
    }

    /// Whether any configured strategy needs AWS SDK clients.
    pub fn needs_aws(&self) -> bool {
        self.crypto.key_source == KeySourceKind::SecretManager
            || self.replay.store == ReplayStoreKind::Distributed
    }
}
