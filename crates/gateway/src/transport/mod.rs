//! Transport crypto orchestration: key resolution + cipher + wire encoding.
//!
//! [`TransportCryptoService`] is a stateless façade over exactly two
//! collaborators — the active [`CipherEngine`] and the [`CachedKeySource`]
//! decorator — selected once at startup. It performs no business logic and
//! owns no cache of its own; all key caching lives in the decorator.
//!
//! Cipher work is CPU-bound, so it is handed off the async reactor via
//! [`tokio::task::spawn_blocking`]; a burst of encryption cannot starve I/O
//! dispatch.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;

use crate::crypto::{CipherEngine, CipherError};
use crate::keys::{CachedKeySource, KeyError, KeySource};

/// Errors produced by the transport crypto layer.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The wire payload is not valid Base64. A client error, never retried.
    #[error("payload is not valid base64")]
    MalformedEncoding,

    /// The resolved key material is not valid Base64. Configuration defect.
    #[error("key material for key id {0} is not valid base64")]
    InvalidKeyMaterial(String),

    /// Cipher failure, including AEAD authentication failures.
    #[error(transparent)]
    Cipher(#[from] CipherError),

    /// Key resolution failure.
    #[error(transparent)]
    Key(#[from] KeyError),

    /// The blocking cipher task was cancelled or panicked.
    #[error("cipher task aborted")]
    TaskAborted,
}

/// Encrypts and decrypts wire payloads for one configured key slot.
pub struct TransportCryptoService {
    engine: Arc<dyn CipherEngine>,
    keys: Arc<CachedKeySource>,
    key_id: String,
}

impl TransportCryptoService {
    /// Assemble the service from its collaborators.
    ///
    /// Strategy resolution (engine by algorithm name, key source by kind)
    /// happens before this call and fails fast at startup; by construction
    /// the service can never hold an unregistered strategy.
    pub fn new(engine: Arc<dyn CipherEngine>, keys: Arc<CachedKeySource>, key_id: String) -> Self {
        Self { engine, keys, key_id }
    }

    /// Name of the active cipher engine.
    pub fn algorithm(&self) -> &'static str {
        self.engine.name()
    }

    /// Name of the active key source.
    pub fn key_source(&self) -> &'static str {
        self.keys.name()
    }

    /// Encrypt `plaintext` under the current primary key and Base64-encode
    /// the resulting envelope for the wire.
    pub async fn encrypt_for_transport(&self, plaintext: &[u8]) -> Result<String, TransportError> {
        let primary = self.keys.fetch_primary(&self.key_id).await?;
        let key = decode_key_material(&self.key_id, &primary.secret_base64)?;

        let engine = Arc::clone(&self.engine);
        let plaintext = plaintext.to_vec();
        let envelope = tokio::task::spawn_blocking(move || engine.encrypt(&plaintext, &key))
            .await
            .map_err(|_| TransportError::TaskAborted)??;

        Ok(STANDARD.encode(envelope))
    }

    /// Base64-decode `wire` and decrypt the envelope.
    ///
    /// The envelope does not carry a key version, so decryption resolves the
    /// key through the versionless fallback (the current primary). An
    /// authentication failure surfaces as [`CipherError::AuthenticationFailure`]
    /// and must be treated as a security violation by the caller.
    pub async fn decrypt_from_transport(&self, wire: &str) -> Result<Vec<u8>, TransportError> {
        let envelope = STANDARD
            .decode(wire.trim())
            .map_err(|_| TransportError::MalformedEncoding)?;

        let secret = self.keys.fetch_key(&self.key_id, None).await?;
        let key = decode_key_material(&self.key_id, &secret)?;

        let engine = Arc::clone(&self.engine);
        let plaintext = tokio::task::spawn_blocking(move || engine.decrypt(&envelope, &key))
            .await
            .map_err(|_| TransportError::TaskAborted)??;

        Ok(plaintext)
    }
}

fn decode_key_material(key_id: &str, secret_base64: &str) -> Result<Vec<u8>, TransportError> {
    STANDARD
        .decode(secret_base64)
        .map_err(|_| TransportError::InvalidKeyMaterial(key_id.to_owned()))
}
