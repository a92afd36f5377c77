//! The [`CipherEngine`] contract and the algorithm registry.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::gcm::{AesGcmEngine, Sm4GcmEngine};

/// Byte length of a GCM IV (12 bytes = 96 bits).
pub const IV_LEN: usize = 12;

/// Byte length of a GCM authentication tag (16 bytes = 128 bits).
pub const TAG_LEN: usize = 16;

/// Errors produced by the cipher layer.
#[derive(Debug, Error)]
pub enum CipherError {
    /// The key material has the wrong length for the selected engine.
    #[error("invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    /// The envelope is too short to contain an IV and an authentication tag.
    #[error("ciphertext envelope is truncated")]
    TruncatedEnvelope,

    /// AEAD verification failed: wrong key or tampered IV/ciphertext/tag.
    /// Deliberately indistinguishable between the two causes.
    #[error("authentication failed")]
    AuthenticationFailure,

    /// The AEAD seal operation itself failed (unreachable with a valid key).
    #[error("aead operation failed")]
    AeadFailure,
}

/// Stateless authenticated encryption for one algorithm family.
///
/// Implementations are pure CPU work and hold no mutable state; a single
/// instance is shared across all requests behind an `Arc`.
pub trait CipherEngine: Send + Sync {
    /// Short stable name of this engine (used in health reporting and cache keys).
    fn name(&self) -> &'static str;

    /// Required key length in bytes.
    fn key_len(&self) -> usize;

    /// Seal `plaintext` under `key`, returning `IV || ciphertext || tag`.
    ///
    /// A fresh random IV is generated per call, so two calls with identical
    /// inputs produce different outputs.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::InvalidKeyLength`] if `key` is not
    /// [`CipherEngine::key_len`] bytes.
    fn encrypt(&self, plaintext: &[u8], key: &[u8]) -> Result<Vec<u8>, CipherError>;

    /// Open an `IV || ciphertext || tag` envelope, returning the plaintext.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::TruncatedEnvelope`] if the input cannot contain
    /// an IV and tag, and [`CipherError::AuthenticationFailure`] if the tag
    /// does not verify.
    fn decrypt(&self, envelope: &[u8], key: &[u8]) -> Result<Vec<u8>, CipherError>;
}

/// Cipher algorithm selected by configuration.
///
/// The serde names are the configuration values; an unknown name fails
/// configuration deserialisation at startup, so engine lookup itself is total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Algorithm {
    /// AES-256-GCM.
    #[default]
    #[serde(rename = "AES/GCM")]
    AesGcm,
    /// SM4-GCM (GB/T 32907 block cipher in GCM mode).
    #[serde(rename = "SM4/GCM")]
    Sm4Gcm,
}

/// Resolve the engine for `algorithm`.
///
/// Pure lookup, performed once at construction of the transport service —
/// never re-dispatched per request.
pub fn engine_for(algorithm: Algorithm) -> Arc<dyn CipherEngine> {
    match algorithm {
        Algorithm::AesGcm => Arc::new(AesGcmEngine),
        Algorithm::Sm4Gcm => Arc::new(Sm4GcmEngine),
    }
}
