//! Authenticated-encryption engines for transport payloads.
//!
//! This module is intentionally free of key-management and HTTP dependencies.
//! It provides the low-level seal/open operations used by the transport layer.
//!
//! # Envelope format
//!
//! ```text
//! IV (12 bytes) || ciphertext || authentication tag (16 bytes)
//! ```
//!
//! The IV is freshly random per encryption; reuse of a (key, IV) pair under
//! GCM breaks both confidentiality and authentication, so no caller may
//! supply its own IV.

pub mod engine;
pub mod gcm;

pub use engine::{engine_for, Algorithm, CipherEngine, CipherError, IV_LEN};
