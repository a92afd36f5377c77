//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use crate::replay::ReplayGuard;
use crate::transport::TransportCryptoService;

/// Application state shared across all request handlers.
///
/// Both collaborators are stateless beyond their internal caches and are
/// shared behind `Arc`s, so cloning the state per request is cheap.
#[derive(Clone)]
pub struct AppState {
    /// Transport encryption/decryption façade.
    pub crypto: Arc<TransportCryptoService>,
    /// Replay validation pipeline.
    pub guard: Arc<ReplayGuard>,
}

impl AppState {
    pub fn new(crypto: Arc<TransportCryptoService>, guard: Arc<ReplayGuard>) -> Self {
        Self { crypto, guard }
    }
}
