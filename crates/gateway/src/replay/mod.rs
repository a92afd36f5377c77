//! Replay protection: nonce recording and the request validation pipeline.
//!
//! # Responsibilities
//!
//! - Provide the atomic insert-if-absent-with-TTL primitive over nonces
//!   ([`ReplayStore`]), in local and distributed flavours.
//! - Validate the `X-Nonce` / `X-Timestamp` headers of inbound requests
//!   ([`ReplayGuard`]).
//!
//! # Module invariants
//!
//! - **No crypto dependencies.** Replay checking and transport decryption are
//!   independent pipelines that share no state; this module must not import
//!   anything from `crate::crypto`, `crate::keys`, or `crate::transport`.

pub mod guard;
pub mod store;

pub use guard::{ReplayError, ReplayGuard, NONCE_HEADER, TIMESTAMP_HEADER};
pub use store::{DynamoReplayStore, LocalReplayStore, ReplayStore};

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::aws::AwsClients;
use crate::config::{ReplayConfig, ReplayStoreKind};

/// Resolve the configured replay-store strategy and build the guard.
///
/// `aws` must be `Some` when the `distributed` store is selected.
pub fn build_guard(cfg: &ReplayConfig, aws: Option<&AwsClients>) -> Result<Arc<ReplayGuard>> {
    let store: Arc<dyn ReplayStore> = match cfg.store {
        ReplayStoreKind::Local => Arc::new(LocalReplayStore::new()),
        ReplayStoreKind::Distributed => {
            let clients =
                aws.context("AWS clients are required for the distributed replay store")?;
            Arc::new(DynamoReplayStore::new(
                clients.dynamodb.clone(),
                cfg.nonce_table.clone(),
            ))
        }
    };
    Ok(Arc::new(ReplayGuard::new(store, cfg.ttl())))
}
