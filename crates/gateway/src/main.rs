//! `gateway` — security-core binary entry point.
//!
//! Startup sequence:
//! 1. Load and validate [`Config`] from file + environment.
//! 2. Initialise the tracing pipeline.
//! 3. Initialise AWS SDK clients if a configured strategy needs them.
//! 4. Build the key source, caching decorator, cipher engine, and
//!    [`TransportCryptoService`] (fail-fast on invalid key configuration).
//! 5. Build the replay store and [`ReplayGuard`].
//! 6. Build the Axum router and start the server.

mod aws;
mod config;
mod crypto;
mod keys;
mod replay;
mod server;
mod telemetry;
mod transport;

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use config::Config;
use keys::KeySource as _;
use server::state::AppState;
use transport::TransportCryptoService;

#[tokio::main]
async fn main() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let cfg = Config::load().map_err(|e| {
        // Telemetry is not yet up; write to stderr directly.
        eprintln!("ERROR: configuration invalid: {e}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    telemetry::init_telemetry(&cfg.log_level)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        listen_port = cfg.listen_port,
        "gateway security core starting"
    );

    // -----------------------------------------------------------------------
    // 3. AWS clients (only for AWS-backed strategies)
    // -----------------------------------------------------------------------
    let aws_clients = if cfg.needs_aws() {
        Some(aws::AwsClients::init().await?)
    } else {
        None
    };

    // -----------------------------------------------------------------------
    // 4. Transport crypto
    // -----------------------------------------------------------------------
    let key_source = keys::build_source(&cfg.crypto, aws_clients.as_ref())?;
    let engine = crypto::engine_for(cfg.crypto.algorithm);
    info!(
        algorithm = engine.name(),
        key_source = key_source.name(),
        key_id = %cfg.crypto.key_id,
        "transport crypto configured"
    );
    let crypto_service = Arc::new(TransportCryptoService::new(
        engine,
        key_source,
        cfg.crypto.key_id.clone(),
    ));

    // -----------------------------------------------------------------------
    // 5. Replay protection
    // -----------------------------------------------------------------------
    let guard = replay::build_guard(&cfg.replay, aws_clients.as_ref())?;
    info!(
        replay_store = guard.store_name(),
        ttl_secs = cfg.replay.ttl_secs,
        "replay protection configured"
    );

    // -----------------------------------------------------------------------
    // 6. HTTP server
    // -----------------------------------------------------------------------
    let state = AppState::new(crypto_service, guard);
    let router = server::router::build(state);

    let addr: std::net::SocketAddr = ([0, 0, 0, 0], cfg.listen_port).into();
    info!(addr = %addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
