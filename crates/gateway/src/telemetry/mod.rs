//! Tracing subscriber initialisation.

pub mod init;

pub use init::init_telemetry;
