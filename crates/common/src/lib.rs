//! Common types, protocol definitions, and errors shared across gateway crates.

pub mod error;
pub mod protocol;

pub use error::GatewayError;
