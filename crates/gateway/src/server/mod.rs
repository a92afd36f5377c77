//! Axum HTTP server, routing, and middleware.
//!
//! # Responsibilities
//! - Define the Axum router with all routes and shared middleware.
//! - Run the per-request security pipeline: replay guard → decrypt →
//!   business handling → encrypt.
//! - Map module errors onto the HTTP status contract (400/403/5xx).

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;
