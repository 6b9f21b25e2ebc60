//! Formanova proxy server library.
//!
//! Exposes the core building blocks (config, state, error handling,
//! routes, auth middleware) so integration tests and the binary
//! entrypoint can both access them.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;
