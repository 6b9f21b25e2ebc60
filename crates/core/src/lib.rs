//! Shared types for the FormaNova job-orchestration backend.
//!
//! This crate has zero internal dependencies so the job client, the blob
//! layer, and the proxy can all use the same vocabulary: job identity and
//! lifecycle states, the pipeline progress steps, user-marked points and
//! brush strokes, and the domain error type the HTTP layer maps to
//! responses.

pub mod error;
pub mod types;

pub use error::CoreError;
