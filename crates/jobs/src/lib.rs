//! Asynchronous job orchestration client.
//!
//! Provides typed status parsing, HTTP backend wrappers, fixed-interval
//! polling with cancellation, result-shape resolution, and a high-level
//! orchestrator that drives a job from submission to a resolved result.

pub mod backend;
pub mod error;
pub mod job;
pub mod orchestrator;
pub mod poller;
pub mod resolve;
pub mod status;

pub use backend::{HttpJobBackend, JobBackend, SubmitResponse};
pub use error::JobError;
pub use job::Job;
pub use orchestrator::JobOrchestrator;
pub use poller::{poll_until_terminal, PollConfig, PollOutcome};
pub use resolve::{HttpLocatorFetcher, LocatorFetcher, ResultPayload, ResultReference};
pub use status::StatusReport;
