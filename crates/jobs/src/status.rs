//! Typed parsing of remote status payloads.
//!
//! Backends report status under slightly different vocabularies: the
//! workflow gateway uses Temporal's SCREAMING_SNAKE execution statuses
//! while the model services use lowercase job statuses. Both funnel
//! into [`JobState`] here so the rest of the client sees one state
//! machine.

use formanova_core::types::{JobState, WorkflowStep};
use serde::Deserialize;

/// A status payload as returned by a backend's status endpoint.
///
/// The identifier field arrives as either `job_id` or `workflow_id`
/// depending on the backend; both deserialize into [`StatusReport::job_id`].
#[derive(Debug, Clone, Deserialize)]
pub struct StatusReport {
    /// Identifier the backend assigned at submission.
    #[serde(alias = "workflow_id", alias = "workflowId", alias = "jobId")]
    pub job_id: String,
    /// Raw status string as reported by the backend.
    pub status: String,
    /// Progress percentage in `[0, 100]`, when the backend reports it.
    #[serde(default)]
    pub progress: Option<f64>,
    /// Current pipeline step, for multi-step workflows.
    #[serde(default)]
    pub current_step: Option<WorkflowStep>,
    /// Failure reason, present when the job failed. Arrives as either a
    /// bare string or an `{"message": ...}` object.
    #[serde(default, deserialize_with = "error_message")]
    pub error: Option<String>,
    /// Inline result payload, present on some backends once complete.
    #[serde(default)]
    pub result: Option<serde_json::Value>,
}

impl StatusReport {
    /// The client-side state this report maps to.
    pub fn state(&self) -> JobState {
        map_status(&self.status)
    }
}

/// Accept `"error": "msg"` and `"error": {"message": "msg"}` alike.
fn error_message<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Object { message: String },
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(message) | Raw::Object { message } => message,
    }))
}

/// Map a backend status string onto the client state machine.
///
/// Unknown strings map to [`JobState::Running`]: a status we cannot
/// classify means the job is still in flight, and the poll budget
/// bounds how long we keep believing that.
pub fn map_status(status: &str) -> JobState {
    match status.to_ascii_uppercase().as_str() {
        "PENDING" | "QUEUED" | "SCHEDULED" => JobState::Pending,
        "RUNNING" | "PROCESSING" | "IN_PROGRESS" => JobState::Running,
        // A continued-as-new execution is the same logical job still going.
        "CONTINUED_AS_NEW" => JobState::Running,
        "COMPLETED" | "SUCCEEDED" | "SUCCESS" => JobState::Completed,
        "FAILED" | "ERROR" => JobState::Failed,
        // A remote-side timeout is a failure from the client's point of
        // view; TimedOut is reserved for our own poll budget.
        "TIMED_OUT" => JobState::Failed,
        "CANCELLED" | "CANCELED" => JobState::Cancelled,
        // Terminated executions were killed by an operator; surface as
        // cancelled rather than failed.
        "TERMINATED" => JobState::Cancelled,
        _ => JobState::Running,
    }
}
