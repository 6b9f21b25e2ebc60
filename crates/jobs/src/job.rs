//! Client-side job record and its state machine.

use formanova_core::types::{JobId, JobKind, JobState, Timestamp, WorkflowStep};
use serde::Serialize;

use crate::status::StatusReport;

/// A job as tracked on the client side.
///
/// Terminal states trap: once a job is completed, failed, cancelled, or
/// timed out, later status reports are ignored. Progress only ever
/// moves forward; a backend reporting a smaller percentage than before
/// is clamped to the last observed value.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    /// Identifier assigned by the backend at submission.
    pub id: JobId,
    /// Which operation the job performs.
    pub kind: JobKind,
    /// Current state.
    pub state: JobState,
    /// Progress percentage in `[0, 100]`.
    pub progress_percent: f64,
    /// Current pipeline step, for multi-step workflows.
    pub current_step: Option<WorkflowStep>,
    /// Failure reason, once failed.
    pub error: Option<String>,
    /// When the job was submitted.
    pub created_at: Timestamp,
    /// When the job last changed.
    pub updated_at: Timestamp,
    /// When a status report was last folded in, changed or not.
    pub last_polled_at: Option<Timestamp>,
}

impl Job {
    /// Create a freshly submitted job in the pending state.
    pub fn new(id: JobId, kind: JobKind) -> Self {
        let now = chrono::Utc::now();
        Self {
            id,
            kind,
            state: JobState::Pending,
            progress_percent: 0.0,
            current_step: None,
            error: None,
            created_at: now,
            updated_at: now,
            last_polled_at: None,
        }
    }

    /// Fold a status report into the job record.
    ///
    /// Returns `true` if anything changed. Reports against a job already
    /// in a terminal state are ignored.
    pub fn apply_report(&mut self, report: &StatusReport) -> bool {
        // Even an ignored or unchanged report is evidence of a poll.
        self.last_polled_at = Some(chrono::Utc::now());

        if self.state.is_terminal() {
            return false;
        }

        let mut changed = false;
        let state = report.state();
        if state != self.state {
            self.state = state;
            changed = true;
        }

        if let Some(progress) = report.progress {
            let clamped = progress.clamp(0.0, 100.0);
            if clamped > self.progress_percent {
                self.progress_percent = clamped;
                changed = true;
            }
        }
        // Completion always means full progress, even if the final
        // report omitted the percentage.
        if self.state == JobState::Completed && self.progress_percent < 100.0 {
            self.progress_percent = 100.0;
            changed = true;
        }

        if report.current_step.is_some() && report.current_step != self.current_step {
            self.current_step = report.current_step;
            changed = true;
        }
        if report.error.is_some() && report.error != self.error {
            self.error = report.error.clone();
            changed = true;
        }

        if changed {
            self.updated_at = chrono::Utc::now();
        }
        changed
    }

    /// Mark the job cancelled locally (after a successful cancel request).
    pub fn mark_cancelled(&mut self) {
        if !self.state.is_terminal() {
            self.state = JobState::Cancelled;
            self.updated_at = chrono::Utc::now();
        }
    }

    /// Mark the job timed out locally (poll budget exhausted).
    pub fn mark_timed_out(&mut self) {
        if !self.state.is_terminal() {
            self.state = JobState::TimedOut;
            self.updated_at = chrono::Utc::now();
        }
    }
}
