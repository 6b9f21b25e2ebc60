//! Fixed-interval status polling with a hard attempt budget.
//!
//! The poller sleeps, asks the backend for status, folds the report
//! into the [`Job`], notifies the progress observer, and repeats until
//! the job reaches a terminal state, the attempt budget runs out, or
//! the [`CancellationToken`] is triggered. Status requests are strictly
//! sequential: a new one is never issued before the previous one
//! resolves. Cancellation wins over sleeping: a triggered token stops
//! the loop without issuing another request.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::backend::JobBackend;
use crate::error::JobError;
use crate::job::Job;
use crate::status::StatusReport;

/// Tunable parameters for the polling loop.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Delay between consecutive status requests.
    pub interval: Duration,
    /// Maximum number of status requests before giving up.
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_attempts: 300,
        }
    }
}

/// How a polling loop ended, short of an error.
#[derive(Debug)]
pub enum PollOutcome {
    /// The job reached a remote terminal state; the final report is
    /// attached.
    Terminal(StatusReport),
    /// The cancellation token fired first. The job is `Cancelled`;
    /// this is a resolution, not an error.
    Cancelled {
        /// Number of status requests issued before cancellation.
        attempts: u32,
    },
}

/// Poll a job until it reaches a terminal state.
///
/// Issues at most [`PollConfig::max_attempts`] status requests, one per
/// interval, invoking `on_progress` after each applied report. If the
/// budget runs out the job is marked timed out locally and
/// [`JobError::PollTimeout`] is returned; triggering `cancel` resolves
/// the job into `Cancelled` without error, and no further requests are
/// issued.
pub async fn poll_until_terminal(
    backend: &dyn JobBackend,
    job: &mut Job,
    config: &PollConfig,
    cancel: &CancellationToken,
    mut on_progress: impl FnMut(&Job),
) -> Result<PollOutcome, JobError> {
    let mut attempts = 0u32;

    while attempts < config.max_attempts {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!(job_id = %job.id, attempts, "Polling cancelled");
                job.mark_cancelled();
                return Ok(PollOutcome::Cancelled { attempts });
            }
            _ = tokio::time::sleep(config.interval) => {}
        }

        attempts += 1;
        // The request itself also races the token so an abort during a
        // slow round trip still resolves into Cancelled, not Failed.
        let report = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!(job_id = %job.id, attempts, "Polling cancelled mid-request");
                job.mark_cancelled();
                return Ok(PollOutcome::Cancelled { attempts });
            }
            result = backend.status(&job.id) => result?,
        };
        job.apply_report(&report);
        on_progress(job);

        tracing::debug!(
            job_id = %job.id,
            attempt = attempts,
            status = %report.status,
            progress = job.progress_percent,
            "Polled job status",
        );

        if job.state.is_terminal() {
            return Ok(PollOutcome::Terminal(report));
        }
    }

    tracing::warn!(
        job_id = %job.id,
        attempts,
        "Poll budget exhausted before terminal state",
    );
    job.mark_timed_out();
    Err(JobError::PollTimeout { attempts })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use formanova_core::types::{JobKind, JobState};

    use super::*;
    use crate::backend::SubmitResponse;

    /// Backend that replays a fixed sequence of status strings and
    /// counts every call, optionally cancelling a token after the n-th
    /// status request.
    struct ScriptedBackend {
        statuses: Vec<&'static str>,
        calls: AtomicU32,
        cancel_after: Option<(u32, CancellationToken)>,
    }

    impl ScriptedBackend {
        fn new(statuses: Vec<&'static str>) -> Self {
            Self {
                statuses,
                calls: AtomicU32::new(0),
                cancel_after: None,
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl JobBackend for ScriptedBackend {
        async fn submit(&self, _payload: &serde_json::Value) -> Result<SubmitResponse, JobError> {
            Ok(SubmitResponse {
                job_id: "j-1".into(),
                status: None,
            })
        }

        async fn status(&self, job_id: &str) -> Result<StatusReport, JobError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some((after, token)) = &self.cancel_after {
                if call >= *after {
                    token.cancel();
                }
            }
            let idx = (call as usize - 1).min(self.statuses.len() - 1);
            Ok(serde_json::from_value(serde_json::json!({
                "job_id": job_id,
                "status": self.statuses[idx],
            }))
            .unwrap())
        }

        async fn result(&self, _job_id: &str) -> Result<serde_json::Value, JobError> {
            Ok(serde_json::json!({}))
        }

        async fn cancel(&self, _job_id: &str) -> Result<(), JobError> {
            Ok(())
        }
    }

    fn fast_config(max_attempts: u32) -> PollConfig {
        PollConfig {
            interval: Duration::from_millis(10),
            max_attempts,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stops_on_terminal_state() {
        let backend = ScriptedBackend::new(vec!["RUNNING", "RUNNING", "COMPLETED"]);
        let mut job = Job::new("j-1".into(), JobKind::Segmentation);
        let cancel = CancellationToken::new();

        let outcome =
            poll_until_terminal(&backend, &mut job, &fast_config(10), &cancel, |_| {})
                .await
                .unwrap();

        assert_matches!(outcome, PollOutcome::Terminal(report) if report.status == "COMPLETED");
        assert_eq!(job.state, JobState::Completed);
        // No polls issued beyond the terminal one.
        assert_eq!(backend.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn invokes_progress_observer_per_poll() {
        let backend = ScriptedBackend::new(vec!["RUNNING", "RUNNING", "COMPLETED"]);
        let mut job = Job::new("j-1".into(), JobKind::Segmentation);
        let cancel = CancellationToken::new();

        let mut observed = Vec::new();
        poll_until_terminal(&backend, &mut job, &fast_config(10), &cancel, |job| {
            observed.push(job.state)
        })
        .await
        .unwrap();

        assert_eq!(
            observed,
            vec![JobState::Running, JobState::Running, JobState::Completed]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_budget_with_exact_attempt_count() {
        let backend = ScriptedBackend::new(vec!["RUNNING"]);
        let mut job = Job::new("j-1".into(), JobKind::Segmentation);
        let cancel = CancellationToken::new();

        let err = poll_until_terminal(&backend, &mut job, &fast_config(5), &cancel, |_| {})
            .await
            .unwrap_err();

        assert_matches!(err, JobError::PollTimeout { attempts: 5 });
        assert_eq!(backend.calls(), 5);
        assert_eq!(job.state, JobState::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn pre_cancelled_token_issues_no_requests() {
        let backend = ScriptedBackend::new(vec!["RUNNING"]);
        let mut job = Job::new("j-1".into(), JobKind::Segmentation);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = poll_until_terminal(&backend, &mut job, &fast_config(5), &cancel, |_| {})
            .await
            .unwrap();

        assert_matches!(outcome, PollOutcome::Cancelled { attempts: 0 });
        assert_eq!(job.state, JobState::Cancelled);
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_mid_polling_stops_further_requests() {
        let cancel = CancellationToken::new();
        let mut backend = ScriptedBackend::new(vec!["RUNNING"]);
        backend.cancel_after = Some((2, cancel.clone()));
        let mut job = Job::new("j-1".into(), JobKind::Segmentation);

        let outcome = poll_until_terminal(&backend, &mut job, &fast_config(10), &cancel, |_| {})
            .await
            .unwrap();

        assert_matches!(outcome, PollOutcome::Cancelled { attempts: 2 });
        assert_eq!(job.state, JobState::Cancelled);
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn five_polls_take_five_intervals() {
        let backend =
            ScriptedBackend::new(vec!["RUNNING", "RUNNING", "RUNNING", "RUNNING", "COMPLETED"]);
        let mut job = Job::new("j-1".into(), JobKind::Pipeline);
        let cancel = CancellationToken::new();
        let config = PollConfig {
            interval: Duration::from_secs(1),
            max_attempts: 10,
        };

        let start = tokio::time::Instant::now();
        poll_until_terminal(&backend, &mut job, &config, &cancel, |_| {})
            .await
            .unwrap();

        assert_eq!(backend.calls(), 5);
        assert_eq!(start.elapsed(), Duration::from_secs(5));
    }
}
