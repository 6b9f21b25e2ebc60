//! High-level orchestration: submit, poll, resolve.
//!
//! [`JobOrchestrator`] owns a backend and a poll configuration and
//! drives jobs end to end. Resolved results are cached per job so that
//! resolving twice returns the original reference without touching the
//! backend again.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use formanova_core::types::{JobId, JobKind, JobState};

use crate::backend::JobBackend;
use crate::error::JobError;
use crate::job::Job;
use crate::poller::{poll_until_terminal, PollConfig, PollOutcome};
use crate::resolve::{HttpLocatorFetcher, LocatorFetcher, ResultReference};

/// Upper bound on remembered resolutions. An orchestrator can live for
/// the whole process, so the cache must not grow with every job it has
/// ever run.
const RESOLVED_CACHE_CAP: usize = 256;

/// Insertion-order bounded cache of resolved results.
struct ResolvedCache {
    cap: usize,
    entries: HashMap<JobId, ResultReference>,
    order: VecDeque<JobId>,
}

impl ResolvedCache {
    fn new(cap: usize) -> Self {
        Self {
            cap,
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    fn get(&self, job_id: &str) -> Option<&ResultReference> {
        self.entries.get(job_id)
    }

    /// Store a reference unless one is already present; the first
    /// stored reference stays authoritative. At capacity, the oldest
    /// entry is evicted. Returns whatever ends up cached.
    fn insert_first(&mut self, job_id: &str, reference: ResultReference) -> ResultReference {
        if let Some(existing) = self.entries.get(job_id) {
            return existing.clone();
        }
        if self.entries.len() >= self.cap {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
        self.order.push_back(job_id.to_string());
        self.entries.insert(job_id.to_string(), reference.clone());
        reference
    }
}

/// Drives jobs from submission through polling to a resolved result.
pub struct JobOrchestrator {
    backend: Arc<dyn JobBackend>,
    fetcher: Arc<dyn LocatorFetcher>,
    config: PollConfig,
    resolved: Mutex<ResolvedCache>,
}

impl JobOrchestrator {
    /// Orchestrator fetching locator content over plain HTTP.
    pub fn new(backend: Arc<dyn JobBackend>, config: PollConfig) -> Self {
        Self::with_fetcher(backend, Arc::new(HttpLocatorFetcher::new()), config)
    }

    /// Orchestrator with a custom locator fetcher (e.g. one that signs
    /// storage URIs before downloading).
    pub fn with_fetcher(
        backend: Arc<dyn JobBackend>,
        fetcher: Arc<dyn LocatorFetcher>,
        config: PollConfig,
    ) -> Self {
        Self {
            backend,
            fetcher,
            config,
            resolved: Mutex::new(ResolvedCache::new(RESOLVED_CACHE_CAP)),
        }
    }

    /// Submit a job payload and return the client-side record.
    pub async fn submit(
        &self,
        kind: JobKind,
        payload: &serde_json::Value,
    ) -> Result<Job, JobError> {
        let accepted = self.backend.submit(payload).await?;
        tracing::info!(job_id = %accepted.job_id, kind = kind.as_str(), "Job submitted");
        Ok(Job::new(accepted.job_id, kind))
    }

    /// Request cancellation of a job, marking it cancelled locally on
    /// success.
    pub async fn cancel(&self, job: &mut Job) -> Result<(), JobError> {
        if job.state.is_terminal() {
            return Ok(());
        }
        self.backend.cancel(&job.id).await?;
        job.mark_cancelled();
        tracing::info!(job_id = %job.id, "Job cancelled");
        Ok(())
    }

    /// Resolve the result of a completed job.
    ///
    /// The first call fetches the result payload from the backend and
    /// classifies it; every later call for the same job returns the
    /// cached reference unchanged, without another backend request.
    pub async fn resolve(&self, job_id: &str) -> Result<ResultReference, JobError> {
        {
            let resolved = self.resolved.lock().await;
            if let Some(reference) = resolved.get(job_id) {
                return Ok(reference.clone());
            }
        }

        let value = self.backend.result(job_id).await?;
        let reference = ResultReference::resolve(job_id, &value)?;

        // A concurrent resolve may have won the race; insert_first
        // keeps the first stored reference authoritative.
        let mut resolved = self.resolved.lock().await;
        Ok(resolved.insert_first(job_id, reference))
    }

    /// Resolve a completed job's result and download its content.
    ///
    /// Locators go through the orchestrator's fetcher; inline payloads
    /// are decoded locally.
    pub async fn fetch_result(&self, job_id: &str) -> Result<Vec<u8>, JobError> {
        let reference = self.resolve(job_id).await?;
        reference.content(self.fetcher.as_ref()).await
    }

    /// Submit a job and drive it to a resolved result.
    ///
    /// Polls until terminal, then resolves the result for completed
    /// jobs. Remote failure surfaces as [`JobError::RemoteFailure`],
    /// cancellation as [`JobError::Cancelled`], and an exhausted poll
    /// budget as [`JobError::PollTimeout`].
    pub async fn run_to_completion(
        &self,
        kind: JobKind,
        payload: &serde_json::Value,
        cancel: &CancellationToken,
    ) -> Result<(Job, ResultReference), JobError> {
        let mut job = self.submit(kind, payload).await?;
        let outcome = poll_until_terminal(
            self.backend.as_ref(),
            &mut job,
            &self.config,
            cancel,
            |_| {},
        )
        .await?;

        let report = match outcome {
            PollOutcome::Terminal(report) => report,
            PollOutcome::Cancelled { attempts } => {
                return Err(JobError::Cancelled { attempts })
            }
        };

        match job.state {
            JobState::Completed => {
                // Prefer a result carried inline on the final status
                // report over a second round trip.
                let reference = if let Some(value) = &report.result {
                    let reference = ResultReference::resolve(&job.id, value)?;
                    let mut resolved = self.resolved.lock().await;
                    resolved.insert_first(&job.id, reference)
                } else {
                    self.resolve(&job.id).await?
                };
                Ok((job, reference))
            }
            _ => Err(JobError::RemoteFailure {
                job_id: job.id.clone(),
                reason: job
                    .error
                    .clone()
                    .unwrap_or_else(|| format!("terminal status {}", report.status)),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::backend::SubmitResponse;
    use crate::resolve::ResultPayload;
    use crate::status::StatusReport;

    struct FakeBackend {
        statuses: Vec<&'static str>,
        result: serde_json::Value,
        status_calls: AtomicU32,
        result_calls: AtomicU32,
        cancel_calls: AtomicU32,
    }

    impl FakeBackend {
        fn new(statuses: Vec<&'static str>, result: serde_json::Value) -> Self {
            Self {
                statuses,
                result,
                status_calls: AtomicU32::new(0),
                result_calls: AtomicU32::new(0),
                cancel_calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl JobBackend for FakeBackend {
        async fn submit(&self, _payload: &serde_json::Value) -> Result<SubmitResponse, JobError> {
            Ok(SubmitResponse {
                job_id: "j-run".into(),
                status: Some("PENDING".into()),
            })
        }

        async fn status(&self, job_id: &str) -> Result<StatusReport, JobError> {
            let call = self.status_calls.fetch_add(1, Ordering::SeqCst) + 1;
            let idx = (call as usize - 1).min(self.statuses.len() - 1);
            Ok(serde_json::from_value(json!({
                "job_id": job_id,
                "status": self.statuses[idx],
            }))
            .unwrap())
        }

        async fn result(&self, _job_id: &str) -> Result<serde_json::Value, JobError> {
            self.result_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.result.clone())
        }

        async fn cancel(&self, _job_id: &str) -> Result<(), JobError> {
            self.cancel_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn orchestrator(backend: FakeBackend) -> JobOrchestrator {
        JobOrchestrator::new(
            Arc::new(backend),
            PollConfig {
                interval: Duration::from_millis(10),
                max_attempts: 10,
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn runs_to_resolved_result() {
        let orch = orchestrator(FakeBackend::new(
            vec!["RUNNING", "COMPLETED"],
            json!({"mask_uri": "https://blobs/mask.png"}),
        ));
        let cancel = CancellationToken::new();

        let (job, reference) = orch
            .run_to_completion(JobKind::Segmentation, &json!({}), &cancel)
            .await
            .unwrap();

        assert_eq!(job.state, JobState::Completed);
        assert_eq!(
            reference.payload,
            ResultPayload::Locator("https://blobs/mask.png".into())
        );
    }

    #[tokio::test]
    async fn double_resolve_hits_backend_once() {
        let backend = Arc::new(FakeBackend::new(
            vec!["COMPLETED"],
            json!({"result_uri": "https://blobs/out.png"}),
        ));
        let orch = JobOrchestrator::new(backend.clone(), PollConfig::default());

        let first = orch.resolve("j-run").await.unwrap();
        let second = orch.resolve("j-run").await.unwrap();

        assert_eq!(first.payload, second.payload);
        assert_eq!(first.resolved_at, second.resolved_at);
        assert_eq!(backend.result_calls.load(Ordering::SeqCst), 1);
    }

    struct RecordingFetcher {
        fetched: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl crate::resolve::LocatorFetcher for RecordingFetcher {
        async fn fetch(&self, uri: &str) -> Result<Vec<u8>, JobError> {
            self.fetched.lock().unwrap().push(uri.to_string());
            Ok(b"mask bytes".to_vec())
        }
    }

    #[tokio::test]
    async fn fetch_result_downloads_through_the_fetcher() {
        let backend = Arc::new(FakeBackend::new(
            vec!["COMPLETED"],
            json!({"mask_uri": "https://blobs/mask.png"}),
        ));
        let fetcher = Arc::new(RecordingFetcher {
            fetched: std::sync::Mutex::new(Vec::new()),
        });
        let orch =
            JobOrchestrator::with_fetcher(backend, fetcher.clone(), PollConfig::default());

        let content = orch.fetch_result("j-run").await.unwrap();
        assert_eq!(content, b"mask bytes");
        assert_eq!(
            fetcher.fetched.lock().unwrap().as_slice(),
            ["https://blobs/mask.png"]
        );
    }

    #[test]
    fn resolved_cache_evicts_oldest_beyond_capacity() {
        let mut cache = ResolvedCache::new(2);
        for i in 0..3 {
            let id = format!("j-{i}");
            let reference =
                ResultReference::resolve(&id, &json!({"mask_uri": "azure://masks/m.png"}))
                    .unwrap();
            cache.insert_first(&id, reference);
        }

        assert!(cache.get("j-0").is_none());
        assert!(cache.get("j-1").is_some());
        assert!(cache.get("j-2").is_some());
    }

    #[test]
    fn resolved_cache_keeps_first_reference() {
        let mut cache = ResolvedCache::new(2);
        let first =
            ResultReference::resolve("j-0", &json!({"mask_uri": "azure://masks/a.png"})).unwrap();
        let second =
            ResultReference::resolve("j-0", &json!({"mask_uri": "azure://masks/b.png"})).unwrap();

        cache.insert_first("j-0", first.clone());
        let stored = cache.insert_first("j-0", second);
        assert_eq!(stored.payload, first.payload);
    }

    #[tokio::test]
    async fn remote_failure_carries_reason() {
        let backend = FakeBackend::new(vec!["FAILED"], json!({}));
        let orch = JobOrchestrator::new(
            Arc::new(backend),
            PollConfig {
                interval: Duration::from_millis(1),
                max_attempts: 3,
            },
        );
        let cancel = CancellationToken::new();

        let err = orch
            .run_to_completion(JobKind::Pipeline, &json!({}), &cancel)
            .await
            .unwrap_err();
        assert_matches!(err, JobError::RemoteFailure { job_id, .. } if job_id == "j-run");
    }

    #[tokio::test]
    async fn completed_without_recognizable_result_is_no_result() {
        let backend = FakeBackend::new(vec!["COMPLETED"], json!({"done": true}));
        let orch = orchestrator(backend);
        let cancel = CancellationToken::new();

        let err = orch
            .run_to_completion(JobKind::BackgroundRemoval, &json!({}), &cancel)
            .await
            .unwrap_err();
        assert_matches!(err, JobError::NoResult { .. });
    }

    #[tokio::test]
    async fn cancel_marks_job_and_calls_backend_once() {
        let orch = orchestrator(FakeBackend::new(vec!["RUNNING"], json!({})));
        let mut job = Job::new("j-run".into(), JobKind::Segmentation);

        orch.cancel(&mut job).await.unwrap();
        assert_eq!(job.state, JobState::Cancelled);

        // Cancelling a terminal job is a no-op.
        orch.cancel(&mut job).await.unwrap();
        assert_eq!(job.state, JobState::Cancelled);
    }
}
