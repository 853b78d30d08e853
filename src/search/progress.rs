// ABOUTME: Registry of live search jobs keyed by job id
// ABOUTME: Monotonic progress, write-once terminal states, and time-based reclamation

use crate::{
    model::{JobSnapshot, JobStatus, ScoredResult},
    Error, Result,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

pub const DEFAULT_RETENTION: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
struct JobState {
    status: JobStatus,
    progress: u8,
    message: String,
    processed: usize,
    total: usize,
    results: Option<Vec<ScoredResult>>,
    error: Option<String>,
    error_code: Option<i32>,
    created_at: DateTime<Utc>,
    created: Instant,
}

impl JobState {
    fn new() -> Self {
        JobState {
            status: JobStatus::Initializing,
            progress: 0,
            message: JobStatus::Initializing.label().to_string(),
            processed: 0,
            total: 0,
            results: None,
            error: None,
            error_code: None,
            created_at: Utc::now(),
            created: Instant::now(),
        }
    }

    fn snapshot(&self, job_id: &str) -> JobSnapshot {
        JobSnapshot {
            job_id: job_id.to_string(),
            status: self.status,
            progress: self.progress,
            message: self.message.clone(),
            processed: self.processed,
            total: self.total,
            complete: self.status == JobStatus::Complete,
            results: self.results.clone(),
            error: self.error.clone(),
            error_code: self.error_code,
            created_at: self.created_at,
        }
    }
}

/// Partial update for a running job. Unset fields are left alone.
#[derive(Debug, Clone, Default)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub progress: Option<u8>,
    pub processed: Option<usize>,
    pub total: Option<usize>,
    pub message: Option<String>,
}

impl JobUpdate {
    pub fn status(status: JobStatus) -> Self {
        JobUpdate {
            status: Some(status),
            message: Some(status.label().to_string()),
            ..Default::default()
        }
    }

    pub fn progress(mut self, progress: u8) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn counts(mut self, processed: usize, total: usize) -> Self {
        self.processed = Some(processed);
        self.total = Some(total);
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

pub struct ProgressStore {
    jobs: DashMap<String, JobState>,
    retention: Duration,
}

impl ProgressStore {
    pub fn new(retention: Duration) -> Arc<Self> {
        Arc::new(ProgressStore {
            jobs: DashMap::new(),
            retention,
        })
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Registers a job and, inside a tokio runtime, schedules its removal
    /// once the retention window has passed.
    pub fn create(self: &Arc<Self>, job_id: &str) {
        let state = JobState::new();
        let created = state.created;
        self.jobs.insert(job_id.to_string(), state);

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let store: Weak<Self> = Arc::downgrade(self);
            let job_id = job_id.to_string();
            let retention = self.retention;
            handle.spawn(async move {
                tokio::time::sleep_until(created + retention).await;
                if let Some(store) = store.upgrade() {
                    if store
                        .jobs
                        .remove_if(&job_id, |_, state| state.created == created)
                        .is_some()
                    {
                        debug!(job_id, "reclaimed expired job");
                    }
                }
            });
        }
    }

    /// Applies `update` to a running job. Progress never moves backwards and
    /// terminal jobs are frozen. Returns false when nothing was applied.
    pub fn update(&self, job_id: &str, update: JobUpdate) -> bool {
        let Some(mut state) = self.jobs.get_mut(job_id) else {
            return false;
        };
        if state.status.is_terminal() {
            return false;
        }
        if let Some(status) = update.status {
            state.status = status;
        }
        if let Some(progress) = update.progress {
            state.progress = state.progress.max(progress.min(99));
        }
        if let Some(processed) = update.processed {
            state.processed = processed;
        }
        if let Some(total) = update.total {
            state.total = total;
        }
        if let Some(message) = update.message {
            state.message = message;
        }
        true
    }

    pub fn complete(&self, job_id: &str, results: Vec<ScoredResult>) -> bool {
        let Some(mut state) = self.jobs.get_mut(job_id) else {
            return false;
        };
        if state.status.is_terminal() {
            return false;
        }
        state.status = JobStatus::Complete;
        state.progress = 100;
        state.processed = state.total;
        state.message = format!("Found {} matching images", results.len());
        state.results = Some(results);
        true
    }

    pub fn fail(&self, job_id: &str, error: &Error) -> bool {
        let Some(mut state) = self.jobs.get_mut(job_id) else {
            return false;
        };
        if state.status.is_terminal() {
            return false;
        }
        state.status = JobStatus::Failed;
        state.message = JobStatus::Failed.label().to_string();
        state.error = Some(error.to_string());
        state.error_code = Some(error.exit_code());
        true
    }

    /// `JobNotFound` means expired or never issued; the two are indistinguishable.
    pub fn read(&self, job_id: &str) -> Result<JobSnapshot> {
        let expired = match self.jobs.get(job_id) {
            Some(state) if state.created.elapsed() < self.retention => {
                return Ok(state.snapshot(job_id));
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            self.jobs.remove(job_id);
        }
        Err(Error::JobNotFound(job_id.to_string()))
    }

    pub fn delete(&self, job_id: &str) -> bool {
        self.jobs.remove(job_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lifecycle() {
        let store = ProgressStore::new(DEFAULT_RETENTION);
        store.create("job-1");

        let snap = store.read("job-1").unwrap();
        assert_eq!(snap.status, JobStatus::Initializing);
        assert_eq!(snap.progress, 0);

        assert!(store.update(
            "job-1",
            JobUpdate::status(JobStatus::ProcessingBatches)
                .progress(30)
                .counts(0, 10)
        ));
        assert!(store.complete("job-1", vec![ScoredResult::new("/a.png".into(), 0.9)]));

        let snap = store.read("job-1").unwrap();
        assert!(snap.complete);
        assert_eq!(snap.progress, 100);
        assert_eq!(snap.processed, 10);
        assert_eq!(snap.results.unwrap().len(), 1);

        assert!(store.delete("job-1"));
        assert!(matches!(store.read("job-1"), Err(Error::JobNotFound(_))));
    }

    #[tokio::test]
    async fn test_progress_is_monotonic_and_below_100_until_complete() {
        let store = ProgressStore::new(DEFAULT_RETENTION);
        store.create("job");
        store.update("job", JobUpdate::default().progress(60));
        store.update("job", JobUpdate::default().progress(40));
        assert_eq!(store.read("job").unwrap().progress, 60);

        store.update("job", JobUpdate::default().progress(100));
        assert_eq!(store.read("job").unwrap().progress, 99);
    }

    #[tokio::test]
    async fn test_terminal_states_are_frozen() {
        let store = ProgressStore::new(DEFAULT_RETENTION);
        store.create("job");
        assert!(store.fail("job", &Error::FolderNotFound("/photos".into())));
        assert!(!store.update("job", JobUpdate::status(JobStatus::ProcessingBatches)));
        assert!(!store.complete("job", Vec::new()));

        let snap = store.read("job").unwrap();
        assert_eq!(snap.status, JobStatus::Failed);
        assert_eq!(snap.error.as_deref(), Some("Folder not found: /photos"));
        assert_eq!(snap.error_code, Some(3));
        assert!(!snap.complete);
    }

    #[tokio::test]
    async fn test_unknown_job_updates_are_ignored() {
        let store = ProgressStore::new(DEFAULT_RETENTION);
        assert!(!store.update("ghost", JobUpdate::default().progress(10)));
        assert!(!store.fail("ghost", &Error::Query("x".into())));
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reclaimer_removes_unread_job_after_retention() {
        let store = ProgressStore::new(Duration::from_secs(300));
        store.create("job");
        store.complete("job", Vec::new());

        tokio::time::sleep(Duration::from_secs(299)).await;
        assert!(store.read("job").is_ok());

        tokio::time::sleep(Duration::from_secs(2)).await;
        tokio::task::yield_now().await;
        assert_eq!(store.len(), 0);
        assert!(matches!(store.read("job"), Err(Error::JobNotFound(_))));
    }

    #[test]
    fn test_read_expires_without_runtime() {
        let store = ProgressStore::new(Duration::ZERO);
        // no runtime: no reclaimer task, read() enforces the window itself
        store.create("job");
        assert!(matches!(store.read("job"), Err(Error::JobNotFound(_))));
        assert!(store.is_empty());
    }
}
