//! In-process retry queue for analysis work. One job per email; retryable
//! failures back off exponentially until the attempt budget runs out, then
//! the job parks in a terminal `failed` state for operator review.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

#[derive(Debug)]
pub enum JobError {
    Retryable { message: String },
    Permanent { message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisJob {
    pub id: u64,
    pub email_id: i64,
    pub subject_hash: String,
    pub status: JobStatus,
    pub attempts: u32,
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub locked_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl AnalysisJob {
    pub fn new(email_id: i64, subject_hash: &str) -> Self {
        AnalysisJob {
            id: 0,
            email_id,
            subject_hash: subject_hash.to_string(),
            status: JobStatus::Pending,
            attempts: 0,
            next_attempt_at: None,
            last_error: None,
            locked_by: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }
}

/// Queue with bounded retries. The handler runs outside the queue: call
/// [`AnalysisQueue::begin_next`], do the (async) work, then feed the result
/// back through [`AnalysisQueue::resolve`].
pub struct AnalysisQueue {
    pub jobs: Vec<AnalysisJob>,
    next_id: u64,
    max_attempts: u32,
    backoff_base: Duration,
}

impl Default for AnalysisQueue {
    fn default() -> Self {
        AnalysisQueue::new(3, Duration::seconds(30))
    }
}

impl AnalysisQueue {
    pub fn new(max_attempts: u32, backoff_base: Duration) -> Self {
        AnalysisQueue {
            jobs: Vec::new(),
            next_id: 0,
            max_attempts: max_attempts.max(1),
            backoff_base,
        }
    }

    /// Enqueue unless the same email, or the same subject hash, is already
    /// in flight. Completed and failed duplicates do not block.
    pub fn enqueue(&mut self, mut job: AnalysisJob) -> bool {
        let blocked = self.jobs.iter().any(|existing| {
            !existing.status.is_terminal()
                && (existing.email_id == job.email_id
                    || existing.subject_hash == job.subject_hash)
        });
        if blocked {
            return false;
        }
        self.next_id += 1;
        job.id = self.next_id;
        self.jobs.push(job);
        true
    }

    /// Claim the oldest eligible pending job and mark it processing.
    pub fn begin_next(&mut self, worker_id: &str, now: DateTime<Utc>) -> Option<AnalysisJob> {
        let idx = self
            .jobs
            .iter()
            .enumerate()
            .filter(|(_, job)| {
                job.status == JobStatus::Pending
                    && job.next_attempt_at.map(|ts| ts <= now).unwrap_or(true)
            })
            .min_by_key(|(_, job)| job.id)
            .map(|(idx, _)| idx)?;

        let job = &mut self.jobs[idx];
        job.status = JobStatus::Processing;
        job.attempts += 1;
        job.locked_by = Some(worker_id.to_string());
        job.started_at = Some(now);
        Some(job.clone())
    }

    fn backoff_for(&self, attempts: u32) -> Duration {
        let factor = 1i64 << attempts.saturating_sub(1).min(16);
        self.backoff_base * factor as i32
    }

    /// Apply a handler outcome to a claimed job. Retryable errors requeue
    /// with backoff until `max_attempts`, then the job fails terminally.
    pub fn resolve(&mut self, job_id: u64, outcome: Result<(), JobError>) -> Option<JobStatus> {
        let now = Utc::now();
        let max_attempts = self.max_attempts;
        let backoff = {
            let job = self.jobs.iter().find(|j| j.id == job_id)?;
            self.backoff_for(job.attempts)
        };
        let job = self
            .jobs
            .iter_mut()
            .find(|j| j.id == job_id && j.status == JobStatus::Processing)?;

        match outcome {
            Ok(()) => {
                job.status = JobStatus::Completed;
                job.finished_at = Some(now);
                job.locked_by = None;
            }
            Err(JobError::Permanent { message }) => {
                job.status = JobStatus::Failed;
                job.last_error = Some(message);
                job.finished_at = Some(now);
                job.locked_by = None;
            }
            Err(JobError::Retryable { message }) => {
                job.last_error = Some(message);
                job.locked_by = None;
                if job.attempts >= max_attempts {
                    job.status = JobStatus::Failed;
                    job.finished_at = Some(now);
                } else {
                    job.status = JobStatus::Pending;
                    job.next_attempt_at = Some(now + backoff);
                    job.started_at = None;
                }
            }
        }
        Some(job.status)
    }

    pub fn pending_count(&self) -> usize {
        self.jobs
            .iter()
            .filter(|j| j.status == JobStatus::Pending)
            .count()
    }

    pub fn failed_jobs(&self) -> impl Iterator<Item = &AnalysisJob> {
        self.jobs.iter().filter(|j| j.status == JobStatus::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue() -> AnalysisQueue {
        AnalysisQueue::new(3, Duration::seconds(10))
    }

    #[test]
    fn completes_on_success() {
        let mut q = queue();
        q.enqueue(AnalysisJob::new(1, "hash-a"));

        let job = q.begin_next("worker-1", Utc::now()).unwrap();
        assert_eq!(job.attempts, 1);
        assert_eq!(job.locked_by.as_deref(), Some("worker-1"));

        let status = q.resolve(job.id, Ok(()));
        assert_eq!(status, Some(JobStatus::Completed));
        assert!(q.jobs[0].locked_by.is_none());
        assert!(q.jobs[0].finished_at.is_some());
    }

    #[test]
    fn retryable_backs_off_then_fails_terminally() {
        let mut q = queue();
        q.enqueue(AnalysisJob::new(1, "hash-a"));

        for attempt in 1..=3u32 {
            // Clear the backoff gate so the job is immediately eligible.
            if let Some(ts) = q.jobs[0].next_attempt_at {
                let job = q.begin_next("w", ts + Duration::seconds(1));
                assert!(job.is_some(), "attempt {attempt} not eligible");
            } else {
                assert!(q.begin_next("w", Utc::now()).is_some());
            }
            let status = q.resolve(
                q.jobs[0].id,
                Err(JobError::Retryable {
                    message: format!("boom {attempt}"),
                }),
            );
            if attempt < 3 {
                assert_eq!(status, Some(JobStatus::Pending));
            } else {
                assert_eq!(status, Some(JobStatus::Failed));
            }
        }
        assert_eq!(q.jobs[0].attempts, 3);
        assert_eq!(q.failed_jobs().count(), 1);
    }

    #[test]
    fn backoff_grows_exponentially() {
        let q = queue();
        assert_eq!(q.backoff_for(1), Duration::seconds(10));
        assert_eq!(q.backoff_for(2), Duration::seconds(20));
        assert_eq!(q.backoff_for(3), Duration::seconds(40));
    }

    #[test]
    fn backoff_gate_defers_retry() {
        let mut q = queue();
        q.enqueue(AnalysisJob::new(1, "hash-a"));
        let job = q.begin_next("w", Utc::now()).unwrap();
        q.resolve(
            job.id,
            Err(JobError::Retryable {
                message: "later".into(),
            }),
        );

        // Not eligible before the backoff expires.
        assert!(q.begin_next("w", Utc::now()).is_none());
        let eligible_at = q.jobs[0].next_attempt_at.unwrap() + Duration::seconds(1);
        assert!(q.begin_next("w", eligible_at).is_some());
    }

    #[test]
    fn permanent_error_fails_without_retry() {
        let mut q = queue();
        q.enqueue(AnalysisJob::new(1, "hash-a"));
        let job = q.begin_next("w", Utc::now()).unwrap();
        let status = q.resolve(
            job.id,
            Err(JobError::Permanent {
                message: "bad".into(),
            }),
        );
        assert_eq!(status, Some(JobStatus::Failed));
        assert_eq!(q.jobs[0].attempts, 1);
        assert_eq!(q.jobs[0].last_error.as_deref(), Some("bad"));
    }

    #[test]
    fn duplicate_email_or_subject_is_rejected_while_inflight() {
        let mut q = queue();
        assert!(q.enqueue(AnalysisJob::new(1, "hash-a")));
        assert!(!q.enqueue(AnalysisJob::new(1, "hash-b")));
        assert!(!q.enqueue(AnalysisJob::new(2, "hash-a")));

        let job = q.begin_next("w", Utc::now()).unwrap();
        q.resolve(job.id, Ok(()));

        // Terminal jobs no longer block duplicates.
        assert!(q.enqueue(AnalysisJob::new(1, "hash-a")));
    }

    #[test]
    fn resolve_ignores_unclaimed_jobs() {
        let mut q = queue();
        q.enqueue(AnalysisJob::new(1, "hash-a"));
        assert!(q.resolve(q.jobs[0].id, Ok(())).is_none());
        assert!(q.resolve(999, Ok(())).is_none());
        assert_eq!(q.pending_count(), 1);
    }
}
