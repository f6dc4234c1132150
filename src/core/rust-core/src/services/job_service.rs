use std::collections::HashMap;
use std::sync::{Arc, RwLock as StdRwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::errors::{NexusError, Result};

/// A long-running background operation, e.g. an export.
#[derive(Clone, Debug, Serialize)]
pub struct Job {
    /// The job identifier.
    pub id: Uuid,

    /// The owning user.
    pub owner: String,

    /// The job type, e.g. `export` or `clear-cache`.
    pub r#type: String,

    /// The job parameters.
    pub parameters: Value,
}

/// The lifecycle state of a job.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum JobStatusKind {
    /// The job is running.
    Running,

    /// The job finished successfully.
    Succeeded,

    /// The job was cancelled.
    Cancelled,

    /// The job failed.
    Failed,
}

/// A point-in-time view of a job.
#[derive(Clone, Debug, Serialize)]
pub struct JobStatus {
    /// When the job started.
    pub start: DateTime<Utc>,

    /// The lifecycle state.
    pub status: JobStatusKind,

    /// The progress between 0 and 1.
    pub progress: f64,

    /// The result value of a succeeded job.
    pub result: Option<Value>,

    /// The error message of a failed job.
    pub error_message: Option<String>,
}

/// Reports job progress between 0 and 1.
pub type JobProgress = Arc<dyn Fn(f64) + Send + Sync>;

struct JobControl {
    job: Job,
    status: Arc<StdRwLock<JobStatus>>,
    cancellation_token: CancellationToken,
}

/// The in-process job registry: spawns job tasks, tracks their status and
/// progress and cancels them on request.
#[derive(Default)]
pub struct JobService {
    jobs: RwLock<HashMap<Uuid, JobControl>>,
}

impl JobService {
    /// Creates the registry.
    pub fn new() -> Self {
        JobService::default()
    }

    /// Registers and spawns a job. The work receives a progress reporter
    /// and a cancellation token it must observe at suspension points.
    pub async fn add_job<F, Fut>(&self, job: Job, work: F) -> Result<Uuid>
    where
        F: FnOnce(JobProgress, CancellationToken) -> Fut,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let mut jobs = self.jobs.write().await;

        if jobs.contains_key(&job.id) {
            return Err(NexusError::validation(format!(
                "the job {} already exists",
                job.id
            )));
        }

        let job_id = job.id;
        let cancellation_token = CancellationToken::new();

        let status = Arc::new(StdRwLock::new(JobStatus {
            start: Utc::now(),
            status: JobStatusKind::Running,
            progress: 0.0,
            result: None,
            error_message: None,
        }));

        let progress_status = status.clone();

        let progress: JobProgress = Arc::new(move |value: f64| {
            let mut status = progress_status
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());

            status.progress = value.clamp(0.0, 1.0).max(status.progress);
        });

        let future = work(progress, cancellation_token.clone());
        let task_status = status.clone();

        tokio::spawn(async move {
            let outcome = future.await;

            let mut status = task_status
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());

            match outcome {
                Ok(result) => {
                    status.status = JobStatusKind::Succeeded;
                    status.progress = 1.0;
                    status.result = Some(result);
                }
                Err(NexusError::Cancelled) => {
                    status.status = JobStatusKind::Cancelled;
                }
                Err(error) => {
                    status.status = JobStatusKind::Failed;
                    status.error_message = Some(error.to_string());
                }
            }
        });

        jobs.insert(
            job_id,
            JobControl {
                job,
                status,
                cancellation_token,
            },
        );

        debug!(%job_id, "job registered");

        Ok(job_id)
    }

    /// The job and its current status.
    pub async fn get_job(&self, job_id: Uuid) -> Option<(Job, JobStatus)> {
        let jobs = self.jobs.read().await;

        jobs.get(&job_id).map(|control| {
            (
                control.job.clone(),
                control
                    .status
                    .read()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .clone(),
            )
        })
    }

    /// All jobs with their current status.
    pub async fn get_jobs(&self) -> Vec<(Job, JobStatus)> {
        let jobs = self.jobs.read().await;

        jobs.values()
            .map(|control| {
                (
                    control.job.clone(),
                    control
                        .status
                        .read()
                        .unwrap_or_else(|poisoned| poisoned.into_inner())
                        .clone(),
                )
            })
            .collect()
    }

    /// Requests cancellation of a running job.
    pub async fn cancel_job(&self, job_id: Uuid) -> Result<()> {
        let jobs = self.jobs.read().await;

        let control = jobs
            .get(&job_id)
            .ok_or_else(|| NexusError::not_found(format!("the job {job_id}")))?;

        control.cancellation_token.cancel();

        Ok(())
    }

    /// Removes the jobs that are no longer running.
    pub async fn prune(&self) {
        let mut jobs = self.jobs.write().await;

        jobs.retain(|_, control| {
            control
                .status
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .status
                == JobStatusKind::Running
        });
    }
}
