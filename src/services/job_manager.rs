use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use uuid::Uuid;

use crate::models::job::{JobRecord, JobStatus, JobUpdate};
use crate::models::request::{ClipRequest, RequestError, SourceType};
use crate::services::context::PipelineContext;
use crate::services::job_store::JobStore;
use crate::services::pipeline::{PipelineExecutor, ProgressSink};
use crate::services::upload::{UploadSpool, UploadedFile, INCOMING_DIR};

/// Longest pause between two retention sweeps.
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error(transparent)]
    Invalid(#[from] RequestError),

    #[error("Job not found: {0}")]
    NotFound(Uuid),

    #[error("Failed to prepare job workspace: {0}")]
    Setup(#[source] std::io::Error),

    #[error("Server is shutting down")]
    ShuttingDown,
}

/// Accepts clip jobs and runs them on a bounded pool of workers.
///
/// Submission returns as soon as the pending record is stored. At most
/// `max_parallel_jobs` pipelines execute at any instant; the rest wait for
/// a permit in submission order.
pub struct JobManager {
    store: Arc<JobStore>,
    executor: Arc<PipelineExecutor>,
    jobs_dir: PathBuf,
    permits: Arc<Semaphore>,
    max_parallel_jobs: usize,
    shutdown: CancellationToken,
    tasks: TaskTracker,
}

impl JobManager {
    pub fn new(
        store: Arc<JobStore>,
        executor: Arc<PipelineExecutor>,
        jobs_dir: impl Into<PathBuf>,
        max_parallel_jobs: usize,
    ) -> Self {
        let max_parallel_jobs = max_parallel_jobs.max(1);
        Self {
            store,
            executor,
            jobs_dir: jobs_dir.into(),
            permits: Arc::new(Semaphore::new(max_parallel_jobs)),
            max_parallel_jobs,
            shutdown: CancellationToken::new(),
            tasks: TaskTracker::new(),
        }
    }

    /// Validate `request`, prepare its workspace and queue it.
    pub async fn submit(
        &self,
        request: ClipRequest,
        upload: Option<UploadedFile>,
    ) -> Result<JobRecord, JobError> {
        request.check()?;
        if request.source_type == SourceType::Upload && upload.is_none() {
            return Err(RequestError::MissingUpload.into());
        }
        if self.shutdown.is_cancelled() {
            return Err(JobError::ShuttingDown);
        }

        let job_id = Uuid::new_v4();
        let mut ctx = PipelineContext::new(
            job_id,
            request.clone(),
            &self.jobs_dir,
            self.shutdown.child_token(),
        );
        if let Err(e) = self.prepare(&mut ctx, upload).await {
            let _ = tokio::fs::remove_dir_all(&ctx.job_dir).await;
            return Err(JobError::Setup(e));
        }

        let record = JobRecord::pending(job_id, request, "Queued");
        self.store.insert(record.clone());

        metrics::counter!("clip_jobs_total").increment(1);
        self.record_queue_depth();
        tracing::info!(
            job_id = %job_id,
            source_type = %record.request.source_type,
            strategy = %record.request.clip_strategy,
            "Job submitted"
        );

        self.tasks.spawn(run_job(
            Arc::clone(&self.store),
            Arc::clone(&self.executor),
            Arc::clone(&self.permits),
            ctx,
        ));

        Ok(record)
    }

    async fn prepare(
        &self,
        ctx: &mut PipelineContext,
        upload: Option<UploadedFile>,
    ) -> std::io::Result<()> {
        ctx.ensure_dirs().await?;
        if let Some(upload) = upload {
            ctx.stage_upload(upload)?;
        }
        Ok(())
    }

    /// Start receiving an upload. The file is spooled next to the job
    /// directories and staged into its job by [`JobManager::submit`].
    pub async fn open_upload(&self, file_name: Option<String>) -> Result<UploadSpool, JobError> {
        UploadSpool::create(&self.jobs_dir.join(INCOMING_DIR), file_name)
            .await
            .map_err(JobError::Setup)
    }

    pub fn list(&self) -> Vec<JobRecord> {
        self.store.list()
    }

    pub fn get(&self, id: Uuid) -> Result<JobRecord, JobError> {
        self.store.get(id).ok_or(JobError::NotFound(id))
    }

    pub fn running_count(&self) -> usize {
        self.store.count_by_status(JobStatus::Running)
    }

    pub fn queued_count(&self) -> usize {
        self.store.count_by_status(JobStatus::Pending)
    }

    pub fn max_parallel_jobs(&self) -> usize {
        self.max_parallel_jobs
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    fn record_queue_depth(&self) {
        metrics::gauge!("clip_queue_depth").set(self.queued_count() as f64);
    }

    /// Cancel queued and running jobs, then wait for every worker to settle.
    ///
    /// Running pipelines stop at their next stage boundary.
    pub async fn shutdown(&self) {
        tracing::info!(
            running = self.running_count(),
            queued = self.queued_count(),
            "Shutting down job manager"
        );
        self.shutdown.cancel();
        self.tasks.close();
        self.tasks.wait().await;
    }

    /// Periodically drop terminal records older than `retention`.
    pub fn spawn_retention_sweeper(&self, retention: Duration) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        let shutdown = self.shutdown.clone();
        let period = retention.min(MAX_SWEEP_INTERVAL).max(Duration::from_secs(1));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let Ok(retention) = chrono::Duration::from_std(retention) else {
                    break;
                };
                let evicted = store.evict_finished_before(Utc::now() - retention);
                if evicted > 0 {
                    tracing::info!(evicted, "Evicted finished jobs");
                }
            }
        })
    }
}

/// Reports pipeline progress into the store.
struct StoreProgress {
    store: Arc<JobStore>,
    job_id: Uuid,
}

impl ProgressSink for StoreProgress {
    fn report(&self, progress: f64, message: &str) {
        self.store
            .advance(self.job_id, JobUpdate::running(progress, message));
    }
}

async fn run_job(
    store: Arc<JobStore>,
    executor: Arc<PipelineExecutor>,
    permits: Arc<Semaphore>,
    ctx: PipelineContext,
) {
    let job_id = ctx.job_id;
    let cancel = ctx.cancel.clone();

    let acquired = tokio::select! {
        permit = permits.acquire_owned() => permit.ok(),
        _ = cancel.cancelled() => None,
    };
    let Some(_permit) = acquired else {
        tracing::warn!(job_id = %job_id, "Job cancelled before start");
        metrics::counter!("clip_jobs_failed").increment(1);
        store.advance(job_id, JobUpdate::failed("Job cancelled before start"));
        return;
    };

    store.advance(job_id, JobUpdate::running(0.01, "Preparing…"));
    metrics::gauge!("clip_queue_depth").set(store.count_by_status(JobStatus::Pending) as f64);
    metrics::gauge!("clip_jobs_running").increment(1.0);
    tracing::info!(job_id = %job_id, "Job started");
    let started = Instant::now();

    // The body runs in its own task so a panic inside a stage is contained
    // and still produces a terminal record.
    let sink = StoreProgress {
        store: Arc::clone(&store),
        job_id,
    };
    let body = tokio::spawn(async move { executor.run(&ctx, &sink).await });

    let update = match body.await {
        Ok(Ok(outputs)) => {
            tracing::info!(
                job_id = %job_id,
                outputs = outputs.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Job completed"
            );
            metrics::counter!("clip_jobs_completed").increment(1);
            JobUpdate::completed(outputs, "Clips exported successfully")
        }
        Ok(Err(e)) => {
            tracing::warn!(job_id = %job_id, error = %e, "Job failed");
            metrics::counter!("clip_jobs_failed").increment(1);
            JobUpdate::failed(e.to_string())
        }
        Err(e) => {
            let reason = describe_join_error(e);
            tracing::error!(job_id = %job_id, error = %reason, "Job worker aborted");
            metrics::counter!("clip_jobs_failed").increment(1);
            JobUpdate::failed(format!("Worker aborted: {}", reason))
        }
    };

    metrics::gauge!("clip_jobs_running").decrement(1.0);
    metrics::histogram!("clip_job_processing_seconds").record(started.elapsed().as_secs_f64());
    store.advance(job_id, update);
}

fn describe_join_error(err: JoinError) -> String {
    if err.is_cancelled() {
        return "task cancelled".to_string();
    }
    match err.try_into_panic() {
        Ok(payload) => {
            if let Some(s) = payload.downcast_ref::<&str>() {
                (*s).to_string()
            } else if let Some(s) = payload.downcast_ref::<String>() {
                s.clone()
            } else {
                "panic".to_string()
            }
        }
        Err(_) => "unknown error".to_string(),
    }
}
