use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;
use uuid::Uuid;

use crate::models::clip::ClipOutput;
use crate::models::request::ClipRequest;

/// Highest progress a job may report before it reaches a terminal status.
pub const MAX_ACTIVE_PROGRESS: f64 = 0.99;

/// Lifecycle of a clip job: `pending -> running -> {completed | failed}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Display, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether a record in `self` may move to `next`.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        match self {
            JobStatus::Pending => matches!(next, JobStatus::Running | JobStatus::Failed),
            JobStatus::Running => next != JobStatus::Pending,
            JobStatus::Completed | JobStatus::Failed => false,
        }
    }
}

/// Snapshot of one job. Stored records are replaced, never edited.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobRecord {
    pub id: Uuid,
    pub status: JobStatus,
    pub progress: f64,
    pub message: String,
    pub request: ClipRequest,
    pub outputs: Vec<ClipOutput>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn pending(id: Uuid, request: ClipRequest, message: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: JobStatus::Pending,
            progress: 0.0,
            message: message.into(),
            request,
            outputs: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Build the next snapshot from a partial update.
    ///
    /// Terminal records come back unchanged. Otherwise progress only moves
    /// forward, stays below 1.0 while the job is active and is exactly 1.0
    /// once terminal; outputs survive only on `completed`.
    pub fn apply(&self, update: JobUpdate) -> JobRecord {
        if self.is_terminal() {
            return self.clone();
        }

        let status = match update.status {
            Some(next) if self.status.can_transition_to(next) => next,
            _ => self.status,
        };

        let progress = if status.is_terminal() {
            1.0
        } else {
            update
                .progress
                .filter(|p| p.is_finite())
                .map_or(self.progress, |p| p.max(self.progress))
                .clamp(0.0, MAX_ACTIVE_PROGRESS)
        };

        let message = match update.message {
            Some(message) if !message.trim().is_empty() => message,
            _ => self.message.clone(),
        };

        let outputs = if status == JobStatus::Completed {
            update.outputs.unwrap_or_else(|| self.outputs.clone())
        } else {
            Vec::new()
        };

        JobRecord {
            id: self.id,
            status,
            progress,
            message,
            request: self.request.clone(),
            outputs,
            created_at: self.created_at,
            updated_at: Utc::now(),
        }
    }
}

/// Partial update applied to a [`JobRecord`]; unset fields are kept.
#[derive(Debug, Clone, Default)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub progress: Option<f64>,
    pub message: Option<String>,
    pub outputs: Option<Vec<ClipOutput>>,
}

impl JobUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn progress(mut self, progress: f64) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn outputs(mut self, outputs: Vec<ClipOutput>) -> Self {
        self.outputs = Some(outputs);
        self
    }

    pub fn running(progress: f64, message: impl Into<String>) -> Self {
        Self::new()
            .status(JobStatus::Running)
            .progress(progress)
            .message(message)
    }

    pub fn completed(outputs: Vec<ClipOutput>, message: impl Into<String>) -> Self {
        Self::new()
            .status(JobStatus::Completed)
            .progress(1.0)
            .message(message)
            .outputs(outputs)
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::new()
            .status(JobStatus::Failed)
            .progress(1.0)
            .message(message)
    }
}
