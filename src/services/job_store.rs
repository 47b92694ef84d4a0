use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::job::{JobRecord, JobStatus, JobUpdate};

/// In-memory registry of the latest snapshot per job.
///
/// Every read and every read-modify-write goes through one lock, so readers
/// never observe a half-applied update.
#[derive(Debug, Default)]
pub struct JobStore {
    jobs: RwLock<HashMap<Uuid, JobRecord>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: JobRecord) {
        self.jobs.write().insert(record.id, record);
    }

    pub fn get(&self, id: Uuid) -> Option<JobRecord> {
        self.jobs.read().get(&id).cloned()
    }

    /// All records, newest submission first.
    pub fn list(&self) -> Vec<JobRecord> {
        let mut records: Vec<JobRecord> = self.jobs.read().values().cloned().collect();
        records.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        records
    }

    /// Replace the record for `id` with `update` applied to it.
    ///
    /// Unknown ids are ignored: a late report for an evicted job must not
    /// bring it back.
    pub fn advance(&self, id: Uuid, update: JobUpdate) -> Option<JobRecord> {
        let mut jobs = self.jobs.write();
        let current = jobs.get(&id)?;
        let next = current.apply(update);
        jobs.insert(id, next.clone());
        Some(next)
    }

    pub fn count_by_status(&self, status: JobStatus) -> usize {
        self.jobs
            .read()
            .values()
            .filter(|r| r.status == status)
            .count()
    }

    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.read().is_empty()
    }

    /// Drop terminal records last updated before `cutoff`. Returns how many were removed.
    pub fn evict_finished_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut jobs = self.jobs.write();
        let before = jobs.len();
        jobs.retain(|_, r| !(r.is_terminal() && r.updated_at < cutoff));
        before - jobs.len()
    }
}
