//! # Job Registry
//!
//! In-memory, process-lifetime store of every job ever submitted.
//!
//! ## Thread Safety:
//! - The id → record map sits behind a `RwLock`: lookups and listings take a
//!   read lock, only `add` takes the write lock.
//! - Each record sits behind its own `Mutex`, so updates to one job are
//!   serialized while unrelated jobs are read and written independently.
//! - No lock is ever held across an `.await`; every critical section is a
//!   few field assignments.
//!
//! Records are never removed.

use crate::error::{AppError, AppResult};
use crate::jobs::{Job, JobFailure, JobKind, JobState};
use crate::progress::{Progress, ProgressSink};
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

type Slot = Arc<Mutex<Job>>;

/// Concurrency-safe store of [`Job`] records keyed by id.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<Uuid, Slot>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new `queued` job and return a snapshot including its fresh id.
    ///
    /// The id is drawn while holding the write lock and redrawn on the
    /// (astronomically unlikely) collision, so two calls can never hand
    /// out the same id.
    pub fn add(&self, kind: JobKind) -> Job {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);

        let mut id = Uuid::new_v4();
        while jobs.contains_key(&id) {
            id = Uuid::new_v4();
        }

        let job = Job::new(id, kind);
        jobs.insert(id, Arc::new(Mutex::new(job.clone())));
        debug!(job_id = %id, kind = job.kind.name(), "job created");
        job
    }

    /// Current snapshot of the job with this id.
    pub fn get(&self, id: Uuid) -> AppResult<Job> {
        let slot = self.slot(id)?;
        let job = lock(&slot).clone();
        Ok(job)
    }

    /// Snapshot of every job, in no particular order.
    pub fn list(&self) -> Vec<Job> {
        let slots: Vec<Slot> = {
            let jobs = self.jobs.read().unwrap_or_else(PoisonError::into_inner);
            jobs.values().cloned().collect()
        };
        slots.iter().map(|slot| lock(slot).clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of jobs in each state (states with no jobs are omitted).
    pub fn count_by_state(&self) -> BTreeMap<JobState, usize> {
        let mut counts = BTreeMap::new();
        for job in self.list() {
            *counts.entry(job.state).or_insert(0) += 1;
        }
        counts
    }

    /// Atomically apply `mutation` to the job and bump its `updated_at`.
    ///
    /// A job in a terminal state is frozen: the mutation is skipped and
    /// `Ok(None)` is returned without touching the record. The mutation may
    /// not change the job's id, state, kind or creation time; such an update
    /// is rolled back and rejected. State changes go through
    /// [`JobRegistry::transition_with`].
    ///
    /// The record's lock is held for the duration of the closure, so the
    /// closure must not call back into the registry for the same id.
    pub fn update<R>(&self, id: Uuid, mutation: impl FnOnce(&mut Job) -> R) -> AppResult<Option<R>> {
        let slot = self.slot(id)?;
        let mut job = lock(&slot);
        if job.state.is_terminal() {
            return Ok(None);
        }

        let before = job.clone();
        let result = mutation(&mut *job);
        if job.id != before.id
            || job.state != before.state
            || job.kind != before.kind
            || job.created_at != before.created_at
        {
            *job = before;
            return Err(AppError::Internal(format!(
                "update of job {} tried to change its id, state or kind",
                id
            )));
        }

        job.updated_at = Utc::now();
        Ok(Some(result))
    }

    /// Move the job to `to`, rejecting edges its state machine forbids.
    pub fn transition(&self, id: Uuid, to: JobState) -> AppResult<Job> {
        self.transition_with(id, to, |_| {})
    }

    /// Move the job to `to` and apply `mutation` in the same atomic update.
    ///
    /// Used to publish a terminal state together with its result, so a
    /// poller never sees `done` without the transcript or `failed` without
    /// the error.
    pub fn transition_with(
        &self,
        id: Uuid,
        to: JobState,
        mutation: impl FnOnce(&mut Job),
    ) -> AppResult<Job> {
        let slot = self.slot(id)?;
        let mut job = lock(&slot);

        let from = job.state;
        if !job.kind.allows(from, to) {
            return Err(AppError::IllegalTransition {
                from: from.to_string(),
                to: to.to_string(),
            });
        }

        mutation(&mut *job);
        job.state = to;
        job.updated_at = Utc::now();
        debug!(job_id = %id, %from, %to, "job state changed");
        Ok(job.clone())
    }

    /// Mark the job `failed`, recording `err` as the reason.
    pub fn fail(&self, id: Uuid, err: &AppError) -> AppResult<Job> {
        let failure = JobFailure::from(err);
        let job = self.transition_with(id, JobState::Failed, move |job| job.record_failure(failure))?;
        if let Some(failure) = job.error() {
            debug!(job_id = %id, kind = ?failure.kind, reason = %failure.message, "job failed");
        }
        Ok(job)
    }

    /// Publish progress for a running job. Ignored once the job is terminal.
    pub fn set_progress(&self, id: Uuid, progress: Progress) -> AppResult<()> {
        self.update(id, |job| job.progress = Some(progress))?;
        Ok(())
    }

    /// A [`ProgressSink`] that writes into the job with this id.
    pub fn progress_sink(self: &Arc<Self>, id: Uuid) -> ProgressSink {
        let jobs = Arc::clone(self);
        ProgressSink::new(move |progress| {
            if let Err(err) = jobs.set_progress(id, progress) {
                warn!(job_id = %id, error = %err, "dropping progress update");
            }
        })
    }

    fn slot(&self, id: Uuid) -> AppResult<Slot> {
        let jobs = self.jobs.read().unwrap_or_else(PoisonError::into_inner);
        jobs.get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(id.to_string()))
    }
}

fn lock(slot: &Mutex<Job>) -> MutexGuard<'_, Job> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}
