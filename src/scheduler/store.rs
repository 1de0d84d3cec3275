//! Durable, time-indexed storage for deferred jobs
//!
//! The job store is consulted from the scheduler's timer thread, so its
//! interface is synchronous. Records must survive a process restart and
//! reload in correct time order — that is the only format guarantee the
//! scheduler requires of its storage.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::protocol::error::{DispatchError, DispatchResult};

use super::DeferredJob;

/// Durable keyed storage for deferred jobs
pub trait JobStore: Send + Sync {
    /// Insert or replace a job, keyed by its id
    ///
    /// Registering an existing id replaces the prior due time and argument
    /// rather than creating a duplicate firing.
    fn upsert(&self, job: DeferredJob) -> DispatchResult<()>;

    /// Remove a job by id, returning whether it existed
    fn remove(&self, job_id: &str) -> DispatchResult<bool>;

    /// Get a job by id
    fn get(&self, job_id: &str) -> DispatchResult<Option<DeferredJob>>;

    /// Jobs due at or before `now`, due time ascending
    fn due(&self, now: DateTime<Utc>) -> DispatchResult<Vec<DeferredJob>>;

    /// The earliest due time among stored jobs
    fn next_due_at(&self) -> DispatchResult<Option<DateTime<Utc>>>;

    /// All stored jobs, due time ascending
    fn all(&self) -> DispatchResult<Vec<DeferredJob>>;
}

fn sorted(mut jobs: Vec<DeferredJob>) -> Vec<DeferredJob> {
    jobs.sort_by_key(|job| job.due_at);
    jobs
}

/// In-memory job store
///
/// Does not survive a restart; use [`FileJobStore`] when jobs must outlive
/// the process.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: Mutex<HashMap<String, DeferredJob>>,
}

impl MemoryJobStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, DeferredJob>> {
        self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl JobStore for MemoryJobStore {
    fn upsert(&self, job: DeferredJob) -> DispatchResult<()> {
        self.lock().insert(job.id.clone(), job);
        Ok(())
    }

    fn remove(&self, job_id: &str) -> DispatchResult<bool> {
        Ok(self.lock().remove(job_id).is_some())
    }

    fn get(&self, job_id: &str) -> DispatchResult<Option<DeferredJob>> {
        Ok(self.lock().get(job_id).cloned())
    }

    fn due(&self, now: DateTime<Utc>) -> DispatchResult<Vec<DeferredJob>> {
        let jobs = self.lock();
        Ok(sorted(
            jobs.values().filter(|job| job.due_at <= now).cloned().collect(),
        ))
    }

    fn next_due_at(&self) -> DispatchResult<Option<DateTime<Utc>>> {
        Ok(self.lock().values().map(|job| job.due_at).min())
    }

    fn all(&self) -> DispatchResult<Vec<DeferredJob>> {
        Ok(sorted(self.lock().values().cloned().collect()))
    }
}

/// Job store persisted as a JSON document on disk
///
/// The whole job set is rewritten on each mutation; jobs registered before
/// a restart reload at open and fire at their original due time (or
/// immediately if that time has passed).
#[derive(Debug)]
pub struct FileJobStore {
    path: PathBuf,
    jobs: Mutex<HashMap<String, DeferredJob>>,
}

impl FileJobStore {
    /// Open a store at the given path, loading any persisted jobs
    pub fn open(path: impl AsRef<Path>) -> DispatchResult<Self> {
        let path = path.as_ref().to_path_buf();

        let mut jobs = HashMap::new();
        if path.exists() {
            let raw = std::fs::read(&path).map_err(DispatchError::persistence)?;
            let loaded: Vec<DeferredJob> =
                serde_json::from_slice(&raw).map_err(DispatchError::persistence)?;
            for job in loaded {
                jobs.insert(job.id.clone(), job);
            }
        }

        Ok(Self {
            path,
            jobs: Mutex::new(jobs),
        })
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, DeferredJob>> {
        self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn persist(&self, jobs: &HashMap<String, DeferredJob>) -> DispatchResult<()> {
        let snapshot = sorted(jobs.values().cloned().collect());
        let raw = serde_json::to_vec_pretty(&snapshot).map_err(DispatchError::persistence)?;
        std::fs::write(&self.path, raw).map_err(DispatchError::persistence)
    }
}

impl JobStore for FileJobStore {
    fn upsert(&self, job: DeferredJob) -> DispatchResult<()> {
        let mut jobs = self.lock();
        jobs.insert(job.id.clone(), job);
        self.persist(&jobs)
    }

    fn remove(&self, job_id: &str) -> DispatchResult<bool> {
        let mut jobs = self.lock();
        let existed = jobs.remove(job_id).is_some();
        if existed {
            if let Err(e) = self.persist(&jobs) {
                warn!("Failed to persist job removal: {}", e);
            }
        }
        Ok(existed)
    }

    fn get(&self, job_id: &str) -> DispatchResult<Option<DeferredJob>> {
        Ok(self.lock().get(job_id).cloned())
    }

    fn due(&self, now: DateTime<Utc>) -> DispatchResult<Vec<DeferredJob>> {
        let jobs = self.lock();
        Ok(sorted(
            jobs.values().filter(|job| job.due_at <= now).cloned().collect(),
        ))
    }

    fn next_due_at(&self) -> DispatchResult<Option<DateTime<Utc>>> {
        Ok(self.lock().values().map(|job| job.due_at).min())
    }

    fn all(&self) -> DispatchResult<Vec<DeferredJob>> {
        Ok(sorted(self.lock().values().cloned().collect()))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn test_upsert_replaces_by_id() {
        let store = MemoryJobStore::new();
        let now = Utc::now();

        store
            .upsert(DeferredJob::for_post("post-1", now + Duration::seconds(10)))
            .unwrap();
        store
            .upsert(DeferredJob::for_post("post-1", now + Duration::seconds(60)))
            .unwrap();

        let all = store.all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].due_at, now + Duration::seconds(60));
    }

    #[test]
    fn test_due_is_time_ordered() {
        let store = MemoryJobStore::new();
        let now = Utc::now();

        store
            .upsert(DeferredJob::for_post("late", now - Duration::seconds(1)))
            .unwrap();
        store
            .upsert(DeferredJob::for_post("early", now - Duration::seconds(60)))
            .unwrap();
        store
            .upsert(DeferredJob::for_post("future", now + Duration::seconds(60)))
            .unwrap();

        let due = store.due(now).unwrap();
        assert_eq!(due.len(), 2);
        assert_eq!(due[0].arg, "early");
        assert_eq!(due[1].arg, "late");

        assert_eq!(
            store.next_due_at().unwrap(),
            Some(now - Duration::seconds(60))
        );
    }

    #[test]
    fn test_file_store_reloads_after_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.json");
        let due = Utc::now() + Duration::seconds(30);

        {
            let store = FileJobStore::open(&path).unwrap();
            store.upsert(DeferredJob::for_post("post-1", due)).unwrap();
            store
                .upsert(DeferredJob::for_post("post-2", due + Duration::seconds(30)))
                .unwrap();
            store.remove("publish-post-post-2").unwrap();
        }

        // a fresh open sees the surviving job with its original due time
        let reopened = FileJobStore::open(&path).unwrap();
        let all = reopened.all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].arg, "post-1");
        assert_eq!(all[0].due_at, due);
    }
}
