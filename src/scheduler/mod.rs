//! Deferred job scheduling
//!
//! The scheduler owns a dedicated timer thread, deliberately separate from
//! the async execution context that serves tasks and performs network I/O.
//! When a job comes due the thread removes it from the store and invokes
//! the fire callback, which must not block — in this crate it appends the
//! job's argument to the [`PublishQueue`](queue::PublishQueue) and returns.
//! The [`DrainLoop`](queue::DrainLoop) on the async side does the actual
//! work.

pub mod queue;
pub mod store;

pub use queue::{DrainLoop, PublishHandler, PublishQueue, PublishReceiver};
pub use store::{FileJobStore, JobStore, MemoryJobStore};

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::protocol::error::{DispatchError, DispatchResult};

/// A job registered for later, timer-driven firing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeferredJob {
    /// Unique identifier; re-registering an id replaces the prior job
    pub id: String,

    /// When the job should fire
    pub due_at: DateTime<Utc>,

    /// Opaque argument handed to the fire callback
    pub arg: String,
}

impl DeferredJob {
    /// Create a new job
    pub fn new(
        id: impl Into<String>,
        due_at: DateTime<Utc>,
        arg: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            due_at,
            arg: arg.into(),
        }
    }

    /// Create the publication job for a scheduled post
    ///
    /// The id is derived from the post id, so re-scheduling the same post
    /// replaces its job instead of duplicating it.
    pub fn for_post(post_id: &str, due_at: DateTime<Utc>) -> Self {
        Self::new(format!("publish-post-{}", post_id), due_at, post_id)
    }
}

struct SchedulerState {
    shutdown: bool,
    version: u64,
}

struct Shared {
    store: Arc<dyn JobStore>,
    state: Mutex<SchedulerState>,
    cv: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn wake(&self) {
        let mut state = self.lock();
        state.version = state.version.wrapping_add(1);
        drop(state);
        self.cv.notify_all();
    }
}

/// Timer-driven scheduler for deferred jobs
///
/// Jobs survive the process when backed by a persistent [`JobStore`]:
/// `start` fires anything already overdue, so work registered before a
/// restart is not lost.
pub struct Scheduler {
    shared: Arc<Shared>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl Scheduler {
    /// Start the scheduler thread
    ///
    /// `on_fire` runs on the timer thread for every due job, after the job
    /// has been removed from the store, and must return quickly without
    /// blocking; hand real work to the async context through the publish
    /// queue.
    pub fn start<F>(store: Arc<dyn JobStore>, on_fire: F) -> DispatchResult<Self>
    where
        F: Fn(DeferredJob) + Send + Sync + 'static,
    {
        let shared = Arc::new(Shared {
            store,
            state: Mutex::new(SchedulerState {
                shutdown: false,
                version: 0,
            }),
            cv: Condvar::new(),
        });

        let thread_shared = Arc::clone(&shared);
        let thread = std::thread::Builder::new()
            .name("deferred-scheduler".to_string())
            .spawn(move || Self::run(thread_shared, Box::new(on_fire)))
            .map_err(|e| DispatchError::Other(format!("Failed to start scheduler: {}", e)))?;

        info!("Deferred scheduler started");

        Ok(Self {
            shared,
            thread: Some(thread),
        })
    }

    fn run(shared: Arc<Shared>, on_fire: Box<dyn Fn(DeferredJob) + Send + Sync>) {
        loop {
            let seen_version = {
                let state = shared.lock();
                if state.shutdown {
                    break;
                }
                state.version
            };

            Self::fire_due(&shared, on_fire.as_ref());

            // Sleep until the next job is due or a registration wakes us.
            let wait = match shared.store.next_due_at() {
                Ok(Some(due_at)) => (due_at - Utc::now())
                    .to_std()
                    .unwrap_or(Duration::ZERO),
                Ok(None) => Duration::from_secs(60),
                Err(e) => {
                    error!("Failed to read job store: {}", e);
                    Duration::from_secs(1)
                }
            };

            if wait.is_zero() {
                continue;
            }

            let state = shared.lock();
            if state.shutdown {
                break;
            }
            if state.version != seen_version {
                // a job was registered while we were firing
                continue;
            }
            let _unused = shared
                .cv
                .wait_timeout(state, wait)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }

        debug!("Scheduler thread exiting");
    }

    fn fire_due(shared: &Shared, on_fire: &(dyn Fn(DeferredJob) + Send + Sync)) {
        let due = match shared.store.due(Utc::now()) {
            Ok(due) => due,
            Err(e) => {
                error!("Failed to read due jobs: {}", e);
                return;
            }
        };

        for job in due {
            // remove first so each registration fires at most once
            match shared.store.remove(&job.id) {
                Ok(true) => {
                    info!(job_id = %job.id, "Firing deferred job");
                    on_fire(job);
                }
                Ok(false) => {} // concurrently canceled
                Err(e) => error!(job_id = %job.id, "Failed to remove fired job: {}", e),
            }
        }
    }

    /// Register a job, replacing any prior job with the same id
    ///
    /// A job whose due time has already passed fires on the next timer
    /// wake, which this call triggers.
    pub fn schedule(&self, job: DeferredJob) -> DispatchResult<()> {
        debug!(job_id = %job.id, due_at = %job.due_at, "Scheduling deferred job");
        self.shared.store.upsert(job)?;
        self.shared.wake();
        Ok(())
    }

    /// Cancel a job by id, returning whether it existed
    pub fn cancel(&self, job_id: &str) -> DispatchResult<bool> {
        let removed = self.shared.store.remove(job_id)?;
        self.shared.wake();
        Ok(removed)
    }

    /// The job store backing this scheduler
    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.shared.store
    }

    /// Stop the timer thread
    pub fn shutdown(&mut self) {
        self.shared.lock().shutdown = true;
        self.shared.cv.notify_all();
        if let Some(thread) = self.thread.take() {
            let _unused = thread.join();
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration as StdDuration;

    use chrono::Duration;

    use super::*;

    fn wait_until(mut check: impl FnMut() -> bool, timeout: StdDuration) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        while std::time::Instant::now() < deadline {
            if check() {
                return true;
            }
            std::thread::sleep(StdDuration::from_millis(10));
        }
        false
    }

    #[test]
    fn test_schedule_same_post_replaces_job() {
        let store = Arc::new(MemoryJobStore::new());
        let scheduler = Scheduler::start(Arc::clone(&store) as Arc<dyn JobStore>, |_| {}).unwrap();

        let far = Utc::now() + Duration::hours(1);
        let farther = Utc::now() + Duration::hours(2);
        scheduler
            .schedule(DeferredJob::for_post("post-1", far))
            .unwrap();
        scheduler
            .schedule(DeferredJob::for_post("post-1", farther))
            .unwrap();

        let all = store.all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].due_at, farther);
    }

    #[test]
    fn test_due_job_fires_into_queue() {
        let store = Arc::new(MemoryJobStore::new());
        let (queue, mut receiver) = PublishQueue::channel();

        let fire_queue = queue.clone();
        let scheduler = Scheduler::start(Arc::clone(&store) as Arc<dyn JobStore>, move |job| {
            fire_queue.enqueue(job.arg);
        })
        .unwrap();

        scheduler
            .schedule(DeferredJob::for_post(
                "post-1",
                Utc::now() + Duration::milliseconds(50),
            ))
            .unwrap();

        assert!(wait_until(
            || receiver.try_recv().is_ok(),
            StdDuration::from_secs(5)
        ));
        // fired exactly once; the job is gone from the store
        assert!(store.all().unwrap().is_empty());
    }

    #[test]
    fn test_overdue_job_fires_immediately() {
        let store = Arc::new(MemoryJobStore::new());
        store
            .upsert(DeferredJob::for_post(
                "post-1",
                Utc::now() - Duration::seconds(30),
            ))
            .unwrap();

        let (queue, mut receiver) = PublishQueue::channel();
        let fire_queue = queue.clone();
        let _scheduler =
            Scheduler::start(Arc::clone(&store) as Arc<dyn JobStore>, move |job| {
                fire_queue.enqueue(job.arg);
            })
            .unwrap();

        assert!(wait_until(
            || receiver.try_recv().is_ok(),
            StdDuration::from_secs(5)
        ));
    }

    #[test]
    fn test_cancel_prevents_firing() {
        let store = Arc::new(MemoryJobStore::new());
        let (queue, mut receiver) = PublishQueue::channel();
        let fire_queue = queue.clone();
        let scheduler = Scheduler::start(Arc::clone(&store) as Arc<dyn JobStore>, move |job| {
            fire_queue.enqueue(job.arg);
        })
        .unwrap();

        scheduler
            .schedule(DeferredJob::for_post(
                "post-1",
                Utc::now() + Duration::milliseconds(200),
            ))
            .unwrap();
        assert!(scheduler.cancel("publish-post-post-1").unwrap());

        std::thread::sleep(StdDuration::from_millis(400));
        assert!(receiver.try_recv().is_err());
    }
}
