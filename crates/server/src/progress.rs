// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Progress service: latest + bounded history per job, with pub/sub.
//!
//! Subscribers are invoked OUTSIDE the tracker lock (the list is copied
//! first) so a slow handler cannot stall publishers, and a panicking
//! handler is swallowed. Dropping the returned subscription unsubscribes.

use om_core::{JobId, JobProgress};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

type Callback = Arc<dyn Fn(&JobProgress) + Send + Sync>;

#[derive(Default)]
struct Tracker {
    latest: Option<JobProgress>,
    history: VecDeque<JobProgress>,
    subscribers: HashMap<u64, Callback>,
}

pub struct ProgressService {
    trackers: Mutex<HashMap<JobId, Tracker>>,
    max_history: usize,
    next_subscriber: AtomicU64,
}

impl ProgressService {
    pub fn new(max_history: usize) -> Arc<Self> {
        Arc::new(Self {
            trackers: Mutex::new(HashMap::new()),
            max_history: max_history.max(1),
            next_subscriber: AtomicU64::new(1),
        })
    }

    /// Record a report and fan it out. Stale sequences (≤ the latest seen)
    /// are dropped so observers always see strictly increasing sequences.
    pub fn report(&self, progress: JobProgress) -> bool {
        let callbacks: Vec<Callback> = {
            let mut trackers = self.trackers.lock();
            let tracker = trackers.entry(progress.job_id.clone()).or_default();

            if let Some(latest) = &tracker.latest {
                if progress.sequence <= latest.sequence {
                    return false;
                }
            }

            tracker.latest = Some(progress.clone());
            if tracker.history.len() == self.max_history {
                tracker.history.pop_front();
            }
            tracker.history.push_back(progress.clone());
            tracker.subscribers.values().cloned().collect()
            // lock releases here, before any callback runs
        };

        for callback in callbacks {
            // A panicking subscriber must not take down the ingest path.
            let result = std::panic::catch_unwind(AssertUnwindSafe(|| callback(&progress)));
            if result.is_err() {
                tracing::warn!(job_id = %progress.job_id, "progress subscriber panicked");
            }
        }
        true
    }

    pub fn latest(&self, job_id: &JobId) -> Option<JobProgress> {
        self.trackers.lock().get(job_id).and_then(|t| t.latest.clone())
    }

    /// Oldest-first history, bounded by `max_history`.
    pub fn history(&self, job_id: &JobId) -> Vec<JobProgress> {
        self.trackers
            .lock()
            .get(job_id)
            .map(|t| t.history.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Subscribe to a job's reports. The subscription unsubscribes on drop.
    pub fn subscribe(
        self: &Arc<Self>,
        job_id: impl Into<JobId>,
        callback: impl Fn(&JobProgress) + Send + Sync + 'static,
    ) -> ProgressSubscription {
        let job_id = job_id.into();
        let id = self.next_subscriber.fetch_add(1, Ordering::Relaxed);
        self.trackers
            .lock()
            .entry(job_id.clone())
            .or_default()
            .subscribers
            .insert(id, Arc::new(callback));
        ProgressSubscription { service: Arc::downgrade(self), job_id, id }
    }

    /// Drop a job's tracker (terminal cleanup).
    pub fn remove_job(&self, job_id: &JobId) {
        self.trackers.lock().remove(job_id);
    }

    fn unsubscribe(&self, job_id: &JobId, id: u64) {
        let mut trackers = self.trackers.lock();
        if let Some(tracker) = trackers.get_mut(job_id) {
            tracker.subscribers.remove(&id);
        }
    }
}

/// Disposable subscription guard.
pub struct ProgressSubscription {
    service: Weak<ProgressService>,
    job_id: JobId,
    id: u64,
}

impl Drop for ProgressSubscription {
    fn drop(&mut self) {
        if let Some(service) = self.service.upgrade() {
            service.unsubscribe(&self.job_id, self.id);
        }
    }
}

#[cfg(test)]
#[path = "progress_tests.rs"]
mod tests;
