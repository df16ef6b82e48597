// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Short-TTL idempotency cache at the submission edge.
//!
//! Maps a caller-supplied key to the job id it produced. Entries expire
//! after the TTL regardless of the job's state (a job still Pending past
//! the TTL may be resubmitted as a new job — accepted policy). Cleanup is
//! lazy on access plus an opportunistic full prune every N operations.

use om_core::{Clock, JobId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

const OPPORTUNISTIC_PRUNE_EVERY: u64 = 256;

enum EntryState {
    /// A submission holds the lock but has not enqueued yet.
    Processing,
    Done(JobId),
}

struct Entry {
    state: EntryState,
    touched_at_ms: u64,
}

pub struct IdempotencyCache<C: Clock> {
    entries: Mutex<HashMap<String, Entry>>,
    ttl_ms: u64,
    clock: C,
    ops: AtomicU64,
}

impl<C: Clock> IdempotencyCache<C> {
    pub fn new(clock: C, ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl_ms: ttl.as_millis() as u64,
            clock,
            ops: AtomicU64::new(0),
        }
    }

    /// Claim the key. Returns true when this caller is first (or the
    /// prior entry expired); false when the key is already held.
    pub fn try_acquire_lock(&self, key: &str) -> bool {
        let now = self.tick();
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if !self.expired(entry, now) => false,
            _ => {
                entries
                    .insert(key.to_string(), Entry { state: EntryState::Processing, touched_at_ms: now });
                true
            }
        }
    }

    /// Record the job a key produced.
    pub fn set_result(&self, key: &str, job_id: JobId) {
        let now = self.tick();
        self.entries
            .lock()
            .insert(key.to_string(), Entry { state: EntryState::Done(job_id), touched_at_ms: now });
    }

    pub fn get_result(&self, key: &str) -> Option<JobId> {
        let now = self.tick();
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if self.expired(entry, now) => {
                entries.remove(key);
                None
            }
            Some(Entry { state: EntryState::Done(job_id), .. }) => Some(job_id.clone()),
            _ => None,
        }
    }

    /// Drop a Processing claim (submission failed before enqueue).
    pub fn release_lock(&self, key: &str) {
        let mut entries = self.entries.lock();
        if let Some(Entry { state: EntryState::Processing, .. }) = entries.get(key) {
            entries.remove(key);
        }
    }

    pub fn is_processing(&self, key: &str) -> bool {
        let now = self.tick();
        let entries = self.entries.lock();
        matches!(
            entries.get(key),
            Some(entry @ Entry { state: EntryState::Processing, .. }) if !self.expired(entry, now)
        )
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    fn expired(&self, entry: &Entry, now: u64) -> bool {
        now.saturating_sub(entry.touched_at_ms) >= self.ttl_ms
    }

    /// Count an access; every Nth access prunes the whole map.
    fn tick(&self) -> u64 {
        let now = self.clock.epoch_ms();
        let ops = self.ops.fetch_add(1, Ordering::Relaxed) + 1;
        if ops % OPPORTUNISTIC_PRUNE_EVERY == 0 {
            self.entries.lock().retain(|_, e| now.saturating_sub(e.touched_at_ms) < self.ttl_ms);
        }
        now
    }
}

#[cfg(test)]
#[path = "idempotency_tests.rs"]
mod tests;
