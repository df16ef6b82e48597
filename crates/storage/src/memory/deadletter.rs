// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory dead-letter store. FIFO by enqueue order.

use crate::store::{DeadLetterStore, StoreError};
use async_trait::async_trait;
use om_core::{Clock, DeadLetterEntry, DeadLetterId, Job, JobId};
use parking_lot::Mutex;

pub struct MemoryDeadLetterStore<C: Clock> {
    entries: Mutex<Vec<DeadLetterEntry>>,
    clock: C,
}

impl<C: Clock> MemoryDeadLetterStore<C> {
    pub fn new(clock: C) -> Self {
        Self { entries: Mutex::new(Vec::new()), clock }
    }
}

#[async_trait]
impl<C: Clock> DeadLetterStore for MemoryDeadLetterStore<C> {
    async fn initialize(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn enqueue(&self, job: Job, reason: &str) -> Result<DeadLetterEntry, StoreError> {
        let entry = DeadLetterEntry::new(job, reason, self.clock.epoch_ms());
        tracing::warn!(
            job_id = %entry.job.id,
            entry_id = %entry.id,
            reason,
            "job dead-lettered"
        );
        self.entries.lock().push(entry.clone());
        Ok(entry)
    }

    async fn get(&self, id: &DeadLetterId) -> Result<Option<DeadLetterEntry>, StoreError> {
        Ok(self.entries.lock().iter().find(|e| &e.id == id).cloned())
    }

    async fn get_by_job_id(&self, job_id: &JobId) -> Result<Option<DeadLetterEntry>, StoreError> {
        // Newest entry wins if the same job was dead-lettered twice.
        Ok(self.entries.lock().iter().rev().find(|e| &e.job.id == job_id).cloned())
    }

    async fn get_all(&self) -> Result<Vec<DeadLetterEntry>, StoreError> {
        Ok(self.entries.lock().clone())
    }

    async fn mark_for_retry(&self, id: &DeadLetterId) -> Result<bool, StoreError> {
        let now = self.clock.epoch_ms();
        let mut entries = self.entries.lock();
        match entries.iter_mut().find(|e| &e.id == id) {
            Some(entry) => {
                entry.retry_requested = true;
                entry.retry_requested_at_ms = Some(now);
                entry.retry_attempts += 1;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_pending_retry(&self) -> Result<Vec<DeadLetterEntry>, StoreError> {
        Ok(self.entries.lock().iter().filter(|e| e.retry_requested).cloned().collect())
    }

    async fn remove(&self, id: &DeadLetterId) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|e| &e.id != id);
        Ok(entries.len() < before)
    }

    async fn purge(&self) -> Result<usize, StoreError> {
        let mut entries = self.entries.lock();
        let count = entries.len();
        entries.clear();
        Ok(count)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.entries.lock().len())
    }
}

#[cfg(test)]
#[path = "deadletter_tests.rs"]
mod tests;
