// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory job store.
//!
//! One mutex guards the whole table, which makes every transition a
//! single-writer CAS for free. The pending order is recomputed on read;
//! an insertion sequence breaks FIFO ties between jobs created in the
//! same millisecond.

use crate::store::{JobStore, StoreError};
use async_trait::async_trait;
use om_core::{
    error as error_code, AgentId, Clock, Job, JobId, JobProgress, JobRequest, JobResult, JobStatus,
};
use parking_lot::Mutex;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::time::Duration;

const DEFAULT_IDEMPOTENCY_TTL: Duration = Duration::from_secs(24 * 3600);

struct IdemEntry {
    job_id: JobId,
    inserted_at_ms: u64,
}

#[derive(Default)]
struct Inner {
    jobs: HashMap<JobId, Job>,
    idempotency: HashMap<String, IdemEntry>,
    insertion_seq: HashMap<JobId, u64>,
    next_seq: u64,
}

pub struct MemoryJobStore<C: Clock> {
    inner: Mutex<Inner>,
    clock: C,
    idempotency_ttl_ms: u64,
}

impl<C: Clock> MemoryJobStore<C> {
    pub fn new(clock: C) -> Self {
        Self::with_idempotency_ttl(clock, DEFAULT_IDEMPOTENCY_TTL)
    }

    pub fn with_idempotency_ttl(clock: C, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            clock,
            idempotency_ttl_ms: ttl.as_millis() as u64,
        }
    }

    /// Reset to Pending, wiping everything an earlier assignment produced.
    fn clear_for_requeue(job: &mut Job) {
        job.status = JobStatus::Pending;
        job.assigned_agent_id = None;
        job.assigned_at_ms = None;
        job.started_at_ms = None;
        job.completed_at_ms = None;
        job.error = None;
        job.error_code = None;
        job.result = None;
        job.last_progress = None;
    }

    fn pending_order(inner: &Inner) -> Vec<JobId> {
        let mut pending: Vec<&Job> =
            inner.jobs.values().filter(|j| j.status == JobStatus::Pending).collect();
        pending.sort_by_key(|j| {
            (
                Reverse(j.request.priority),
                j.created_at_ms,
                inner.insertion_seq.get(&j.id).copied().unwrap_or(u64::MAX),
            )
        });
        pending.into_iter().map(|j| j.id.clone()).collect()
    }

    fn prune_idempotency(inner: &mut Inner, now_ms: u64, ttl_ms: u64) {
        inner.idempotency.retain(|_, e| now_ms.saturating_sub(e.inserted_at_ms) < ttl_ms);
    }
}

#[async_trait]
impl<C: Clock> JobStore for MemoryJobStore<C> {
    async fn initialize(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn enqueue(&self, request: JobRequest) -> Result<Job, StoreError> {
        let now = self.clock.epoch_ms();
        let mut inner = self.inner.lock();
        Self::prune_idempotency(&mut inner, now, self.idempotency_ttl_ms);

        if let Some(entry) = inner.idempotency.get(&request.idempotency_key) {
            let existing = inner.jobs.get(&entry.job_id).cloned();
            if let Some(job) = existing {
                tracing::debug!(
                    job_id = %job.id,
                    key = %request.idempotency_key,
                    "enqueue deduplicated by idempotency key"
                );
                return Ok(job);
            }
        }

        let job = Job::new(request, now);
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.insertion_seq.insert(job.id.clone(), seq);
        inner.idempotency.insert(
            job.request.idempotency_key.clone(),
            IdemEntry { job_id: job.id.clone(), inserted_at_ms: now },
        );
        inner.jobs.insert(job.id.clone(), job.clone());
        Ok(job)
    }

    async fn get(&self, id: &JobId) -> Result<Option<Job>, StoreError> {
        Ok(self.inner.lock().jobs.get(id).cloned())
    }

    async fn get_pending(&self) -> Result<Vec<Job>, StoreError> {
        let inner = self.inner.lock();
        let order = Self::pending_order(&inner);
        Ok(order.iter().filter_map(|id| inner.jobs.get(id).cloned()).collect())
    }

    async fn get_jobs(
        &self,
        status: Option<JobStatus>,
        agent: Option<&AgentId>,
    ) -> Result<Vec<Job>, StoreError> {
        let inner = self.inner.lock();
        let mut jobs: Vec<Job> = inner
            .jobs
            .values()
            .filter(|j| status.is_none_or(|s| j.status == s))
            .filter(|j| agent.is_none_or(|a| j.assigned_agent_id.as_ref() == Some(a)))
            .cloned()
            .collect();
        jobs.sort_by_key(|j| {
            (j.created_at_ms, inner.insertion_seq.get(&j.id).copied().unwrap_or(u64::MAX))
        });
        Ok(jobs)
    }

    async fn dequeue_next(
        &self,
        capabilities: Option<&[String]>,
    ) -> Result<Option<Job>, StoreError> {
        let now = self.clock.epoch_ms();
        let mut inner = self.inner.lock();
        let order = Self::pending_order(&inner);
        for id in order {
            let eligible = match (capabilities, inner.jobs.get(&id)) {
                (_, None) => false,
                (None, Some(_)) => true,
                (Some(caps), Some(job)) => job
                    .request
                    .required_capabilities
                    .iter()
                    .all(|req| caps.iter().any(|c| c.eq_ignore_ascii_case(req))),
            };
            if !eligible {
                continue;
            }
            if let Some(job) = inner.jobs.get_mut(&id) {
                job.status = JobStatus::Assigned;
                job.assigned_at_ms = Some(now);
                return Ok(Some(job.clone()));
            }
        }
        Ok(None)
    }

    async fn assign(&self, id: &JobId, agent: &AgentId) -> Result<bool, StoreError> {
        let now = self.clock.epoch_ms();
        let mut inner = self.inner.lock();
        let Some(job) = inner.jobs.get_mut(id) else { return Ok(false) };
        let bindable = job.status == JobStatus::Pending
            || (job.status == JobStatus::Assigned && job.assigned_agent_id.is_none());
        if !bindable {
            return Ok(false);
        }
        job.status = JobStatus::Assigned;
        job.assigned_agent_id = Some(agent.clone());
        job.assigned_at_ms = Some(now);
        Ok(true)
    }

    async fn acknowledge(&self, id: &JobId, agent: &AgentId) -> Result<bool, StoreError> {
        let now = self.clock.epoch_ms();
        let mut inner = self.inner.lock();
        let Some(job) = inner.jobs.get_mut(id) else { return Ok(false) };
        if job.status != JobStatus::Assigned || job.assigned_agent_id.as_ref() != Some(agent) {
            return Ok(false);
        }
        job.status = JobStatus::Running;
        job.started_at_ms = Some(now);
        Ok(true)
    }

    async fn complete(&self, id: &JobId, result: JobResult) -> Result<bool, StoreError> {
        let now = self.clock.epoch_ms();
        let mut inner = self.inner.lock();
        let Some(job) = inner.jobs.get_mut(id) else { return Ok(false) };
        if job.status != JobStatus::Running {
            return Ok(false);
        }
        job.status = JobStatus::Completed;
        job.result = Some(result);
        job.completed_at_ms = Some(now);
        Ok(true)
    }

    async fn fail(&self, id: &JobId, error: &str, code: Option<&str>) -> Result<bool, StoreError> {
        let now = self.clock.epoch_ms();
        let mut inner = self.inner.lock();
        let Some(job) = inner.jobs.get_mut(id) else { return Ok(false) };
        if job.status.is_terminal() {
            return Ok(false);
        }
        job.status = JobStatus::Failed;
        job.error = Some(error.to_string());
        job.error_code = code.map(str::to_string);
        job.completed_at_ms = Some(now);
        Ok(true)
    }

    async fn cancel(&self, id: &JobId, reason: Option<&str>) -> Result<bool, StoreError> {
        let now = self.clock.epoch_ms();
        let mut inner = self.inner.lock();
        let Some(job) = inner.jobs.get_mut(id) else { return Ok(false) };
        if job.status.is_terminal() {
            return Ok(false);
        }
        job.status = JobStatus::Cancelled;
        job.cancellation_reason = reason.map(str::to_string);
        job.error_code = Some(error_code::CANCELLED.to_string());
        job.completed_at_ms = Some(now);
        Ok(true)
    }

    async fn requeue(&self, id: &JobId) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock();
        let Some(job) = inner.jobs.get_mut(id) else { return Ok(false) };
        if job.status != JobStatus::Failed || !job.can_retry() {
            return Ok(false);
        }
        Self::clear_for_requeue(job);
        job.retry_count += 1;
        Ok(true)
    }

    async fn requeue_for_timeout(
        &self,
        id: &JobId,
        max_timeout_retries: u32,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock();
        let Some(job) = inner.jobs.get_mut(id) else { return Ok(false) };
        if !job.status.is_in_flight() || job.timeout_count >= max_timeout_retries {
            return Ok(false);
        }
        Self::clear_for_requeue(job);
        job.timeout_count += 1;
        Ok(true)
    }

    async fn update_progress(&self, progress: JobProgress) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock();
        let Some(job) = inner.jobs.get_mut(&progress.job_id) else { return Ok(false) };
        if job.status != JobStatus::Running {
            return Ok(false);
        }
        if let Some(last) = &job.last_progress {
            if progress.sequence <= last.sequence {
                return Ok(false);
            }
        }
        job.last_progress = Some(progress);
        Ok(true)
    }

    async fn count_running_for(&self, agent: &AgentId) -> Result<usize, StoreError> {
        let inner = self.inner.lock();
        Ok(inner
            .jobs
            .values()
            .filter(|j| {
                j.status == JobStatus::Running && j.assigned_agent_id.as_ref() == Some(agent)
            })
            .count())
    }
}

#[cfg(test)]
#[path = "jobs_tests.rs"]
mod tests;
