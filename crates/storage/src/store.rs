// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Storage interfaces consumed by the control plane.

use async_trait::async_trait;
use om_core::{
    AgentId, AgentRecord, AgentStatus, DeadLetterEntry, DeadLetterId, Job, JobId, JobProgress,
    JobRequest, JobResult, JobStatus,
};
use thiserror::Error;

/// Adapter fault. The in-memory adapter never produces one; durable
/// adapters map their I/O and serialization failures here.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("adapter i/o: {0}")]
    Io(String),

    #[error("adapter serialization: {0}")]
    Serialization(String),
}

/// Job records and their state machine.
///
/// Transition operations are CAS-style against the record's current
/// status: they return `Ok(false)` when the record is missing or not in
/// the required state (the caller's view is stale), never an error.
#[async_trait]
pub trait JobStore: Send + Sync + 'static {
    /// One-time schema/state setup.
    async fn initialize(&self) -> Result<(), StoreError>;

    /// Idempotent enqueue. A hit on `request.idempotency_key` within the
    /// adapter's TTL returns the existing record unchanged; otherwise a
    /// Pending record is created.
    async fn enqueue(&self, request: JobRequest) -> Result<Job, StoreError>;

    async fn get(&self, id: &JobId) -> Result<Option<Job>, StoreError>;

    /// Pending jobs ordered by (priority desc, created_at asc), FIFO at
    /// equal priority.
    async fn get_pending(&self) -> Result<Vec<Job>, StoreError>;

    /// Filtered listing; both filters optional.
    async fn get_jobs(
        &self,
        status: Option<JobStatus>,
        agent: Option<&AgentId>,
    ) -> Result<Vec<Job>, StoreError>;

    /// Atomically claim the highest-priority Pending job whose required
    /// capabilities are a subset of `capabilities` (when given). The claim
    /// moves it to Assigned with no agent; `assign` later binds one.
    async fn dequeue_next(&self, capabilities: Option<&[String]>)
        -> Result<Option<Job>, StoreError>;

    /// Bind an agent. Accepts a Pending job or an agentless claim from
    /// `dequeue_next`; refuses anything else.
    async fn assign(&self, id: &JobId, agent: &AgentId) -> Result<bool, StoreError>;

    /// Assigned → Running, gated on the ACKing agent being the assignee.
    async fn acknowledge(&self, id: &JobId, agent: &AgentId) -> Result<bool, StoreError>;

    /// Running → Completed.
    async fn complete(&self, id: &JobId, result: JobResult) -> Result<bool, StoreError>;

    /// Any non-terminal state → Failed. (Dispatch exhaustion fails jobs
    /// straight out of Pending.)
    async fn fail(&self, id: &JobId, error: &str, code: Option<&str>) -> Result<bool, StoreError>;

    /// {Pending, Assigned, Running} → Cancelled, recording the
    /// `CANCELLED` error code. A second cancel returns false.
    async fn cancel(&self, id: &JobId, reason: Option<&str>) -> Result<bool, StoreError>;

    /// Failed → Pending when the retry budget allows; clears agent,
    /// timestamps, error, and progress; bumps `retry_count`.
    async fn requeue(&self, id: &JobId) -> Result<bool, StoreError>;

    /// {Assigned, Running} → Pending when `timeout_count` is under the
    /// limit; clears agent, timestamps, error, and progress; bumps
    /// `timeout_count`. Does NOT touch `retry_count`.
    async fn requeue_for_timeout(
        &self,
        id: &JobId,
        max_timeout_retries: u32,
    ) -> Result<bool, StoreError>;

    /// Record progress on a Running job. Out-of-order sequences are
    /// ignored (returns false).
    async fn update_progress(&self, progress: JobProgress) -> Result<bool, StoreError>;

    /// Number of Running jobs assigned to the agent (least-connections input).
    async fn count_running_for(&self, agent: &AgentId) -> Result<usize, StoreError>;
}

/// Agent records. Live transport handles are the registry's problem; only
/// the durable half of an agent lives here.
#[async_trait]
pub trait AgentStore: Send + Sync + 'static {
    async fn initialize(&self) -> Result<(), StoreError>;

    /// Upsert by id; at most one record per id.
    async fn register(&self, record: AgentRecord) -> Result<(), StoreError>;

    async fn unregister(&self, id: &AgentId) -> Result<bool, StoreError>;

    async fn get(&self, id: &AgentId) -> Result<Option<AgentRecord>, StoreError>;

    async fn get_all(&self) -> Result<Vec<AgentRecord>, StoreError>;

    /// Case-insensitive capability lookup.
    async fn get_by_capability(&self, name: &str) -> Result<Vec<AgentRecord>, StoreError>;

    /// Case-insensitive group lookup.
    async fn get_by_group(&self, group: &str) -> Result<Vec<AgentRecord>, StoreError>;

    /// No-op on an unknown id.
    async fn update_status(&self, id: &AgentId, status: AgentStatus) -> Result<(), StoreError>;

    /// No-op on an unknown id.
    async fn update_heartbeat(&self, id: &AgentId, ts_ms: u64) -> Result<(), StoreError>;
}

/// Dead-letter entries: jobs beyond automatic recovery, held for
/// inspection and manual resubmission.
#[async_trait]
pub trait DeadLetterStore: Send + Sync + 'static {
    async fn initialize(&self) -> Result<(), StoreError>;

    async fn enqueue(&self, job: Job, reason: &str) -> Result<DeadLetterEntry, StoreError>;

    async fn get(&self, id: &DeadLetterId) -> Result<Option<DeadLetterEntry>, StoreError>;

    async fn get_by_job_id(&self, job_id: &JobId) -> Result<Option<DeadLetterEntry>, StoreError>;

    /// FIFO by enqueue order.
    async fn get_all(&self) -> Result<Vec<DeadLetterEntry>, StoreError>;

    /// Flag for manual resubmission; bumps `retry_attempts`.
    async fn mark_for_retry(&self, id: &DeadLetterId) -> Result<bool, StoreError>;

    async fn get_pending_retry(&self) -> Result<Vec<DeadLetterEntry>, StoreError>;

    async fn remove(&self, id: &DeadLetterId) -> Result<bool, StoreError>;

    /// Drop everything; returns how many entries were held.
    async fn purge(&self) -> Result<usize, StoreError>;

    async fn count(&self) -> Result<usize, StoreError>;
}
