// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timeout monitor: recover jobs stuck in Assigned or Running.
//!
//! Each sweep checks the ACK deadline on Assigned jobs, the execution
//! deadline on Running jobs, and heartbeat staleness on agents. Recovery
//! is a timeout-flavored requeue bounded by `max_timeout_retries`;
//! exhaustion dead-letters the job. The disconnect path in ingest reuses
//! [`TimeoutMonitor::handle_timeout`] so both roads converge.

use crate::registry::AgentRegistry;
use om_core::{
    error as error_code, format_elapsed_ms, AgentId, AgentStatus, Clock, Job, JobStatus,
    TimeoutConfig,
};
use om_storage::{DeadLetterStore, JobStore, StoreError};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct TimeoutMonitor<C: Clock> {
    jobs: Arc<dyn JobStore>,
    registry: Arc<AgentRegistry>,
    dead_letters: Arc<dyn DeadLetterStore>,
    config: TimeoutConfig,
    clock: C,
    /// Wakes the processor after a requeue so recovery is not poll-bound.
    wake_processor: Arc<Notify>,
}

impl<C: Clock> TimeoutMonitor<C> {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        registry: Arc<AgentRegistry>,
        dead_letters: Arc<dyn DeadLetterStore>,
        config: TimeoutConfig,
        clock: C,
        wake_processor: Arc<Notify>,
    ) -> Self {
        Self { jobs, registry, dead_letters, config, clock, wake_processor }
    }

    /// Spawn the background sweep loop.
    pub fn spawn(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(this.config.check_interval) => {}
                }
                if let Err(e) = this.run_once().await {
                    tracing::warn!(error = %e, "timeout sweep failed");
                }
            }
            tracing::debug!("timeout monitor stopped");
        })
    }

    /// One full sweep. Public so tests drive it with a fake clock.
    pub async fn run_once(&self) -> Result<(), StoreError> {
        let now = self.clock.epoch_ms();
        let ack_ms = self.config.ack_timeout.as_millis() as u64;
        let default_exec_ms = self.config.default_job_timeout.as_millis() as u64;

        for job in self.jobs.get_jobs(Some(JobStatus::Assigned), None).await? {
            let overdue =
                job.assigned_at_ms.is_some_and(|at| now.saturating_sub(at) > ack_ms);
            if overdue {
                self.handle_timeout(&job, "ACK timeout").await?;
            }
        }

        for job in self.jobs.get_jobs(Some(JobStatus::Running), None).await? {
            let limit = job.effective_timeout_ms(default_exec_ms);
            let overdue =
                job.started_at_ms.is_some_and(|at| now.saturating_sub(at) > limit);
            if overdue {
                self.handle_timeout(&job, "Execution timeout").await?;
            }
        }

        self.sweep_heartbeats(now).await?;
        Ok(())
    }

    /// Requeue with a bounded timeout-retry counter; dead-letter and fail
    /// on exhaustion.
    pub async fn handle_timeout(&self, job: &Job, reason: &str) -> Result<(), StoreError> {
        self.recover_or_fail(job, reason, error_code::TIMEOUT_EXCEEDED).await
    }

    /// Recover every in-flight job bound to an agent, timeout-style.
    /// Shared by the disconnect event and the staleness sweep; exhaustion
    /// here records the disconnect, not a deadline, as the cause.
    pub async fn recover_agent_jobs(
        &self,
        agent_id: &AgentId,
        reason: &str,
    ) -> Result<(), StoreError> {
        for status in [JobStatus::Assigned, JobStatus::Running] {
            for job in self.jobs.get_jobs(Some(status), Some(agent_id)).await? {
                self.recover_or_fail(&job, reason, error_code::AGENT_DISCONNECTED).await?;
            }
        }
        Ok(())
    }

    async fn recover_or_fail(
        &self,
        job: &Job,
        reason: &str,
        code: &str,
    ) -> Result<(), StoreError> {
        let now = self.clock.epoch_ms();
        let held_since = job.started_at_ms.or(job.assigned_at_ms).unwrap_or(now);
        let elapsed = format_elapsed_ms(now.saturating_sub(held_since));

        if self.jobs.requeue_for_timeout(&job.id, self.config.max_timeout_retries).await? {
            tracing::info!(
                job_id = %job.id,
                reason,
                elapsed = %elapsed,
                timeout_count = job.timeout_count + 1,
                "job requeued after timeout"
            );
            self.wake_processor.notify_one();
            return Ok(());
        }

        // Fail first so a concurrent sweep cannot dead-letter twice.
        if self.jobs.fail(&job.id, reason, Some(code)).await? {
            if let Some(snapshot) = self.jobs.get(&job.id).await? {
                self.dead_letters.enqueue(snapshot, reason).await?;
            }
            tracing::warn!(job_id = %job.id, reason, elapsed = %elapsed, code,
                "timeout retries exhausted");
        }
        Ok(())
    }

    async fn sweep_heartbeats(&self, now: u64) -> Result<(), StoreError> {
        let stale_ms = self.config.heartbeat_timeout.as_millis() as u64;
        for agent in self.registry.get_all().await? {
            let silent = now.saturating_sub(agent.last_heartbeat_ms) > stale_ms;
            let connected = matches!(agent.status, AgentStatus::Ready | AgentStatus::Running);
            if silent && connected {
                tracing::warn!(
                    agent_id = %agent.id,
                    last_heartbeat_ms = agent.last_heartbeat_ms,
                    "agent heartbeat stale, marking disconnected"
                );
                self.registry.detach_handle(&agent.id);
                self.registry.update_status(&agent.id, AgentStatus::Disconnected).await?;
                self.recover_agent_jobs(&agent.id, "Agent heartbeat lost").await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;
