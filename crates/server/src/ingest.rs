// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ingest handlers: agent-facing entry points for ACK, progress, result,
//! heartbeat, and disconnect events.
//!
//! Handlers never propagate errors back to the transport. A malformed or
//! stale event from one agent is logged and swallowed; it cannot crash
//! the connection or cascade into other jobs.

use crate::monitor::TimeoutMonitor;
use crate::progress::ProgressService;
use crate::registry::AgentRegistry;
use om_core::{AgentId, AgentStatus, Clock, JobId, JobProgress, JobResult, ResultStatus};
use om_storage::JobStore;
use std::sync::Arc;
use tokio::sync::Notify;

pub struct IngestHandlers<C: Clock> {
    jobs: Arc<dyn JobStore>,
    registry: Arc<AgentRegistry>,
    progress: Arc<ProgressService>,
    monitor: Arc<TimeoutMonitor<C>>,
    wake_processor: Arc<Notify>,
    clock: C,
}

impl<C: Clock> IngestHandlers<C> {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        registry: Arc<AgentRegistry>,
        progress: Arc<ProgressService>,
        monitor: Arc<TimeoutMonitor<C>>,
        wake_processor: Arc<Notify>,
        clock: C,
    ) -> Self {
        Self { jobs, registry, progress, monitor, wake_processor, clock }
    }

    /// Assigned → Running, and the agent goes Running with it.
    pub async fn on_acknowledge(&self, job_id: &JobId, agent_id: &AgentId) {
        match self.jobs.acknowledge(job_id, agent_id).await {
            Ok(true) => {
                tracing::info!(job_id = %job_id, agent_id = %agent_id, "job acknowledged");
                if let Err(e) = self.registry.update_status(agent_id, AgentStatus::Running).await {
                    tracing::warn!(agent_id = %agent_id, error = %e, "status update failed");
                }
            }
            Ok(false) => {
                // Stale ACK: the job timed out, was cancelled, or belongs
                // to another agent now.
                tracing::warn!(job_id = %job_id, agent_id = %agent_id, "stale acknowledge dropped");
            }
            Err(e) => tracing::warn!(job_id = %job_id, error = %e, "acknowledge failed"),
        }
    }

    /// Record progress and fan it out to observers.
    pub async fn on_progress(&self, progress: JobProgress) {
        match self.jobs.update_progress(progress.clone()).await {
            Ok(true) => {
                self.progress.report(progress);
            }
            Ok(false) => {
                tracing::debug!(
                    job_id = %progress.job_id,
                    sequence = progress.sequence,
                    "stale or misdirected progress dropped"
                );
            }
            Err(e) => tracing::warn!(job_id = %progress.job_id, error = %e, "progress failed"),
        }
    }

    /// Terminal outcome from an agent. A failed result with retry budget
    /// left requeues the job.
    pub async fn on_result(&self, result: JobResult) {
        let job_id = result.job_id.clone();
        let agent_id = result.agent_id.clone();

        let outcome = match result.status {
            ResultStatus::Completed => self.jobs.complete(&job_id, result).await,
            ResultStatus::Failed => {
                let error = result.error.clone().unwrap_or_else(|| "agent reported failure".into());
                match self.jobs.fail(&job_id, &error, result.error_code.as_deref()).await {
                    Ok(true) => {
                        if self.jobs.requeue(&job_id).await.unwrap_or(false) {
                            tracing::info!(job_id = %job_id, "failed job requeued for retry");
                            self.wake_processor.notify_one();
                        }
                        Ok(true)
                    }
                    other => other,
                }
            }
        };

        match outcome {
            Ok(true) => {
                tracing::info!(job_id = %job_id, agent_id = %agent_id, "result ingested");
                self.settle_agent_status(&agent_id).await;
            }
            Ok(false) => {
                tracing::warn!(job_id = %job_id, agent_id = %agent_id, "stale result dropped");
            }
            Err(e) => tracing::warn!(job_id = %job_id, error = %e, "result ingest failed"),
        }
    }

    /// Refresh liveness; a Disconnected agent that heartbeats is Ready again.
    pub async fn on_heartbeat(&self, agent_id: &AgentId) {
        let now = self.clock.epoch_ms();
        if let Err(e) = self.registry.update_heartbeat(agent_id, now).await {
            tracing::warn!(agent_id = %agent_id, error = %e, "heartbeat update failed");
            return;
        }
        match self.registry.get(agent_id).await {
            Ok(Some(record)) if record.status == AgentStatus::Disconnected => {
                tracing::info!(agent_id = %agent_id, "agent back from disconnected");
                if let Err(e) = self.registry.update_status(agent_id, AgentStatus::Ready).await {
                    tracing::warn!(agent_id = %agent_id, error = %e, "status update failed");
                }
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(agent_id = %agent_id, error = %e, "heartbeat lookup failed"),
        }
    }

    /// Transport lost: mark Disconnected and recover the agent's jobs NOW
    /// rather than waiting for the next monitor cycle.
    pub async fn on_disconnect(&self, agent_id: &AgentId) {
        tracing::info!(agent_id = %agent_id, "agent disconnected");
        self.registry.detach_handle(agent_id);
        if let Err(e) = self.registry.update_status(agent_id, AgentStatus::Disconnected).await {
            tracing::warn!(agent_id = %agent_id, error = %e, "status update failed");
        }
        if let Err(e) = self.monitor.recover_agent_jobs(agent_id, "Agent disconnected").await {
            tracing::warn!(agent_id = %agent_id, error = %e, "disconnect recovery failed");
        }
    }

    /// Running → Ready once the agent holds no more running jobs.
    async fn settle_agent_status(&self, agent_id: &AgentId) {
        let still_running = self.jobs.count_running_for(agent_id).await.unwrap_or(0);
        if still_running > 0 {
            return;
        }
        match self.registry.get(agent_id).await {
            Ok(Some(record)) if record.status == AgentStatus::Running => {
                if let Err(e) = self.registry.update_status(agent_id, AgentStatus::Ready).await {
                    tracing::warn!(agent_id = %agent_id, error = %e, "status update failed");
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
#[path = "ingest_tests.rs"]
mod tests;
