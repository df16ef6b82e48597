// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dispatcher: bind a Pending job to an agent and push it.
//!
//! Recoverable failures (lost CAS race, transport refusal) come back as
//! unsuccessful [`DispatchResult`]s for the processor to retry; only
//! adapter faults escape as errors. If the push fails after the
//! assignment succeeded, the job stays Assigned and the timeout monitor
//! recovers it — the compensating transition, not a rollback.

use crate::error::DispatchError;
use crate::registry::AgentRegistry;
use crate::router::{AgentRouter, RoutingRequest};
use om_core::{AgentId, AgentRecord, Clock, Job, JobId, JobStatus};
use om_storage::JobStore;
use om_wire::ServerMessage;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Outcome of one dispatch attempt.
#[derive(Debug, Clone)]
pub struct DispatchResult {
    pub success: bool,
    pub agent_id: Option<AgentId>,
    pub failure_reason: Option<String>,
    pub timestamp_ms: u64,
}

impl DispatchResult {
    fn ok(agent_id: AgentId, now_ms: u64) -> Self {
        Self { success: true, agent_id: Some(agent_id), failure_reason: None, timestamp_ms: now_ms }
    }

    fn failed(reason: impl Into<String>, now_ms: u64) -> Self {
        Self {
            success: false,
            agent_id: None,
            failure_reason: Some(reason.into()),
            timestamp_ms: now_ms,
        }
    }
}

/// Counter snapshot for the statistics surface.
#[derive(Debug, Clone, Serialize)]
pub struct Statistics {
    pub total_dispatched: u64,
    pub total_failed: u64,
    pub pending_jobs: usize,
    pub running_jobs: usize,
    pub connected_agents: usize,
}

#[derive(Default)]
struct Counters {
    total_dispatched: AtomicU64,
    total_failed: AtomicU64,
}

pub struct Dispatcher<C: Clock> {
    registry: Arc<AgentRegistry>,
    router: AgentRouter,
    jobs: Arc<dyn JobStore>,
    counters: Counters,
    clock: C,
}

impl<C: Clock> Dispatcher<C> {
    pub fn new(
        registry: Arc<AgentRegistry>,
        router: AgentRouter,
        jobs: Arc<dyn JobStore>,
        clock: C,
    ) -> Self {
        Self { registry, router, jobs, counters: Counters::default(), clock }
    }

    /// Dispatch, resolving the target through the request's hard
    /// constraint or the router.
    pub async fn dispatch(&self, job: &Job) -> Result<DispatchResult, DispatchError> {
        let agent = match &job.request.target_agent_id {
            Some(target) => match self.resolve_target(target).await? {
                Some(agent) => agent,
                None => {
                    return Ok(self.record_failure(format!(
                        "target agent {target} is not available"
                    )));
                }
            },
            None => {
                let routing = RoutingRequest::from_request(&job.request);
                match self.router.select(&routing).await? {
                    Some(agent) => agent,
                    None => return Ok(self.record_failure("no eligible agent".to_string())),
                }
            }
        };
        self.dispatch_to(job, &agent).await
    }

    /// Dispatch to an already-selected agent.
    pub async fn dispatch_to(
        &self,
        job: &Job,
        agent: &AgentRecord,
    ) -> Result<DispatchResult, DispatchError> {
        if !self.jobs.assign(&job.id, &agent.id).await? {
            return Ok(self.record_failure(format!(
                "lost assignment race for job {} (stale state)",
                job.id
            )));
        }

        let Some(handle) = self.registry.live_handle(&agent.id) else {
            // Assigned with no live transport: the monitor's ACK-timeout
            // sweep requeues it.
            return Ok(self.record_failure(format!("agent {} transport gone", agent.id)));
        };

        let push = handle
            .invoke(ServerMessage::ExecuteJob { request: job.request.clone() })
            .await;
        match push {
            Ok(()) => {
                let now = self.clock.epoch_ms();
                self.counters.total_dispatched.fetch_add(1, Ordering::Relaxed);
                tracing::info!(job_id = %job.id, agent_id = %agent.id, "job dispatched");
                Ok(DispatchResult::ok(agent.id.clone(), now))
            }
            Err(e) => {
                tracing::warn!(job_id = %job.id, agent_id = %agent.id, error = %e, "push failed");
                Ok(self.record_failure(format!("push to {} failed: {e}", agent.id)))
            }
        }
    }

    /// Cancel a job, telling the executing agent first when one is live.
    /// Returns false when the job is unknown or already terminal.
    pub async fn cancel_job(
        &self,
        id: &JobId,
        reason: Option<&str>,
    ) -> Result<bool, DispatchError> {
        let Some(job) = self.jobs.get(id).await? else { return Ok(false) };

        if job.status.is_in_flight() {
            if let Some(agent_id) = &job.assigned_agent_id {
                // Best effort: transport failure is logged, never fatal.
                if let Err(e) = self.send_cancel_to_agent(id, agent_id).await {
                    tracing::warn!(job_id = %id, agent_id = %agent_id, error = %e,
                        "cancel push failed");
                }
            }
        }

        Ok(self.jobs.cancel(id, reason).await?)
    }

    /// Direct cancel push with no job-state update. Used when the server
    /// already treats the job as terminal on its side.
    pub async fn send_cancel_to_agent(
        &self,
        job_id: &JobId,
        agent_id: &AgentId,
    ) -> Result<(), DispatchError> {
        let Some(handle) = self.registry.live_handle(agent_id) else {
            return Err(DispatchError::TransportFailure(format!(
                "agent {agent_id} has no live transport"
            )));
        };
        handle.invoke(ServerMessage::CancelJob { job_id: job_id.clone() }).await
    }

    /// Counter snapshot plus live gauges.
    pub async fn statistics(&self) -> Result<Statistics, DispatchError> {
        let pending = self.jobs.get_jobs(Some(JobStatus::Pending), None).await?.len();
        let running = self.jobs.get_jobs(Some(JobStatus::Running), None).await?.len();
        Ok(Statistics {
            total_dispatched: self.counters.total_dispatched.load(Ordering::Relaxed),
            total_failed: self.counters.total_failed.load(Ordering::Relaxed),
            pending_jobs: pending,
            running_jobs: running,
            connected_agents: self.registry.connected_count(),
        })
    }

    async fn resolve_target(
        &self,
        target: &AgentId,
    ) -> Result<Option<AgentRecord>, DispatchError> {
        let Some(agent) = self.registry.get(target).await? else { return Ok(None) };
        if self.registry.is_dispatchable(target).await? {
            Ok(Some(agent))
        } else {
            Ok(None)
        }
    }

    fn record_failure(&self, reason: String) -> DispatchResult {
        self.counters.total_failed.fetch_add(1, Ordering::Relaxed);
        DispatchResult::failed(reason, self.clock.epoch_ms())
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
