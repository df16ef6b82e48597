// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job record, submission request, and state machine types.

use crate::id::{AgentId, JobId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Status of a job record.
///
/// Transitions are enforced by the job store's CAS discipline; see the
/// store contract for the full machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting for dispatch
    Pending,
    /// Bound to an agent (or claimed by a puller), awaiting ACK
    Assigned,
    /// Agent acknowledged and is executing
    Running,
    /// Terminal: agent reported success
    Completed,
    /// Terminal: execution or dispatch failed beyond retry
    Failed,
    /// Terminal: cancelled by a caller
    Cancelled,
    /// Terminal: deadline exceeded beyond timeout retries
    TimedOut,
}

impl JobStatus {
    /// Terminal states never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled | JobStatus::TimedOut
        )
    }

    /// States in which an agent may currently hold the job.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, JobStatus::Assigned | JobStatus::Running)
    }
}

crate::simple_display! {
    JobStatus {
        Pending => "pending",
        Assigned => "assigned",
        Running => "running",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
        TimedOut => "timed_out",
    }
}

/// An immutable job submission.
///
/// `idempotency_key` is required and caller-supplied; the server never
/// synthesizes one from the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRequest {
    pub id: JobId,
    pub idempotency_key: String,
    /// Opaque command name, e.g. `orbit:file:sync`.
    pub command: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub payload: Vec<u8>,
    /// Higher wins; FIFO within equal priority.
    #[serde(default)]
    pub priority: i32,
    /// Hard constraint: dispatch only to this agent or fail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_agent_id: Option<AgentId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_capabilities: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_tags: Vec<String>,
    /// Execution deadline; the server default applies when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub max_retries: u32,
}

impl JobRequest {
    pub fn builder(
        id: impl Into<JobId>,
        idempotency_key: impl Into<String>,
        command: impl Into<String>,
    ) -> JobRequestBuilder {
        JobRequestBuilder {
            id: id.into(),
            idempotency_key: idempotency_key.into(),
            command: command.into(),
            payload: Vec::new(),
            priority: 0,
            target_agent_id: None,
            required_capabilities: Vec::new(),
            required_tags: Vec::new(),
            timeout_ms: None,
            max_retries: 0,
        }
    }
}

pub struct JobRequestBuilder {
    id: JobId,
    idempotency_key: String,
    command: String,
    payload: Vec<u8>,
    priority: i32,
    target_agent_id: Option<AgentId>,
    required_capabilities: Vec<String>,
    required_tags: Vec<String>,
    timeout_ms: Option<u64>,
    max_retries: u32,
}

impl JobRequestBuilder {
    crate::setters! {
        set {
            payload: Vec<u8>,
            priority: i32,
            required_capabilities: Vec<String>,
            required_tags: Vec<String>,
            max_retries: u32,
        }
        option {
            target_agent_id: AgentId,
            timeout_ms: u64,
        }
    }

    pub fn build(self) -> JobRequest {
        JobRequest {
            id: self.id,
            idempotency_key: self.idempotency_key,
            command: self.command,
            payload: self.payload,
            priority: self.priority,
            target_agent_id: self.target_agent_id,
            required_capabilities: self.required_capabilities,
            required_tags: self.required_tags,
            timeout_ms: self.timeout_ms,
            max_retries: self.max_retries,
        }
    }
}

/// Outcome reported by an agent for a finished job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Completed,
    Failed,
}

crate::simple_display! {
    ResultStatus {
        Completed => "completed",
        Failed => "failed",
    }
}

/// Result payload delivered by an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    pub job_id: JobId,
    pub agent_id: AgentId,
    pub status: ResultStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    pub started_at_ms: u64,
    pub completed_at_ms: u64,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

/// A progress report for a running job.
///
/// `sequence` is monotonic per job; observers drop stale updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobProgress {
    pub job_id: JobId,
    pub sequence: u64,
    /// 0–100
    pub percentage: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_step: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_steps: Option<u32>,
}

/// A job record: one unit of work from submission to terminal state.
///
/// Owned exclusively by the job store; callers receive snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub request: JobRequest,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_agent_id: Option<AgentId>,
    pub created_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// Execution retries consumed (bounded by `request.max_retries`).
    #[serde(default)]
    pub retry_count: u32,
    /// Timeout requeues consumed (bounded by the monitor's limit).
    #[serde(default)]
    pub timeout_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_progress: Option<JobProgress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
}

impl Job {
    /// Create a Pending record from a submission.
    pub fn new(request: JobRequest, now_ms: u64) -> Self {
        Self {
            id: request.id.clone(),
            request,
            status: JobStatus::Pending,
            assigned_agent_id: None,
            created_at_ms: now_ms,
            assigned_at_ms: None,
            started_at_ms: None,
            completed_at_ms: None,
            result: None,
            error: None,
            error_code: None,
            retry_count: 0,
            timeout_count: 0,
            last_progress: None,
            cancellation_reason: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Whether another execution retry is allowed.
    pub fn can_retry(&self) -> bool {
        self.retry_count < self.request.max_retries
    }

    /// Execution deadline in milliseconds, falling back to the server default.
    pub fn effective_timeout_ms(&self, default_ms: u64) -> u64 {
        self.request.timeout_ms.unwrap_or(default_ms)
    }
}

crate::builder! {
    pub struct JobBuilder => Job {
        into {
            id: JobId = "job-test-1",
        }
        set {
            request: JobRequest = JobRequest::builder("job-test-1", "key-1", "orbit:test").build(),
            status: JobStatus = JobStatus::Pending,
            created_at_ms: u64 = 1_000_000,
            retry_count: u32 = 0,
            timeout_count: u32 = 0,
        }
        option {
            assigned_agent_id: AgentId = None,
            assigned_at_ms: u64 = None,
            started_at_ms: u64 = None,
            completed_at_ms: u64 = None,
            result: JobResult = None,
            error: String = None,
            error_code: String = None,
            last_progress: JobProgress = None,
            cancellation_reason: String = None,
        }
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
