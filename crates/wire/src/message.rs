// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Protocol messages exchanged over a persistent agent connection.

use om_core::{AgentId, Capability, JobId, JobProgress, JobRequest, JobResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Identity an agent presents in its `hello` handshake.
///
/// Enrollment (bootstrap tokens, certificates) happens elsewhere; by the
/// time a connection reaches us the agent already owns its id, and `token`
/// is the shared listener secret, not an enrollment credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentHello {
    pub agent_id: AgentId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub capabilities: Vec<Capability>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub version: String,
}

/// Agent → server messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentMessage {
    /// Connection handshake; must be the first frame on a connection.
    Hello(AgentHello),

    /// The agent received the job and will execute it.
    Acknowledge { job_id: JobId },

    /// Progress report for a running job.
    Progress { progress: JobProgress },

    /// Terminal outcome for a job.
    Result { result: JobResult },

    /// Liveness signal.
    Heartbeat,
}

/// Server → agent messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Handshake accepted.
    HelloAck { version: String, heartbeat_interval_ms: u64 },

    /// Push a job to the agent for execution.
    ExecuteJob { request: JobRequest },

    /// Best-effort cancellation of a job the agent holds.
    CancelJob { job_id: JobId },

    /// Terminal protocol error; the server closes the connection after this.
    Error { message: String },
}

impl ServerMessage {
    /// Short method name for logs.
    pub fn method(&self) -> &'static str {
        match self {
            ServerMessage::HelloAck { .. } => "HelloAck",
            ServerMessage::ExecuteJob { .. } => "ExecuteJob",
            ServerMessage::CancelJob { .. } => "CancelJob",
            ServerMessage::Error { .. } => "Error",
        }
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
