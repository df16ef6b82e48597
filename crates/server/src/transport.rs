// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Outbound half of an agent connection.
//!
//! The registry holds these behind `Weak` so a dead connection can never
//! be dispatched against: the connection task owns the only `Arc`, and it
//! drops on disconnect.

use crate::error::DispatchError;
use async_trait::async_trait;
use om_core::AgentId;
use om_wire::{write_message, ProtocolError, ServerMessage};
use std::time::Duration;
use tokio::net::tcp::OwnedWriteHalf;

/// Default per-call push deadline.
pub const INVOKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Push messages to one connected agent.
#[async_trait]
pub trait AgentConnection: Send + Sync + 'static {
    fn agent_id(&self) -> &AgentId;

    /// Push a message, honoring the per-call deadline.
    async fn invoke(&self, msg: ServerMessage) -> Result<(), DispatchError>;
}

/// Frame-writing connection over the TCP write half.
pub struct FrameConnection {
    agent_id: AgentId,
    writer: tokio::sync::Mutex<OwnedWriteHalf>,
    call_timeout: Duration,
}

impl FrameConnection {
    pub fn new(agent_id: AgentId, writer: OwnedWriteHalf) -> Self {
        Self { agent_id, writer: tokio::sync::Mutex::new(writer), call_timeout: INVOKE_TIMEOUT }
    }
}

#[async_trait]
impl AgentConnection for FrameConnection {
    fn agent_id(&self) -> &AgentId {
        &self.agent_id
    }

    async fn invoke(&self, msg: ServerMessage) -> Result<(), DispatchError> {
        let method = msg.method();
        let mut writer = self.writer.lock().await;
        match write_message(&mut *writer, &msg, self.call_timeout).await {
            Ok(()) => {
                tracing::debug!(agent_id = %self.agent_id, method, "pushed message");
                Ok(())
            }
            Err(ProtocolError::Timeout) => {
                Err(DispatchError::Timeout(format!("{method} push to {}", self.agent_id)))
            }
            Err(e) => Err(DispatchError::TransportFailure(e.to_string())),
        }
    }
}

/// Scripted behavior for the fake transport.
#[cfg(any(test, feature = "test-support"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FakeBehavior {
    /// Accept every push.
    #[default]
    Accept,
    /// Fail every push with a transport error.
    FailTransport,
}

/// In-process transport double that records every push.
#[cfg(any(test, feature = "test-support"))]
pub struct FakeConnection {
    agent_id: AgentId,
    behavior: parking_lot::Mutex<FakeBehavior>,
    calls: parking_lot::Mutex<Vec<ServerMessage>>,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeConnection {
    pub fn new(agent_id: impl Into<AgentId>) -> std::sync::Arc<Self> {
        std::sync::Arc::new(Self {
            agent_id: agent_id.into(),
            behavior: parking_lot::Mutex::new(FakeBehavior::Accept),
            calls: parking_lot::Mutex::new(Vec::new()),
        })
    }

    pub fn set_behavior(&self, behavior: FakeBehavior) {
        *self.behavior.lock() = behavior;
    }

    /// Every message pushed so far.
    pub fn calls(&self) -> Vec<ServerMessage> {
        self.calls.lock().clone()
    }

    /// Job requests pushed via ExecuteJob, in order.
    pub fn executed_jobs(&self) -> Vec<om_core::JobRequest> {
        self.calls
            .lock()
            .iter()
            .filter_map(|m| match m {
                ServerMessage::ExecuteJob { request } => Some(request.clone()),
                _ => None,
            })
            .collect()
    }

    /// Job ids pushed via CancelJob, in order.
    pub fn cancelled_jobs(&self) -> Vec<om_core::JobId> {
        self.calls
            .lock()
            .iter()
            .filter_map(|m| match m {
                ServerMessage::CancelJob { job_id } => Some(job_id.clone()),
                _ => None,
            })
            .collect()
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl AgentConnection for FakeConnection {
    fn agent_id(&self) -> &AgentId {
        &self.agent_id
    }

    async fn invoke(&self, msg: ServerMessage) -> Result<(), DispatchError> {
        let behavior = *self.behavior.lock();
        self.calls.lock().push(msg);
        match behavior {
            FakeBehavior::Accept => Ok(()),
            FakeBehavior::FailTransport => {
                Err(DispatchError::TransportFailure("fake transport refused".into()))
            }
        }
    }
}
