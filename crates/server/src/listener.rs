// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener task for agent connections.
//!
//! Accepts TCP connections, runs the Hello handshake (with the optional
//! shared token), registers the agent, then pumps inbound frames into the
//! ingest handlers until the transport drops. The connection task owns
//! the only `Arc` of its write handle; the registry sees a `Weak`, so a
//! dead connection can never be dispatched against.

use crate::ingest::IngestHandlers;
use crate::registry::AgentRegistry;
use crate::transport::{AgentConnection, FrameConnection};
use om_core::{AgentRecord, AgentStatus, Clock};
use om_wire::{read_message, write_message, AgentHello, AgentMessage, ProtocolError, ServerMessage};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Deadline for the first (Hello) frame.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct AgentListener<C: Clock> {
    registry: Arc<AgentRegistry>,
    ingest: Arc<IngestHandlers<C>>,
    /// Shared secret agents must present (from `OM_AUTH_TOKEN`); None
    /// accepts every handshake.
    auth_token: Option<String>,
    /// Advertised to agents in the HelloAck.
    heartbeat_interval: Duration,
    /// An agent silent past this deadline counts as disconnected.
    read_deadline: Duration,
    clock: C,
}

impl<C: Clock> AgentListener<C> {
    pub fn new(
        registry: Arc<AgentRegistry>,
        ingest: Arc<IngestHandlers<C>>,
        auth_token: Option<String>,
        heartbeat_interval: Duration,
        read_deadline: Duration,
        clock: C,
    ) -> Arc<Self> {
        Arc::new(Self { registry, ingest, auth_token, heartbeat_interval, read_deadline, clock })
    }

    /// Accept loop; one task per connection.
    pub async fn run(self: Arc<Self>, listener: TcpListener, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => {
                            debug!(%addr, "agent connection accepted");
                            let this = Arc::clone(&self);
                            let cancel = cancel.clone();
                            tokio::spawn(async move {
                                this.handle_connection(stream, cancel).await;
                            });
                        }
                        Err(e) => warn!(error = %e, "accept failed"),
                    }
                }
            }
        }
        debug!("agent listener stopped");
    }

    async fn handle_connection(&self, stream: TcpStream, cancel: CancellationToken) {
        let (mut reader, mut writer) = stream.into_split();

        // First frame must be Hello, within the handshake window.
        let hello = match read_message::<_, AgentMessage>(&mut reader, HANDSHAKE_TIMEOUT).await {
            Ok(AgentMessage::Hello(hello)) => hello,
            Ok(other) => {
                warn!(message = ?other, "connection opened without hello");
                let reject = ServerMessage::Error {
                    message: "connections must start with hello".to_string(),
                };
                let _ = write_message(&mut writer, &reject, HANDSHAKE_TIMEOUT).await;
                return;
            }
            Err(e) => {
                debug!(error = %e, "handshake failed");
                return;
            }
        };

        if let Some(expected) = &self.auth_token {
            if hello.token.as_deref() != Some(expected.as_str()) {
                warn!(agent_id = %hello.agent_id, "handshake rejected: bad token");
                let reject = ServerMessage::Error { message: "unauthorized".to_string() };
                let _ = write_message(&mut writer, &reject, HANDSHAKE_TIMEOUT).await;
                return;
            }
        }

        let agent_id = hello.agent_id.clone();
        let conn: Arc<dyn AgentConnection> =
            Arc::new(FrameConnection::new(agent_id.clone(), writer));

        let record = record_from_hello(&hello, self.clock.epoch_ms());
        if let Err(e) = self.registry.register(record, Some(&conn)).await {
            warn!(agent_id = %agent_id, error = %e, "registration failed");
            return;
        }

        let ack = ServerMessage::HelloAck {
            version: crate::env::PROTOCOL_VERSION.to_string(),
            heartbeat_interval_ms: self.heartbeat_interval.as_millis() as u64,
        };
        if let Err(e) = conn.invoke(ack).await {
            warn!(agent_id = %agent_id, error = %e, "hello ack failed");
            self.ingest.on_disconnect(&agent_id).await;
            return;
        }
        info!(agent_id = %agent_id, name = %hello.name, version = %hello.version,
            "agent connected");

        // Inbound pump until EOF, protocol error, silence, or shutdown.
        loop {
            let message = tokio::select! {
                _ = cancel.cancelled() => break,
                msg = read_message::<_, AgentMessage>(&mut reader, self.read_deadline) => msg,
            };
            match message {
                Ok(AgentMessage::Acknowledge { job_id }) => {
                    self.ingest.on_acknowledge(&job_id, &agent_id).await;
                }
                Ok(AgentMessage::Progress { progress }) => {
                    self.ingest.on_progress(progress).await;
                }
                Ok(AgentMessage::Result { result }) => {
                    self.ingest.on_result(result).await;
                }
                Ok(AgentMessage::Heartbeat) => {
                    self.ingest.on_heartbeat(&agent_id).await;
                }
                Ok(AgentMessage::Hello(_)) => {
                    warn!(agent_id = %agent_id, "duplicate hello ignored");
                }
                Err(ProtocolError::ConnectionClosed) => {
                    debug!(agent_id = %agent_id, "agent hung up");
                    break;
                }
                Err(ProtocolError::Timeout) => {
                    warn!(agent_id = %agent_id, "agent silent past deadline");
                    break;
                }
                Err(e) => {
                    warn!(agent_id = %agent_id, error = %e, "protocol error");
                    break;
                }
            }
        }

        drop(conn); // the registry's Weak dies with this
        self.ingest.on_disconnect(&agent_id).await;
    }
}

/// Build the registry record an agent's handshake describes. It connects
/// straight into Ready: enrollment happened before this connection.
fn record_from_hello(hello: &AgentHello, now_ms: u64) -> AgentRecord {
    let mut record = AgentRecord::new(hello.agent_id.clone(), hello.name.clone(), now_ms);
    record.group = hello.group.clone();
    record.tags = hello.tags.clone();
    record.capabilities = hello.capabilities.clone();
    record.metadata = hello.metadata.clone();
    record.status = AgentStatus::Ready;
    record
}
