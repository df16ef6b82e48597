// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scenario harness: an in-process control plane with dispatch workers
//! running, a controllable clock, and scripted agent transports.

use om_core::{AgentRecord, AgentStatus, Capability, Clock, FakeClock, JobRequest, MeshConfig};
use om_server::{AgentConnection, FakeConnection, MeshServer, ProcessorHandle};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub struct Mesh {
    pub server: MeshServer<FakeClock>,
    pub clock: FakeClock,
    cancel: CancellationToken,
    processor: Option<ProcessorHandle>,
}

/// Millisecond-scale intervals so scenarios finish fast.
pub fn fast_config() -> MeshConfig {
    let mut config = MeshConfig::default();
    config.processor.max_concurrency = 4;
    config.processor.polling_interval = Duration::from_millis(20);
    config.processor.retry_delay = Duration::from_millis(50);
    config.timeout.ack_timeout = Duration::from_millis(200);
    config
}

impl Mesh {
    /// Build the server and start its dispatch workers. The timeout
    /// monitor is driven manually via `server.monitor.run_once()` so
    /// scenarios control time with the fake clock.
    pub fn start(config: MeshConfig) -> Self {
        let mut mesh = Self::paused(config);
        mesh.spawn_processor();
        mesh
    }

    /// Build without dispatch workers; scenarios that need to stage the
    /// queue before any pickup call `spawn_processor` themselves.
    pub fn paused(config: MeshConfig) -> Self {
        let clock = FakeClock::new();
        let server = MeshServer::with_clock(config, None, clock.clone());
        let cancel = CancellationToken::new();
        Self { server, clock, cancel, processor: None }
    }

    pub fn spawn_processor(&mut self) {
        if self.processor.is_none() {
            self.processor = Some(self.server.processor.spawn(self.cancel.clone()));
        }
    }

    /// Register a Ready agent backed by a scripted transport.
    pub async fn connect_agent(&self, id: &str, caps: &[&str]) -> Arc<FakeConnection> {
        let mut record = AgentRecord::new(id, format!("agent {id}"), self.clock.epoch_ms());
        record.status = AgentStatus::Ready;
        record.capabilities = caps.iter().map(|c| Capability::new(*c)).collect();
        let fake = FakeConnection::new(id);
        let conn: Arc<dyn AgentConnection> = fake.clone();
        self.server.registry.register(record, Some(&conn)).await.unwrap();
        fake
    }

    /// Script the agent half of a successful execution.
    pub async fn complete_job(&self, job_id: &str, agent_id: &str, data: serde_json::Value) {
        self.server.ingest.on_acknowledge(&job_id.into(), &agent_id.into()).await;
        self.server
            .ingest
            .on_result(om_core::JobResult {
                job_id: job_id.into(),
                agent_id: agent_id.into(),
                status: om_core::ResultStatus::Completed,
                data: Some(data),
                error: None,
                error_code: None,
                started_at_ms: self.clock.epoch_ms(),
                completed_at_ms: self.clock.epoch_ms(),
                metadata: Default::default(),
            })
            .await;
    }
}

impl Drop for Mesh {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

pub fn request(id: &str, key: &str, priority: i32) -> JobRequest {
    JobRequest::builder(id, key, "orbit:file:sync").priority(priority).build()
}

/// Poll until the predicate holds or fail the test.
pub async fn wait_for<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..300 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for: {what}");
}
