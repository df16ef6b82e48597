// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for the server crate's tests: the full component graph
//! over memory stores, a fake clock, and scripted fake transports.

use crate::dispatcher::Dispatcher;
use crate::idempotency::IdempotencyCache;
use crate::ingest::IngestHandlers;
use crate::monitor::TimeoutMonitor;
use crate::orchestrator::JobOrchestrator;
use crate::processor::WorkItemProcessor;
use crate::progress::ProgressService;
use crate::registry::AgentRegistry;
use crate::router::AgentRouter;
use crate::transport::{AgentConnection, FakeConnection};
use om_core::{
    AgentRecord, AgentStatus, Capability, FakeClock, JobRequest, MeshConfig,
};
use om_storage::{
    DeadLetterStore, JobStore, MemoryAgentStore, MemoryDeadLetterStore, MemoryJobStore,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

pub(crate) struct Ctx {
    pub clock: FakeClock,
    pub config: MeshConfig,
    pub jobs: Arc<dyn JobStore>,
    pub dead_letters: Arc<dyn DeadLetterStore>,
    pub registry: Arc<AgentRegistry>,
    pub dispatcher: Arc<Dispatcher<FakeClock>>,
    pub monitor: Arc<TimeoutMonitor<FakeClock>>,
    pub ingest: Arc<IngestHandlers<FakeClock>>,
    pub progress: Arc<ProgressService>,
    pub wake: Arc<Notify>,
}

/// Config with short intervals so processor tests run in milliseconds.
pub(crate) fn fast_config() -> MeshConfig {
    let mut config = MeshConfig::default();
    config.processor.max_concurrency = 4;
    config.processor.polling_interval = Duration::from_millis(20);
    config.processor.retry_delay = Duration::from_millis(20);
    config.timeout.ack_timeout = Duration::from_millis(200);
    config.timeout.default_job_timeout = Duration::from_millis(500);
    config
}

impl Ctx {
    pub fn new() -> Self {
        Self::with_config(fast_config())
    }

    pub fn with_config(config: MeshConfig) -> Self {
        let clock = FakeClock::new();
        let jobs: Arc<dyn JobStore> = Arc::new(MemoryJobStore::with_idempotency_ttl(
            clock.clone(),
            config.idempotency.ttl,
        ));
        let dead_letters: Arc<dyn DeadLetterStore> =
            Arc::new(MemoryDeadLetterStore::new(clock.clone()));
        let registry = Arc::new(AgentRegistry::new(Arc::new(MemoryAgentStore::new())));
        let wake = Arc::new(Notify::new());
        let router =
            AgentRouter::new(Arc::clone(&registry), Arc::clone(&jobs), config.router.policy);
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&registry),
            router,
            Arc::clone(&jobs),
            clock.clone(),
        ));
        let monitor = Arc::new(TimeoutMonitor::new(
            Arc::clone(&jobs),
            Arc::clone(&registry),
            Arc::clone(&dead_letters),
            config.timeout.clone(),
            clock.clone(),
            Arc::clone(&wake),
        ));
        let progress = ProgressService::new(config.progress.max_history);
        let ingest = Arc::new(IngestHandlers::new(
            Arc::clone(&jobs),
            Arc::clone(&registry),
            Arc::clone(&progress),
            Arc::clone(&monitor),
            Arc::clone(&wake),
            clock.clone(),
        ));
        Self {
            clock,
            config,
            jobs,
            dead_letters,
            registry,
            dispatcher,
            monitor,
            ingest,
            progress,
            wake,
        }
    }

    pub fn orchestrator(&self) -> JobOrchestrator<FakeClock> {
        JobOrchestrator::new(
            Arc::clone(&self.jobs),
            Arc::clone(&self.dispatcher),
            Arc::clone(&self.ingest),
            IdempotencyCache::new(self.clock.clone(), self.config.idempotency.ttl),
            Arc::clone(&self.progress),
            Arc::clone(&self.wake),
        )
    }

    pub fn processor(&self) -> Arc<WorkItemProcessor<FakeClock>> {
        Arc::new(WorkItemProcessor::new(
            Arc::clone(&self.jobs),
            Arc::clone(&self.registry),
            Arc::clone(&self.dispatcher),
            Arc::clone(&self.dead_letters),
            self.config.processor.clone(),
            Arc::clone(&self.wake),
        ))
    }

    /// Register a Ready agent with a live fake transport.
    pub async fn connect_agent(&self, id: &str, caps: &[&str]) -> Arc<FakeConnection> {
        self.connect_agent_in_group(id, caps, None).await
    }

    pub async fn connect_agent_in_group(
        &self,
        id: &str,
        caps: &[&str],
        group: Option<&str>,
    ) -> Arc<FakeConnection> {
        let mut record = AgentRecord::new(id, format!("agent {id}"), self.clock.epoch_ms());
        record.status = AgentStatus::Ready;
        record.capabilities = caps.iter().map(|c| Capability::new(*c)).collect();
        record.group = group.map(str::to_string);
        let fake = FakeConnection::new(id);
        let conn: Arc<dyn AgentConnection> = fake.clone();
        self.registry.register(record, Some(&conn)).await.unwrap();
        // `fake` shares the allocation, so the registry's Weak stays live
        // exactly as long as the caller holds it.
        fake
    }
}

/// Minimal request fixture.
pub(crate) fn request(id: &str, priority: i32) -> JobRequest {
    JobRequest::builder(id, format!("key-{id}"), "orbit:test")
        .priority(priority)
        .max_retries(2)
        .build()
}
