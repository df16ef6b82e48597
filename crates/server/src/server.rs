// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Composition root: builds the control plane over the in-memory adapter
//! and runs it until cancelled.
//!
//! Shutdown order matters: cancel the producer first, let workers drain
//! the channel inside the drain window, then stop the monitor and the
//! listener, force-aborting anything still running.

use crate::dispatcher::Dispatcher;
use crate::idempotency::IdempotencyCache;
use crate::ingest::IngestHandlers;
use crate::listener::AgentListener;
use crate::monitor::TimeoutMonitor;
use crate::orchestrator::JobOrchestrator;
use crate::processor::WorkItemProcessor;
use crate::progress::ProgressService;
use crate::registry::AgentRegistry;
use crate::router::AgentRouter;
use om_core::{Clock, MeshConfig, SystemClock};
use om_storage::{
    DeadLetterStore, JobStore, MemoryAgentStore, MemoryDeadLetterStore, MemoryJobStore,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct MeshServer<C: Clock> {
    pub orchestrator: Arc<JobOrchestrator<C>>,
    pub registry: Arc<AgentRegistry>,
    pub ingest: Arc<IngestHandlers<C>>,
    pub monitor: Arc<TimeoutMonitor<C>>,
    pub processor: Arc<WorkItemProcessor<C>>,
    pub dead_letters: Arc<dyn DeadLetterStore>,
    listener: Arc<AgentListener<C>>,
    drain_timeout: Duration,
}

impl MeshServer<SystemClock> {
    /// Build over the in-memory adapter with the system clock.
    pub fn new(config: MeshConfig, auth_token: Option<String>) -> Self {
        Self::with_clock(config, auth_token, SystemClock)
    }
}

impl<C: Clock> MeshServer<C> {
    pub fn with_clock(config: MeshConfig, auth_token: Option<String>, clock: C) -> Self {
        let jobs: Arc<dyn JobStore> = Arc::new(MemoryJobStore::with_idempotency_ttl(
            clock.clone(),
            config.idempotency.ttl,
        ));
        let dead_letters: Arc<dyn DeadLetterStore> =
            Arc::new(MemoryDeadLetterStore::new(clock.clone()));
        let registry = Arc::new(AgentRegistry::new(Arc::new(MemoryAgentStore::new())));
        let wake = Arc::new(Notify::new());

        let router = AgentRouter::new(Arc::clone(&registry), Arc::clone(&jobs), config.router.policy);
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
        let processor = Arc::new(WorkItemProcessor::new(
            Arc::clone(&jobs),
            Arc::clone(&registry),
            Arc::clone(&dispatcher),
            Arc::clone(&dead_letters),
            config.processor.clone(),
            Arc::clone(&wake),
        ));
        let orchestrator = Arc::new(JobOrchestrator::new(
            Arc::clone(&jobs),
            Arc::clone(&dispatcher),
            Arc::clone(&ingest),
            IdempotencyCache::new(clock.clone(), config.idempotency.ttl),
            Arc::clone(&progress),
            Arc::clone(&wake),
        ));
        // Tell agents to heartbeat well inside the staleness deadline.
        let heartbeat_interval = config.timeout.heartbeat_timeout / 3;
        let read_deadline = config.timeout.heartbeat_timeout * 2;
        let listener = AgentListener::new(
            Arc::clone(&registry),
            Arc::clone(&ingest),
            auth_token,
            heartbeat_interval,
            read_deadline,
            clock,
        );

        Self {
            orchestrator,
            registry,
            ingest,
            monitor,
            processor,
            dead_letters,
            listener,
            drain_timeout: crate::env::drain_timeout(),
        }
    }

    /// Run everything until `cancel` fires, then shut down gracefully.
    pub async fn serve(
        &self,
        tcp: TcpListener,
        cancel: CancellationToken,
    ) -> Result<(), crate::error::ServerError> {
        let addr = tcp.local_addr()?;
        info!(%addr, "control plane listening for agents");

        let producer_cancel = cancel.child_token();
        let background_cancel = CancellationToken::new();

        let processor_handle = self.processor.spawn(producer_cancel.clone());
        let monitor_handle = self.monitor.spawn(background_cancel.clone());
        let listener_handle = tokio::spawn({
            let listener = Arc::clone(&self.listener);
            let cancel = background_cancel.clone();
            async move { listener.run(tcp, cancel).await }
        });

        cancel.cancelled().await;
        info!("shutdown requested, draining dispatch pipeline");

        // Producer first; workers drain the closed channel.
        producer_cancel.cancel();
        let aborts = processor_handle.abort_handles();
        if tokio::time::timeout(self.drain_timeout, processor_handle.join()).await.is_err() {
            tracing::warn!("drain window elapsed, aborting dispatch workers");
            for abort in aborts {
                abort.abort();
            }
        }

        background_cancel.cancel();
        let _ = monitor_handle.await;
        let _ = listener_handle.await;
        info!("control plane stopped");
        Ok(())
    }
}
