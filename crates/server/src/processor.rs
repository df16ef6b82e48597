// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Work-item processor: drains pending jobs into a bounded channel and
//! fans them out to dispatch workers.
//!
//! One producer task polls the store (and wakes early on submission);
//! `max_concurrency` workers consume from the shared channel. The channel
//! waits when full — backpressure, never drop. Shutdown cancels the
//! producer, the closed channel drains, and the workers exit.

use crate::dispatcher::Dispatcher;
use crate::error::DispatchError;
use crate::registry::AgentRegistry;
use om_core::{error as error_code, Clock, Job, JobStatus, ProcessorConfig};
use om_storage::{DeadLetterStore, JobStore};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify, Semaphore};
use tokio::task::{AbortHandle, JoinHandle};
use tokio_util::sync::CancellationToken;

pub struct WorkItemProcessor<C: Clock> {
    jobs: Arc<dyn JobStore>,
    registry: Arc<AgentRegistry>,
    dispatcher: Arc<Dispatcher<C>>,
    dead_letters: Arc<dyn DeadLetterStore>,
    config: ProcessorConfig,
    wake: Arc<Notify>,
}

/// Join/abort surface for the spawned tasks.
pub struct ProcessorHandle {
    producer: JoinHandle<()>,
    workers: Vec<JoinHandle<()>>,
}

impl ProcessorHandle {
    /// Abort handles for force-termination after the drain window.
    pub fn abort_handles(&self) -> Vec<AbortHandle> {
        let mut handles = vec![self.producer.abort_handle()];
        handles.extend(self.workers.iter().map(JoinHandle::abort_handle));
        handles
    }

    /// Wait for the producer and all workers to finish.
    pub async fn join(self) {
        let _ = self.producer.await;
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}

impl<C: Clock> WorkItemProcessor<C> {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        registry: Arc<AgentRegistry>,
        dispatcher: Arc<Dispatcher<C>>,
        dead_letters: Arc<dyn DeadLetterStore>,
        config: ProcessorConfig,
        wake: Arc<Notify>,
    ) -> Self {
        Self { jobs, registry, dispatcher, dead_letters, config, wake }
    }

    /// Spawn the producer and worker tasks.
    pub fn spawn(self: &Arc<Self>, cancel: CancellationToken) -> ProcessorHandle {
        let concurrency = self.config.max_concurrency.max(1);
        let (tx, rx) = mpsc::channel::<Job>(concurrency * 2);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let semaphore = Arc::new(Semaphore::new(concurrency));

        let producer = tokio::spawn({
            let this = Arc::clone(self);
            let cancel = cancel.clone();
            async move { this.produce(tx, cancel).await }
        });

        let workers = (0..concurrency)
            .map(|worker_id| {
                tokio::spawn({
                    let this = Arc::clone(self);
                    let rx = Arc::clone(&rx);
                    let semaphore = Arc::clone(&semaphore);
                    let cancel = cancel.clone();
                    async move { this.work(worker_id, rx, semaphore, cancel).await }
                })
            })
            .collect();

        ProcessorHandle { producer, workers }
    }

    async fn produce(&self, tx: mpsc::Sender<Job>, cancel: CancellationToken) {
        loop {
            match self.jobs.get_pending().await {
                Ok(pending) => {
                    for job in pending {
                        // send waits when the channel is full (backpressure).
                        tokio::select! {
                            _ = cancel.cancelled() => return,
                            sent = tx.send(job) => {
                                if sent.is_err() {
                                    return;
                                }
                            }
                        }
                    }
                }
                Err(e) => tracing::warn!(error = %e, "pending poll failed"),
            }

            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = self.wake.notified() => {}
                _ = tokio::time::sleep(self.config.polling_interval) => {}
            }
        }
        // tx drops here; workers drain the channel and exit.
    }

    async fn work(
        &self,
        worker_id: usize,
        rx: Arc<tokio::sync::Mutex<mpsc::Receiver<Job>>>,
        semaphore: Arc<Semaphore>,
        cancel: CancellationToken,
    ) {
        loop {
            let job = { rx.lock().await.recv().await };
            let Some(job) = job else { break };

            let Ok(_permit) = semaphore.acquire().await else { break };
            if let Err(e) = self.drive(&job, &cancel).await {
                tracing::warn!(worker_id, job_id = %job.id, error = %e, "dispatch cycle failed");
            }
        }
        tracing::debug!(worker_id, "dispatch worker stopped");
    }

    /// Drive one channel entry: re-check, retry dispatch, dead-letter on
    /// exhaustion.
    async fn drive(&self, job: &Job, cancel: &CancellationToken) -> Result<(), DispatchError> {
        // The channel may hold stale duplicates from earlier polls.
        match self.jobs.get(&job.id).await? {
            Some(current) if current.status == JobStatus::Pending => {}
            _ => return Ok(()),
        }

        let max_attempts = self.config.max_dispatch_retries.max(1);
        let mut last_reason = String::from("No available agents");

        for attempt in 1..=max_attempts {
            if cancel.is_cancelled() {
                return Ok(());
            }

            if self.registry.dispatchable_agents().await?.is_empty() {
                last_reason = "No available agents".to_string();
                tracing::debug!(job_id = %job.id, attempt, "no ready agents, backing off");
            } else {
                let result = self.dispatcher.dispatch(job).await?;
                if result.success {
                    return Ok(());
                }
                last_reason =
                    result.failure_reason.unwrap_or_else(|| "dispatch failed".to_string());

                // Lost the race, or our own push failed after the assign
                // stuck. Either way the job is no longer Pending and is
                // someone else's (or the monitor's) to drive.
                match self.jobs.get(&job.id).await? {
                    Some(j) if j.status == JobStatus::Pending => {}
                    _ => return Ok(()),
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = tokio::time::sleep(self.config.retry_delay) => {}
            }
        }

        // Fail first: the CAS makes dead-lettering exactly-once when
        // duplicate channel entries race here.
        if self.jobs.fail(&job.id, &last_reason, Some(error_code::DISPATCH_FAILED)).await? {
            if let Some(snapshot) = self.jobs.get(&job.id).await? {
                self.dead_letters.enqueue(snapshot, &last_reason).await?;
            }
            tracing::warn!(job_id = %job.id, reason = %last_reason, "dispatch retries exhausted");
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "processor_tests.rs"]
mod tests;
