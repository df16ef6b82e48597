// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job orchestrator: the public facade of the control plane.
//!
//! Submission enforces the idempotency contract at ingress; the store's
//! own key index backs it up, so concurrent submitters of the same key
//! always converge on one job id.

use crate::dispatcher::{Dispatcher, Statistics};
use crate::error::DispatchError;
use crate::idempotency::IdempotencyCache;
use crate::ingest::IngestHandlers;
use crate::progress::{ProgressService, ProgressSubscription};
use om_core::{AgentId, Clock, Job, JobId, JobProgress, JobRequest, JobResult, JobStatus};
use om_storage::JobStore;
use std::sync::Arc;
use tokio::sync::Notify;

pub struct JobOrchestrator<C: Clock> {
    jobs: Arc<dyn JobStore>,
    dispatcher: Arc<Dispatcher<C>>,
    ingest: Arc<IngestHandlers<C>>,
    idempotency: IdempotencyCache<C>,
    progress: Arc<ProgressService>,
    wake_processor: Arc<Notify>,
}

impl<C: Clock> JobOrchestrator<C> {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        dispatcher: Arc<Dispatcher<C>>,
        ingest: Arc<IngestHandlers<C>>,
        idempotency: IdempotencyCache<C>,
        progress: Arc<ProgressService>,
        wake_processor: Arc<Notify>,
    ) -> Self {
        Self { jobs, dispatcher, ingest, idempotency, progress, wake_processor }
    }

    /// Submit a job. Returns the (possibly pre-existing) record; the job
    /// is observable by id from the moment this returns.
    pub async fn submit_job(&self, mut request: JobRequest) -> Result<Job, DispatchError> {
        validate(&request)?;
        if request.id.is_empty() {
            request.id = JobId::generate();
        }
        let key = request.idempotency_key.clone();

        if !self.idempotency.try_acquire_lock(&key) {
            // Someone got here first. A cached result answers directly;
            // a still-processing claim falls through to the store, whose
            // key index de-dupes.
            if let Some(job_id) = self.idempotency.get_result(&key) {
                if let Some(job) = self.jobs.get(&job_id).await? {
                    tracing::debug!(job_id = %job.id, "submission answered from idempotency cache");
                    return Ok(job);
                }
            }
        }

        let job = match self.jobs.enqueue(request).await {
            Ok(job) => job,
            Err(e) => {
                self.idempotency.release_lock(&key);
                return Err(e.into());
            }
        };
        self.idempotency.set_result(&key, job.id.clone());
        self.wake_processor.notify_one();
        tracing::info!(job_id = %job.id, priority = job.request.priority, "job submitted");
        Ok(job)
    }

    /// Cancel; false when the job is unknown or already terminal.
    pub async fn cancel_job(&self, id: &JobId, reason: Option<&str>) -> Result<bool, DispatchError> {
        self.dispatcher.cancel_job(id, reason).await
    }

    pub async fn get_job(&self, id: &JobId) -> Result<Option<Job>, DispatchError> {
        Ok(self.jobs.get(id).await?)
    }

    pub async fn get_jobs(
        &self,
        status: Option<JobStatus>,
        agent: Option<&AgentId>,
    ) -> Result<Vec<Job>, DispatchError> {
        Ok(self.jobs.get_jobs(status, agent).await?)
    }

    /// Ingest delegate (result path). Never errors back to the transport.
    pub async fn handle_result(&self, result: JobResult) {
        self.ingest.on_result(result).await;
    }

    /// Ingest delegate (progress path).
    pub async fn handle_progress(&self, progress: JobProgress) {
        self.ingest.on_progress(progress).await;
    }

    /// Observe a job's progress stream; drop the handle to unsubscribe.
    pub fn subscribe_progress(
        &self,
        job_id: impl Into<JobId>,
        callback: impl Fn(&JobProgress) + Send + Sync + 'static,
    ) -> ProgressSubscription {
        self.progress.subscribe(job_id, callback)
    }

    pub fn progress_service(&self) -> &Arc<ProgressService> {
        &self.progress
    }

    pub async fn statistics(&self) -> Result<Statistics, DispatchError> {
        self.dispatcher.statistics().await
    }
}

fn validate(request: &JobRequest) -> Result<(), DispatchError> {
    if request.command.trim().is_empty() {
        return Err(DispatchError::ValidationFailed("command must not be empty".into()));
    }
    if request.idempotency_key.trim().is_empty() {
        // The key is caller-supplied by contract; never synthesized here.
        return Err(DispatchError::ValidationFailed("idempotency_key is required".into()));
    }
    if request.required_capabilities.iter().any(|c| c.trim().is_empty()) {
        return Err(DispatchError::ValidationFailed("empty capability name".into()));
    }
    Ok(())
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
