// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dead-letter entry: a job that exhausted dispatch or execution retries.
//!
//! Entries are immutable except for the retry-request fields. The queue
//! never re-dispatches on its own; an admin tool resubmits a marked entry
//! through the orchestrator with a fresh idempotency key.

use crate::id::DeadLetterId;
use crate::job::Job;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterEntry {
    pub id: DeadLetterId,
    /// Snapshot of the job at the moment it was dead-lettered.
    pub job: Job,
    pub reason: String,
    pub enqueued_at_ms: u64,
    #[serde(default)]
    pub retry_requested: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_requested_at_ms: Option<u64>,
    #[serde(default)]
    pub retry_attempts: u32,
}

impl DeadLetterEntry {
    pub fn new(job: Job, reason: impl Into<String>, now_ms: u64) -> Self {
        Self {
            id: DeadLetterId::generate(),
            job,
            reason: reason.into(),
            enqueued_at_ms: now_ms,
            retry_requested: false,
            retry_requested_at_ms: None,
            retry_attempts: 0,
        }
    }
}
