// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers and proptest strategies.
//!
//! Compiled for this crate's tests and, via the `test-support` feature,
//! for downstream crates' tests.

use crate::job::{JobProgress, JobRequest, JobStatus};

/// Build a minimal valid request with distinct id and idempotency key.
pub fn request(id: &str, key: &str) -> JobRequest {
    JobRequest::builder(id, key, "orbit:test:noop").build()
}

/// Build a progress report with the given sequence.
pub fn progress(job_id: &str, sequence: u64, percentage: u8) -> JobProgress {
    JobProgress {
        job_id: job_id.into(),
        sequence,
        percentage,
        message: None,
        current_step: None,
        total_steps: None,
    }
}

pub mod strategies {
    use super::*;
    use proptest::prelude::*;

    pub fn arb_status() -> impl Strategy<Value = JobStatus> {
        prop_oneof![
            Just(JobStatus::Pending),
            Just(JobStatus::Assigned),
            Just(JobStatus::Running),
            Just(JobStatus::Completed),
            Just(JobStatus::Failed),
            Just(JobStatus::Cancelled),
            Just(JobStatus::TimedOut),
        ]
    }

    prop_compose! {
        pub fn arb_request()(
            id in "[a-z0-9-]{1,32}",
            key in "[a-z0-9-]{1,32}",
            command in "[a-z:]{1,24}",
            payload in proptest::collection::vec(any::<u8>(), 0..64),
            priority in -100i32..100,
            max_retries in 0u32..5,
        ) -> JobRequest {
            JobRequest::builder(id.as_str(), key.as_str(), command.as_str())
                .payload(payload)
                .priority(priority)
                .max_retries(max_retries)
                .build()
        }
    }
}
