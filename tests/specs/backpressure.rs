// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::harness::{request, wait_for, Mesh};
use om_core::{JobStatus, MeshConfig};
use om_storage::DeadLetterStore;
use std::time::Duration;

// The dispatch channel holds 2·N entries and the producer WAITS when it
// is full. With N=1 and slow per-job retry cycles, a burst larger than
// the channel cannot be dropped: every job still reaches a terminal
// state eventually, exactly once.
#[tokio::test]
async fn full_channel_delays_but_never_drops() {
    let mut config = MeshConfig::default();
    config.processor.max_concurrency = 1; // channel capacity 2
    config.processor.polling_interval = Duration::from_millis(10);
    config.processor.retry_delay = Duration::from_millis(30);
    config.processor.max_dispatch_retries = 1;
    let mesh = Mesh::start(config);

    for i in 0..6 {
        mesh.server
            .orchestrator
            .submit_job(request(&format!("J{i}"), &format!("k{i}"), 0))
            .await
            .unwrap();
    }

    // No agents: every job must fail through the retry path, none lost.
    wait_for("all six dead-lettered", || async {
        mesh.server.dead_letters.count().await.unwrap() == 6
    })
    .await;

    for i in 0..6 {
        let job = mesh
            .server
            .orchestrator
            .get_job(&format!("J{i}").into())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(job.status, JobStatus::Failed, "J{i} must be terminal");
    }
}
