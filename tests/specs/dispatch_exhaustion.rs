// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::harness::{fast_config, request, wait_for, Mesh};
use om_core::JobStatus;
use om_storage::DeadLetterStore;

// No agent ever connects. maxDispatchRetries=3, retryDelay=50ms: after
// roughly three retry delays the job is dead-lettered with "No available
// agents" and failed with DISPATCH_FAILED.
#[tokio::test]
async fn no_agents_dead_letters_after_retries() {
    let mesh = Mesh::start(fast_config()); // retry_delay=50ms, retries=3

    mesh.server.orchestrator.submit_job(request("J1", "k1", 0)).await.unwrap();

    wait_for("dead-letter", || async {
        mesh.server.dead_letters.count().await.unwrap() == 1
    })
    .await;

    let job = mesh.server.orchestrator.get_job(&"J1".into()).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error_code.as_deref(), Some("DISPATCH_FAILED"));
    assert_eq!(job.error.as_deref(), Some("No available agents"));

    let entry = &mesh.server.dead_letters.get_all().await.unwrap()[0];
    assert_eq!(entry.job.id, "J1");
    assert!(entry.reason.contains("No available agents"));
    assert_eq!(entry.job.status, JobStatus::Failed);
}

// Dead-lettering happens once even though the producer keeps re-polling
// the pending job while workers retry.
#[tokio::test]
async fn exhaustion_dead_letters_exactly_once() {
    let mesh = Mesh::start(fast_config());

    mesh.server.orchestrator.submit_job(request("J1", "k1", 0)).await.unwrap();
    wait_for("failure", || async {
        mesh.server
            .orchestrator
            .get_job(&"J1".into())
            .await
            .unwrap()
            .is_some_and(|j| j.status == JobStatus::Failed)
    })
    .await;

    // Give any straggling duplicate channel entries time to drain.
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    assert_eq!(mesh.server.dead_letters.count().await.unwrap(), 1);
}
