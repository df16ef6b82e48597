// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::harness::{fast_config, wait_for, Mesh};
use om_core::{JobRequest, JobStatus};
use om_storage::DeadLetterStore;

// Register a Ready agent with {cpu}, submit a capability-matched job, and
// watch it run to Completed with clean counters and an empty DLQ.
#[tokio::test]
async fn submitted_job_completes_on_matching_agent() {
    let mesh = Mesh::start(fast_config());
    let conn = mesh.connect_agent("A1", &["cpu"]).await;

    let request = JobRequest::builder("J1", "key-J1", "x")
        .required_capabilities(vec!["cpu".into()])
        .priority(5)
        .timeout_ms(2_000u64)
        .build();
    let job = mesh.server.orchestrator.submit_job(request).await.unwrap();

    wait_for("dispatch to A1", || async { !conn.executed_jobs().is_empty() }).await;
    assert_eq!(conn.executed_jobs()[0].id, "J1");

    mesh.complete_job("J1", "A1", serde_json::json!({"synced": 42})).await;

    let done = mesh.server.orchestrator.get_job(&job.id).await.unwrap().unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.result.unwrap().data, Some(serde_json::json!({"synced": 42})));
    assert!(done.completed_at_ms.unwrap() >= done.created_at_ms);

    let stats = mesh.server.orchestrator.statistics().await.unwrap();
    assert_eq!(stats.total_dispatched, 1);
    assert_eq!(stats.total_failed, 0);
    assert_eq!(mesh.server.dead_letters.count().await.unwrap(), 0);
}

// An agent without the required capability never sees the job; with no
// other candidates the job exhausts dispatch and dead-letters.
#[tokio::test]
async fn capability_mismatch_never_reaches_wrong_agent() {
    let mesh = Mesh::start(fast_config());
    let conn = mesh.connect_agent("A1", &["disk"]).await;

    let request = JobRequest::builder("J1", "key-J1", "x")
        .required_capabilities(vec!["cpu".into()])
        .build();
    mesh.server.orchestrator.submit_job(request).await.unwrap();

    wait_for("dead-letter", || async {
        mesh.server.dead_letters.count().await.unwrap() == 1
    })
    .await;
    assert!(conn.executed_jobs().is_empty());

    let job = mesh.server.orchestrator.get_job(&"J1".into()).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
}
