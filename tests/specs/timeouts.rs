// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::harness::{fast_config, request, wait_for, Mesh};
use om_core::JobStatus;
use om_storage::DeadLetterStore;
use std::time::Duration;

// ackTimeout=200ms, maxTimeoutRetries=2. The agent accepts pushes but
// never ACKs: two timeout requeues (timeout_count 1 → 2), then the job
// dead-letters with "ACK timeout" and errorCode TIMEOUT_EXCEEDED.
#[tokio::test]
async fn silent_agent_exhausts_timeout_retries() {
    let mut config = fast_config();
    config.timeout.max_timeout_retries = 2;
    let mesh = Mesh::start(config);
    let conn = mesh.connect_agent("A1", &[]).await;

    mesh.server.orchestrator.submit_job(request("J1", "k1", 0)).await.unwrap();

    for round in 1..=2u32 {
        wait_for("push", || async { conn.executed_jobs().len() == round as usize }).await;
        mesh.clock.advance(Duration::from_millis(250));
        mesh.server.monitor.run_once().await.unwrap();

        let job = mesh.server.orchestrator.get_job(&"J1".into()).await.unwrap().unwrap();
        assert_eq!(job.timeout_count, round);
    }

    // Third assignment, third silence: retries exhausted.
    wait_for("third push", || async { conn.executed_jobs().len() == 3 }).await;
    mesh.clock.advance(Duration::from_millis(250));
    mesh.server.monitor.run_once().await.unwrap();

    let dead = mesh.server.orchestrator.get_job(&"J1".into()).await.unwrap().unwrap();
    assert_eq!(dead.status, JobStatus::Failed);
    assert_eq!(dead.error_code.as_deref(), Some("TIMEOUT_EXCEEDED"));

    let entries = mesh.server.dead_letters.get_all().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].reason.contains("ACK timeout"), "reason: {}", entries[0].reason);
}

// A running job that blows through its own timeout is requeued and can
// complete on the second attempt.
#[tokio::test]
async fn execution_timeout_requeues_then_completes() {
    let mesh = Mesh::start(fast_config());
    let conn = mesh.connect_agent("A1", &[]).await;

    let req = om_core::JobRequest::builder("J1", "k1", "orbit:slow")
        .timeout_ms(1_000u64)
        .build();
    mesh.server.orchestrator.submit_job(req).await.unwrap();

    wait_for("first push", || async { conn.executed_jobs().len() == 1 }).await;
    mesh.server.ingest.on_acknowledge(&"J1".into(), &"A1".into()).await;

    // The agent stalls past the job's own deadline.
    mesh.clock.advance(Duration::from_millis(1_100));
    mesh.server.monitor.run_once().await.unwrap();
    let job = mesh.server.orchestrator.get_job(&"J1".into()).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.timeout_count, 1);

    // Second attempt succeeds.
    wait_for("second push", || async { conn.executed_jobs().len() == 2 }).await;
    mesh.complete_job("J1", "A1", serde_json::json!({"attempt": 2})).await;
    let done = mesh.server.orchestrator.get_job(&"J1".into()).await.unwrap().unwrap();
    assert_eq!(done.status, JobStatus::Completed);
}
