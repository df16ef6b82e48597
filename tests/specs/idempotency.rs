// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::harness::{fast_config, request, wait_for, Mesh};
use om_core::JobStatus;
use std::sync::Arc;

// Five concurrent submissions under one idempotency key: one job record,
// five identical answers, exactly one ExecuteJob on the wire.
#[tokio::test]
async fn concurrent_submissions_create_one_job() {
    let mesh = Arc::new(Mesh::start(fast_config()));
    let conn = mesh.connect_agent("A1", &[]).await;

    let mut handles = Vec::new();
    for i in 0..5 {
        let mesh = Arc::clone(&mesh);
        handles.push(tokio::spawn(async move {
            mesh.server
                .orchestrator
                .submit_job(request(&format!("J{i}"), "k", 0))
                .await
                .unwrap()
                .id
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap());
    }
    let first = ids[0].clone();
    assert!(ids.iter().all(|id| *id == first), "submitters disagreed: {ids:?}");

    assert_eq!(mesh.server.orchestrator.get_jobs(None, None).await.unwrap().len(), 1);

    wait_for("single dispatch", || async { !conn.executed_jobs().is_empty() }).await;
    mesh.complete_job(first.as_str(), "A1", serde_json::json!({})).await;

    // Settled: exactly one push ever happened.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert_eq!(conn.executed_jobs().len(), 1);
}

// Resubmission after completion still answers with the original record.
#[tokio::test]
async fn resubmission_returns_the_terminal_record() {
    let mesh = Mesh::start(fast_config());
    let conn = mesh.connect_agent("A1", &[]).await;

    let job = mesh.server.orchestrator.submit_job(request("J1", "k", 0)).await.unwrap();
    wait_for("dispatch", || async { !conn.executed_jobs().is_empty() }).await;
    mesh.complete_job("J1", "A1", serde_json::json!({})).await;

    let again = mesh.server.orchestrator.submit_job(request("J-other", "k", 0)).await.unwrap();
    assert_eq!(again.id, job.id);
    assert_eq!(again.status, JobStatus::Completed);
}
