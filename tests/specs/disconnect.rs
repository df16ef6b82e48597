// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::harness::{fast_config, request, wait_for, Mesh};
use om_core::{AgentStatus, JobStatus};

// A running job returns to Pending on the disconnect event itself — no
// waiting for the next monitor cycle.
#[tokio::test]
async fn disconnect_requeues_running_job_immediately() {
    let mesh = Mesh::start(fast_config());
    let a1 = mesh.connect_agent("A1", &["cpu"]).await;

    let req = om_core::JobRequest::builder("J1", "k1", "x")
        .required_capabilities(vec!["cpu".into()])
        .build();
    mesh.server.orchestrator.submit_job(req).await.unwrap();
    wait_for("dispatch to A1", || async { !a1.executed_jobs().is_empty() }).await;
    mesh.server.ingest.on_acknowledge(&"J1".into(), &"A1".into()).await;
    assert_eq!(
        mesh.server.orchestrator.get_job(&"J1".into()).await.unwrap().unwrap().status,
        JobStatus::Running
    );

    // Transport lost. With no surviving agent the job sits Pending (or is
    // mid-redispatch-retry), but it must have left Running synchronously.
    drop(a1);
    mesh.server.ingest.on_disconnect(&"A1".into()).await;

    let recovered = mesh.server.orchestrator.get_job(&"J1".into()).await.unwrap().unwrap();
    assert_ne!(recovered.status, JobStatus::Running);
    assert_eq!(recovered.timeout_count, 1);
    assert_eq!(recovered.retry_count, 0);
    assert_eq!(
        mesh.server.registry.get(&"A1".into()).await.unwrap().unwrap().status,
        AgentStatus::Disconnected
    );
}

// Same scenario without target pinning: recovery lands on A2.
#[tokio::test]
async fn unpinned_job_re_dispatches_to_surviving_agent() {
    let mesh = Mesh::start(fast_config());
    let a1 = mesh.connect_agent("A1", &["cpu"]).await;

    let req = om_core::JobRequest::builder("J1", "k1", "x")
        .required_capabilities(vec!["cpu".into()])
        .build();
    mesh.server.orchestrator.submit_job(req).await.unwrap();
    wait_for("dispatch to A1", || async { !a1.executed_jobs().is_empty() }).await;
    mesh.server.ingest.on_acknowledge(&"J1".into(), &"A1".into()).await;

    // A second agent comes up before the failure.
    let a2 = mesh.connect_agent("A2", &["cpu"]).await;

    drop(a1);
    mesh.server.ingest.on_disconnect(&"A1".into()).await;

    wait_for("re-dispatch to A2", || async { !a2.executed_jobs().is_empty() }).await;
    mesh.complete_job("J1", "A2", serde_json::json!({"recovered": true})).await;

    let done = mesh.server.orchestrator.get_job(&"J1".into()).await.unwrap().unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.retry_count, 0);
    assert_eq!(done.timeout_count, 1);
    assert_eq!(done.assigned_agent_id, Some("A2".into()));
}
