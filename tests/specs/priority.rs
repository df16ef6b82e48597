// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::harness::{fast_config, request, wait_for, Mesh};

// With no agent connected, queue three jobs at mixed priorities, then
// bring an agent up and start dispatch: order is priority-descending.
#[tokio::test]
async fn dispatch_follows_priority_order() {
    let mut config = fast_config();
    // One worker forces strict serialization of dispatch.
    config.processor.max_concurrency = 1;
    let mut mesh = Mesh::paused(config);

    mesh.server.orchestrator.submit_job(request("J1", "k1", 1)).await.unwrap();
    mesh.clock.advance_ms(1);
    mesh.server.orchestrator.submit_job(request("J2", "k2", 10)).await.unwrap();
    mesh.clock.advance_ms(1);
    mesh.server.orchestrator.submit_job(request("J3", "k3", 5)).await.unwrap();

    let conn = mesh.connect_agent("A1", &[]).await;
    mesh.spawn_processor();
    wait_for("all three dispatched", || async { conn.executed_jobs().len() == 3 }).await;

    let order: Vec<String> = conn.executed_jobs().iter().map(|r| r.id.to_string()).collect();
    assert_eq!(order, ["J2", "J3", "J1"]);
}

// FIFO within one priority level.
#[tokio::test]
async fn equal_priority_is_fifo() {
    let mut config = fast_config();
    config.processor.max_concurrency = 1;
    let mut mesh = Mesh::paused(config);

    for i in 1..=4 {
        mesh.server
            .orchestrator
            .submit_job(request(&format!("J{i}"), &format!("k{i}"), 7))
            .await
            .unwrap();
        mesh.clock.advance_ms(1);
    }

    let conn = mesh.connect_agent("A1", &[]).await;
    mesh.spawn_processor();
    wait_for("all dispatched", || async { conn.executed_jobs().len() == 4 }).await;

    let order: Vec<String> = conn.executed_jobs().iter().map(|r| r.id.to_string()).collect();
    assert_eq!(order, ["J1", "J2", "J3", "J4"]);
}
