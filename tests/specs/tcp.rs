// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end over a real socket: handshake, dispatch push, ACK,
//! progress, and result all travel as wire frames.

use om_core::{Capability, JobRequest, JobStatus, MeshConfig, ResultStatus};
use om_server::MeshServer;
use om_wire::{read_message, write_message, AgentHello, AgentMessage, ServerMessage};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

const IO: Duration = Duration::from_secs(2);

fn fast_config() -> MeshConfig {
    let mut config = MeshConfig::default();
    config.processor.polling_interval = Duration::from_millis(20);
    config.processor.retry_delay = Duration::from_millis(50);
    config
}

fn hello(agent_id: &str, token: Option<&str>) -> AgentMessage {
    AgentMessage::Hello(AgentHello {
        agent_id: agent_id.into(),
        name: format!("agent {agent_id}"),
        group: None,
        tags: Default::default(),
        capabilities: vec![Capability::new("cpu")],
        metadata: Default::default(),
        token: token.map(str::to_string),
        version: "0.2.0".into(),
    })
}

async fn start_server(
    auth_token: Option<String>,
) -> (Arc<MeshServer<om_core::SystemClock>>, std::net::SocketAddr, CancellationToken) {
    let server = Arc::new(MeshServer::new(fast_config(), auth_token));
    let tcp = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = tcp.local_addr().unwrap();
    let cancel = CancellationToken::new();
    tokio::spawn({
        let server = Arc::clone(&server);
        let cancel = cancel.clone();
        async move {
            server.serve(tcp, cancel).await.unwrap();
        }
    });
    (server, addr, cancel)
}

#[tokio::test]
async fn agent_completes_a_job_over_the_wire() {
    let (server, addr, cancel) = start_server(None).await;

    let stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    let (mut reader, mut writer) = stream.into_split();

    write_message(&mut writer, &hello("A1", None), IO).await.unwrap();
    let ack: ServerMessage = read_message(&mut reader, IO).await.unwrap();
    assert!(matches!(ack, ServerMessage::HelloAck { .. }));

    let request = JobRequest::builder("J1", "k1", "orbit:file:sync")
        .required_capabilities(vec!["cpu".into()])
        .build();
    server.orchestrator.submit_job(request).await.unwrap();

    // The dispatcher's push arrives as an ExecuteJob frame.
    let pushed: ServerMessage = read_message(&mut reader, IO).await.unwrap();
    let ServerMessage::ExecuteJob { request } = pushed else {
        panic!("expected ExecuteJob, got {pushed:?}")
    };
    assert_eq!(request.id, "J1");

    write_message(&mut writer, &AgentMessage::Acknowledge { job_id: "J1".into() }, IO)
        .await
        .unwrap();
    write_message(
        &mut writer,
        &AgentMessage::Progress {
            progress: om_core::JobProgress {
                job_id: "J1".into(),
                sequence: 1,
                percentage: 50,
                message: Some("halfway".into()),
                current_step: None,
                total_steps: None,
            },
        },
        IO,
    )
    .await
    .unwrap();
    write_message(
        &mut writer,
        &AgentMessage::Result {
            result: om_core::JobResult {
                job_id: "J1".into(),
                agent_id: "A1".into(),
                status: ResultStatus::Completed,
                data: Some(serde_json::json!({"ok": true})),
                error: None,
                error_code: None,
                started_at_ms: 1,
                completed_at_ms: 2,
                metadata: Default::default(),
            },
        },
        IO,
    )
    .await
    .unwrap();

    // Ingest is asynchronous relative to our writes; poll for the state.
    for _ in 0..100 {
        let job = server.orchestrator.get_job(&"J1".into()).await.unwrap().unwrap();
        if job.status == JobStatus::Completed {
            assert_eq!(job.last_progress.unwrap().percentage, 50);
            cancel.cancel();
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job never completed");
}

#[tokio::test]
async fn wrong_token_is_rejected_at_handshake() {
    let (_server, addr, cancel) = start_server(Some("sekret".into())).await;

    let stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    let (mut reader, mut writer) = stream.into_split();

    write_message(&mut writer, &hello("A1", Some("wrong")), IO).await.unwrap();
    let reply: ServerMessage = read_message(&mut reader, IO).await.unwrap();
    let ServerMessage::Error { message } = reply else {
        panic!("expected rejection, got {reply:?}")
    };
    assert_eq!(message, "unauthorized");
    cancel.cancel();
}

#[tokio::test]
async fn disconnect_over_tcp_marks_agent_disconnected() {
    let (server, addr, cancel) = start_server(None).await;

    let stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    let (mut reader, mut writer) = stream.into_split();
    write_message(&mut writer, &hello("A1", None), IO).await.unwrap();
    let _ack: ServerMessage = read_message(&mut reader, IO).await.unwrap();

    // Hard hang-up.
    drop(reader);
    drop(writer);

    for _ in 0..100 {
        let record = server.registry.get(&"A1".into()).await.unwrap();
        if record.as_ref().is_some_and(|r| r.status == om_core::AgentStatus::Disconnected) {
            cancel.cancel();
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("agent never marked disconnected");
}
