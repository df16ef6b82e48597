// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! om-server: the OrbitMesh job control plane.
//!
//! Composition: the [`orchestrator::JobOrchestrator`] is the public
//! submission surface; the [`processor::WorkItemProcessor`] drains pending
//! jobs to the [`dispatcher::Dispatcher`]; the [`monitor::TimeoutMonitor`]
//! recovers stuck work; the [`listener::AgentListener`] owns agent
//! connections and feeds the [`ingest::IngestHandlers`].

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod dispatcher;
pub mod env;
pub mod error;
pub mod idempotency;
pub mod ingest;
pub mod listener;
pub mod monitor;
pub mod orchestrator;
pub mod processor;
pub mod progress;
pub mod registry;
pub mod router;
pub mod server;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use dispatcher::{DispatchResult, Dispatcher, Statistics};
pub use error::{DispatchError, ServerError};
pub use idempotency::IdempotencyCache;
pub use ingest::IngestHandlers;
pub use listener::AgentListener;
pub use monitor::TimeoutMonitor;
pub use orchestrator::JobOrchestrator;
pub use processor::{ProcessorHandle, WorkItemProcessor};
pub use progress::{ProgressService, ProgressSubscription};
pub use registry::AgentRegistry;
pub use router::{AgentRouter, RoutingRequest};
pub use server::MeshServer;
pub use transport::AgentConnection;

#[cfg(any(test, feature = "test-support"))]
pub use transport::{FakeBehavior, FakeConnection};
