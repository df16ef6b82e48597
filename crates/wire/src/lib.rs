// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent transport protocol for the OrbitMesh control plane.
//!
//! Wire format: 4-byte length prefix (big-endian) + JSON payload. The
//! serde tag and field names below ARE the wire contract; keep them
//! stable across versions.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod frame;
mod message;

pub use frame::{decode, encode, read_message, write_message, ProtocolError, MAX_FRAME_BYTES};
pub use message::{AgentHello, AgentMessage, ServerMessage};
