// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the server crate.

use std::time::Duration;

/// Protocol version advertised in the Hello handshake.
pub const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Listen address for agent connections (default loopback).
pub fn listen_addr() -> String {
    std::env::var("OM_LISTEN_ADDR").unwrap_or_else(|_| "127.0.0.1:7400".to_string())
}

/// Optional config file path (the CLI argument wins over this).
pub fn config_path() -> Option<String> {
    std::env::var("OM_CONFIG").ok().filter(|s| !s.is_empty())
}

/// Shared auth token for agent connections. When set, agents must present
/// it in the Hello handshake.
pub fn auth_token() -> Option<String> {
    std::env::var("OM_AUTH_TOKEN").ok().filter(|s| !s.is_empty())
}

/// Shutdown drain timeout (default 30s, configurable via `OM_DRAIN_TIMEOUT_MS`).
pub fn drain_timeout() -> Duration {
    std::env::var("OM_DRAIN_TIMEOUT_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(30))
}
