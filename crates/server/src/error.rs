// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Server error taxonomy.
//!
//! Expected outcomes (not-found, illegal transition) stay in return
//! values; these enums carry the cases a caller must branch on or that
//! abort an operation outright.

use om_storage::StoreError;
use thiserror::Error;

/// Failures surfaced by the dispatch path and the public orchestrator
/// surface.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("stale state: {0}")]
    IllegalTransition(String),

    #[error("no eligible agent")]
    NoEligibleAgent,

    #[error("transport failure: {0}")]
    TransportFailure(String),

    #[error("deadline exceeded: {0}")]
    Timeout(String),

    #[error("dispatch retries exhausted: {0}")]
    DispatchFailed(String),

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("storage: {0}")]
    Store(#[from] StoreError),
}

/// Failures during server startup and lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("config: {0}")]
    Config(#[from] om_core::ConfigError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage: {0}")]
    Store(#[from] StoreError),
}
