// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent record and status.
//!
//! The registry is the single owner of `AgentRecord`s; everyone else sees
//! immutable snapshots. The live transport handle is deliberately NOT part
//! of the record — it is process state held by the registry, so a record
//! can round-trip a storage adapter.

use crate::id::AgentId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// A named skill an agent advertises, used as a routing filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl Capability {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), version: None }
    }

    pub fn versioned(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self { name: name.into(), version: Some(version.into()) }
    }
}

/// Lifecycle status of an enrolled agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// Enrolled but never connected
    Created,
    /// Connected and accepting work
    Ready,
    /// Executing at least one job (does not block new dispatch)
    Running,
    /// Transport lost
    Disconnected,
    /// Administratively removed from rotation
    Disabled,
}

crate::simple_display! {
    AgentStatus {
        Created => "created",
        Ready => "ready",
        Running => "running",
        Disconnected => "disconnected",
        Disabled => "disabled",
    }
}

/// Metadata key carrying the integer routing weight for the weighted policy.
pub const WEIGHT_KEY: &str = "weight";

/// An enrolled worker node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRecord {
    pub id: AgentId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub capabilities: Vec<Capability>,
    pub status: AgentStatus,
    /// Epoch milliseconds of the last heartbeat (or connect).
    pub last_heartbeat_ms: u64,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl AgentRecord {
    /// Create a freshly-enrolled record.
    pub fn new(id: impl Into<AgentId>, name: impl Into<String>, now_ms: u64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            group: None,
            tags: BTreeSet::new(),
            capabilities: Vec::new(),
            status: AgentStatus::Created,
            last_heartbeat_ms: now_ms,
            metadata: HashMap::new(),
        }
    }

    /// Whether the agent advertises the capability (case-insensitive).
    pub fn has_capability(&self, name: &str) -> bool {
        self.capabilities.iter().any(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Whether every required capability is present (case-insensitive).
    pub fn has_all_capabilities<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> bool {
        names.into_iter().all(|n| self.has_capability(n))
    }

    /// Whether the agent carries the tag (case-insensitive).
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    /// Whether every required tag is present (case-insensitive).
    pub fn has_all_tags<'a>(&self, tags: impl IntoIterator<Item = &'a str>) -> bool {
        tags.into_iter().all(|t| self.has_tag(t))
    }

    /// Whether the agent belongs to the group (case-insensitive).
    pub fn in_group(&self, group: &str) -> bool {
        self.group.as_deref().is_some_and(|g| g.eq_ignore_ascii_case(group))
    }

    /// Integer weight for the weighted routing policy. Clamped to ≥ 1.
    pub fn routing_weight(&self) -> u32 {
        self.metadata
            .get(WEIGHT_KEY)
            .and_then(|w| w.parse::<u32>().ok())
            .map(|w| w.max(1))
            .unwrap_or(1)
    }

    /// Status check only. Dispatchability additionally requires a live
    /// transport handle, which the registry layers on top.
    pub fn is_ready(&self) -> bool {
        self.status == AgentStatus::Ready
    }
}

crate::builder! {
    pub struct AgentRecordBuilder => AgentRecord {
        into {
            id: AgentId = "agt-test-1",
            name: String = "test-agent",
        }
        set {
            tags: BTreeSet<String> = BTreeSet::new(),
            capabilities: Vec<Capability> = Vec::new(),
            status: AgentStatus = AgentStatus::Ready,
            last_heartbeat_ms: u64 = 1_000_000,
            metadata: HashMap<String, String> = HashMap::new(),
        }
        option {
            group: String = None,
        }
    }
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
