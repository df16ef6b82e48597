// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent registry: source of truth for connected agents.
//!
//! Records live in the pluggable [`AgentStore`]; live transport handles
//! stay here as `Weak` references. An agent is dispatchable iff its
//! status allows work AND its handle upgrades.

use crate::transport::AgentConnection;
use om_core::{AgentId, AgentRecord, AgentStatus};
use om_storage::{AgentStore, StoreError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

pub struct AgentRegistry {
    store: Arc<dyn AgentStore>,
    handles: RwLock<HashMap<AgentId, Weak<dyn AgentConnection>>>,
}

impl AgentRegistry {
    pub fn new(store: Arc<dyn AgentStore>) -> Self {
        Self { store, handles: RwLock::new(HashMap::new()) }
    }

    /// Upsert the record and attach the live handle, if any.
    pub async fn register(
        &self,
        record: AgentRecord,
        handle: Option<&Arc<dyn AgentConnection>>,
    ) -> Result<(), StoreError> {
        let id = record.id.clone();
        self.store.register(record).await?;
        match handle {
            Some(conn) => {
                self.handles.write().insert(id.clone(), Arc::downgrade(conn));
                tracing::info!(agent_id = %id, "agent registered with live transport");
            }
            None => {
                self.handles.write().remove(&id);
                tracing::info!(agent_id = %id, "agent registered without transport");
            }
        }
        Ok(())
    }

    /// Remove the record and any handle. Returns false for unknown ids.
    pub async fn unregister(&self, id: &AgentId) -> Result<bool, StoreError> {
        self.handles.write().remove(id);
        self.store.unregister(id).await
    }

    pub async fn get(&self, id: &AgentId) -> Result<Option<AgentRecord>, StoreError> {
        self.store.get(id).await
    }

    pub async fn get_all(&self) -> Result<Vec<AgentRecord>, StoreError> {
        self.store.get_all().await
    }

    pub async fn get_by_capability(&self, name: &str) -> Result<Vec<AgentRecord>, StoreError> {
        self.store.get_by_capability(name).await
    }

    pub async fn get_by_group(&self, group: &str) -> Result<Vec<AgentRecord>, StoreError> {
        self.store.get_by_group(group).await
    }

    /// No-op on unknown ids.
    pub async fn update_status(&self, id: &AgentId, status: AgentStatus) -> Result<(), StoreError> {
        self.store.update_status(id, status).await
    }

    /// No-op on unknown ids.
    pub async fn update_heartbeat(&self, id: &AgentId, ts_ms: u64) -> Result<(), StoreError> {
        self.store.update_heartbeat(id, ts_ms).await
    }

    /// Attach a live handle to an already-registered agent.
    pub fn attach_handle(&self, id: &AgentId, conn: &Arc<dyn AgentConnection>) {
        self.handles.write().insert(id.clone(), Arc::downgrade(conn));
    }

    /// Drop the handle (transport gone); the record stays.
    pub fn detach_handle(&self, id: &AgentId) {
        self.handles.write().remove(id);
    }

    /// Upgrade the agent's handle, pruning it if the connection died.
    pub fn live_handle(&self, id: &AgentId) -> Option<Arc<dyn AgentConnection>> {
        let upgraded = self.handles.read().get(id).and_then(Weak::upgrade);
        if upgraded.is_none() {
            self.handles.write().remove(id);
        }
        upgraded
    }

    /// Whether the agent can receive work right now.
    ///
    /// Ready and Running both qualify: an executing agent keeps accepting
    /// dispatch unless the routing policy steers elsewhere.
    pub async fn is_dispatchable(&self, id: &AgentId) -> Result<bool, StoreError> {
        let Some(record) = self.store.get(id).await? else { return Ok(false) };
        Ok(dispatchable_status(record.status) && self.live_handle(id).is_some())
    }

    /// All agents that can receive work right now.
    pub async fn dispatchable_agents(&self) -> Result<Vec<AgentRecord>, StoreError> {
        let mut out = Vec::new();
        for record in self.store.get_all().await? {
            if dispatchable_status(record.status) && self.live_handle(&record.id).is_some() {
                out.push(record);
            }
        }
        Ok(out)
    }

    /// Number of agents with a live transport.
    pub fn connected_count(&self) -> usize {
        self.handles.read().values().filter(|w| w.strong_count() > 0).count()
    }
}

/// Statuses that accept new work.
pub(crate) fn dispatchable_status(status: AgentStatus) -> bool {
    matches!(status, AgentStatus::Ready | AgentStatus::Running)
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
