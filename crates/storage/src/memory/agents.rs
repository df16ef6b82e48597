// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory agent record store.

use crate::store::{AgentStore, StoreError};
use async_trait::async_trait;
use om_core::{AgentId, AgentRecord, AgentStatus};
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Default)]
pub struct MemoryAgentStore {
    records: Mutex<HashMap<AgentId, AgentRecord>>,
}

impl MemoryAgentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AgentStore for MemoryAgentStore {
    async fn initialize(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn register(&self, record: AgentRecord) -> Result<(), StoreError> {
        self.records.lock().insert(record.id.clone(), record);
        Ok(())
    }

    async fn unregister(&self, id: &AgentId) -> Result<bool, StoreError> {
        Ok(self.records.lock().remove(id).is_some())
    }

    async fn get(&self, id: &AgentId) -> Result<Option<AgentRecord>, StoreError> {
        Ok(self.records.lock().get(id).cloned())
    }

    async fn get_all(&self) -> Result<Vec<AgentRecord>, StoreError> {
        let mut all: Vec<AgentRecord> = self.records.lock().values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }

    async fn get_by_capability(&self, name: &str) -> Result<Vec<AgentRecord>, StoreError> {
        let mut hits: Vec<AgentRecord> = self
            .records
            .lock()
            .values()
            .filter(|r| r.has_capability(name))
            .cloned()
            .collect();
        hits.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(hits)
    }

    async fn get_by_group(&self, group: &str) -> Result<Vec<AgentRecord>, StoreError> {
        let mut hits: Vec<AgentRecord> =
            self.records.lock().values().filter(|r| r.in_group(group)).cloned().collect();
        hits.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(hits)
    }

    async fn update_status(&self, id: &AgentId, status: AgentStatus) -> Result<(), StoreError> {
        // Unknown id is a no-op, not an error.
        if let Some(record) = self.records.lock().get_mut(id) {
            record.status = status;
        }
        Ok(())
    }

    async fn update_heartbeat(&self, id: &AgentId, ts_ms: u64) -> Result<(), StoreError> {
        if let Some(record) = self.records.lock().get_mut(id) {
            record.last_heartbeat_ms = ts_ms;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "agents_tests.rs"]
mod tests;
