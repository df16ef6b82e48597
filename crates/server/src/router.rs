// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent router: pure candidate selection under a load-balancing policy.
//!
//! The router never mutates job or agent state; it reads registry
//! snapshots and (for least-connections) the job store's running counts.

use crate::error::DispatchError;
use crate::registry::AgentRegistry;
use om_core::{AgentId, AgentRecord, JobRequest, RoutingPolicy};
use om_storage::JobStore;
use parking_lot::Mutex;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;

/// Selection constraints for one routing decision.
#[derive(Debug, Clone, Default)]
pub struct RoutingRequest {
    pub target_group: Option<String>,
    pub required_capabilities: Vec<String>,
    pub required_tags: Vec<String>,
    pub excluded_agent_ids: Vec<AgentId>,
    pub preferred_agent_id: Option<AgentId>,
}

impl RoutingRequest {
    /// Routing constraints carried by a submission. `target_agent_id` is
    /// a hard constraint resolved by the dispatcher, not a preference, so
    /// it does not map here.
    pub fn from_request(request: &JobRequest) -> Self {
        Self {
            target_group: None,
            required_capabilities: request.required_capabilities.clone(),
            required_tags: request.required_tags.clone(),
            excluded_agent_ids: Vec::new(),
            preferred_agent_id: None,
        }
    }
}

pub struct AgentRouter {
    registry: Arc<AgentRegistry>,
    jobs: Arc<dyn JobStore>,
    policy: RoutingPolicy,
    /// Round-robin cursor per capability group.
    rr_counters: Mutex<HashMap<String, usize>>,
}

impl AgentRouter {
    pub fn new(registry: Arc<AgentRegistry>, jobs: Arc<dyn JobStore>, policy: RoutingPolicy) -> Self {
        Self { registry, jobs, policy, rr_counters: Mutex::new(HashMap::new()) }
    }

    pub fn policy(&self) -> RoutingPolicy {
        self.policy
    }

    /// Select an agent, or `None` when no candidate survives filtering.
    pub async fn select(
        &self,
        request: &RoutingRequest,
    ) -> Result<Option<AgentRecord>, DispatchError> {
        // Cheapest starting set first: group, then first capability, then all.
        let start = if let Some(group) = &request.target_group {
            self.registry.get_by_group(group).await?
        } else if let Some(cap) = request.required_capabilities.first() {
            self.registry.get_by_capability(cap).await?
        } else {
            self.registry.get_all().await?
        };

        let mut candidates: Vec<AgentRecord> = start
            .into_iter()
            .filter(|a| {
                request.target_group.as_deref().is_none_or(|g| a.in_group(g))
                    && a.has_all_capabilities(
                        request.required_capabilities.iter().map(String::as_str),
                    )
                    && a.has_all_tags(request.required_tags.iter().map(String::as_str))
                    && !request.excluded_agent_ids.contains(&a.id)
            })
            .collect();

        // A preferred agent short-circuits the policy when it qualifies.
        if let Some(preferred) = &request.preferred_agent_id {
            if let Some(agent) = candidates.iter().find(|a| &a.id == preferred) {
                if self.registry.is_dispatchable(&agent.id).await? {
                    return Ok(Some(agent.clone()));
                }
            }
        }

        let mut live = Vec::with_capacity(candidates.len());
        for agent in candidates.drain(..) {
            if self.registry.is_dispatchable(&agent.id).await? {
                live.push(agent);
            }
        }
        if live.is_empty() {
            return Ok(None);
        }

        let chosen = match self.policy {
            RoutingPolicy::RoundRobin => self.pick_round_robin(request, &live),
            RoutingPolicy::LeastConnections => self.pick_least_connections(&live).await?,
            RoutingPolicy::Random => rand::rng().random_range(0..live.len()),
            RoutingPolicy::Weighted => self.pick_weighted(&live),
        };
        Ok(Some(live[chosen].clone()))
    }

    fn pick_round_robin(&self, request: &RoutingRequest, candidates: &[AgentRecord]) -> usize {
        let key = capability_group_key(&request.required_capabilities);
        let mut counters = self.rr_counters.lock();
        let counter = counters.entry(key).or_insert(0);
        let index = *counter % candidates.len();
        *counter = counter.wrapping_add(1);
        index
    }

    async fn pick_least_connections(
        &self,
        candidates: &[AgentRecord],
    ) -> Result<usize, DispatchError> {
        let mut best = 0;
        let mut best_count = usize::MAX;
        for (i, agent) in candidates.iter().enumerate() {
            let count = self.jobs.count_running_for(&agent.id).await?;
            // Stable on ties: first candidate wins.
            if count < best_count {
                best = i;
                best_count = count;
            }
        }
        Ok(best)
    }

    fn pick_weighted(&self, candidates: &[AgentRecord]) -> usize {
        let total: u64 = candidates.iter().map(|a| u64::from(a.routing_weight())).sum();
        let mut roll = rand::rng().random_range(0..total);
        for (i, agent) in candidates.iter().enumerate() {
            let weight = u64::from(agent.routing_weight());
            if roll < weight {
                return i;
            }
            roll -= weight;
        }
        candidates.len() - 1
    }
}

/// Round-robin counter key: sorted, comma-joined capability names, or
/// `_all` when the request names none.
fn capability_group_key(capabilities: &[String]) -> String {
    if capabilities.is_empty() {
        return "_all".to_string();
    }
    let mut caps: Vec<String> = capabilities.iter().map(|c| c.to_ascii_lowercase()).collect();
    caps.sort();
    caps.join(",")
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
