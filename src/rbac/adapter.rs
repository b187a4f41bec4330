//! Durable policy storage boundary
//!
//! The enforcer keeps its working copy in memory and writes every mutation
//! through an adapter; `load_policy` re-populates memory from the adapter at
//! startup, closing the crash gap between a memory update and its persist.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::types::{PolicyRule, RoleAssignment};

/// Durable source of policy rules and role edges.
#[async_trait]
pub trait PolicyAdapter: Send + Sync {
    /// Load every policy rule from durable storage.
    async fn load_policy_rules(&self) -> Result<Vec<PolicyRule>>;

    /// Load every role edge from durable storage.
    async fn load_role_edges(&self) -> Result<Vec<RoleAssignment>>;

    /// Record a rule addition (`added = true`) or removal.
    async fn persist_policy_change(&self, rule: &PolicyRule, added: bool) -> Result<()>;

    /// Record an edge addition (`added = true`) or removal.
    async fn persist_role_edge_change(&self, edge: &RoleAssignment, added: bool) -> Result<()>;
}

/// In-memory adapter for tests and single-process deployments.
#[derive(Default)]
pub struct MemoryAdapter {
    rules: Arc<RwLock<Vec<PolicyRule>>>,
    edges: Arc<RwLock<Vec<RoleAssignment>>>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seed the adapter, e.g. before handing it to `Enforcer::new`.
    pub async fn seed(&self, rules: Vec<PolicyRule>, edges: Vec<RoleAssignment>) {
        *self.rules.write().await = rules;
        *self.edges.write().await = edges;
    }
}

#[async_trait]
impl PolicyAdapter for MemoryAdapter {
    async fn load_policy_rules(&self) -> Result<Vec<PolicyRule>> {
        Ok(self.rules.read().await.clone())
    }

    async fn load_role_edges(&self) -> Result<Vec<RoleAssignment>> {
        Ok(self.edges.read().await.clone())
    }

    async fn persist_policy_change(&self, rule: &PolicyRule, added: bool) -> Result<()> {
        let mut rules = self.rules.write().await;
        if added {
            if !rules.contains(rule) {
                rules.push(rule.clone());
            }
        } else {
            rules.retain(|r| r != rule);
        }
        Ok(())
    }

    async fn persist_role_edge_change(&self, edge: &RoleAssignment, added: bool) -> Result<()> {
        let mut edges = self.edges.write().await;
        if added {
            if !edges.contains(edge) {
                edges.push(edge.clone());
            }
        } else {
            edges.retain(|e| e != edge);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Domain;

    #[tokio::test]
    async fn test_persist_and_load() {
        let adapter = MemoryAdapter::new();
        let rule = PolicyRule::new("editor", Domain::Cms, "/cms/report/*", "GET");
        let edge = RoleAssignment::new("alice", "editor", Domain::Cms);

        adapter.persist_policy_change(&rule, true).await.unwrap();
        adapter.persist_role_edge_change(&edge, true).await.unwrap();

        assert_eq!(adapter.load_policy_rules().await.unwrap(), vec![rule.clone()]);
        assert_eq!(adapter.load_role_edges().await.unwrap(), vec![edge.clone()]);

        adapter.persist_policy_change(&rule, false).await.unwrap();
        adapter.persist_role_edge_change(&edge, false).await.unwrap();

        assert!(adapter.load_policy_rules().await.unwrap().is_empty());
        assert!(adapter.load_role_edges().await.unwrap().is_empty());
    }
}
