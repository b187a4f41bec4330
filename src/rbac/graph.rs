//! Role hierarchy graph with per-domain adjacency
//!
//! Holds "subject has role" and "role inherits role" edges, one directed
//! graph per [`Domain`]. Membership is transitive: if A inherits B and B
//! inherits C within one domain, A is considered to have role C.
//!
//! Hierarchies are administrator-editable and must not be assumed acyclic;
//! traversal carries a visited set so a cycle is a no-op beyond the first
//! visit, never a hang. Only self-loop edges are rejected at insert time.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::{AuthError, Result};
use crate::types::{Domain, RoleAssignment};

/// Per-domain directed graph of role edges.
#[derive(Debug, Clone, Default)]
pub struct RoleGraph {
    /// member -> roles granted directly, per domain
    edges: HashMap<Domain, HashMap<String, Vec<String>>>,
}

impl RoleGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an edge `member -> role` in `domain`.
    ///
    /// Returns `false` when the edge already exists. Self-loops are rejected
    /// with [`AuthError::InvalidRoleEdge`].
    pub fn add_edge(&mut self, member: &str, role: &str, domain: Domain) -> Result<bool> {
        if member == role {
            return Err(AuthError::InvalidRoleEdge(format!(
                "role {role:?} cannot inherit itself in domain {domain}"
            )));
        }

        let targets = self
            .edges
            .entry(domain)
            .or_default()
            .entry(member.to_string())
            .or_default();

        if targets.iter().any(|t| t == role) {
            return Ok(false);
        }
        targets.push(role.to_string());
        Ok(true)
    }

    /// Remove the edge `member -> role` in `domain`.
    ///
    /// Idempotent: returns `false` when the edge was not present.
    pub fn remove_edge(&mut self, member: &str, role: &str, domain: Domain) -> bool {
        let Some(members) = self.edges.get_mut(&domain) else {
            return false;
        };
        let Some(targets) = members.get_mut(member) else {
            return false;
        };
        let before = targets.len();
        targets.retain(|t| t != role);
        let removed = targets.len() != before;
        if targets.is_empty() {
            members.remove(member);
        }
        removed
    }

    /// Transitive membership check, domain-scoped.
    pub fn has_role(&self, member: &str, role: &str, domain: Domain) -> bool {
        self.roles_of(member, domain).iter().any(|r| r == role)
    }

    /// Enumerate the transitive role closure of `member` in `domain`.
    ///
    /// Breadth-first from the member node; the member itself is not included.
    /// Order is deterministic: direct roles in insertion order, then their
    /// inherited roles level by level.
    pub fn roles_of(&self, member: &str, domain: Domain) -> Vec<String> {
        let Some(members) = self.edges.get(&domain) else {
            return Vec::new();
        };

        let mut visited: HashSet<&str> = HashSet::new();
        visited.insert(member);

        let mut queue: VecDeque<&str> = VecDeque::new();
        queue.push_back(member);

        let mut roles = Vec::new();
        while let Some(current) = queue.pop_front() {
            if let Some(targets) = members.get(current) {
                for role in targets {
                    if visited.insert(role) {
                        roles.push(role.clone());
                        queue.push_back(role);
                    }
                }
            }
        }
        roles
    }

    /// Direct (non-transitive) roles of `member` in `domain`.
    pub fn direct_roles_of(&self, member: &str, domain: Domain) -> Vec<String> {
        self.edges
            .get(&domain)
            .and_then(|members| members.get(member))
            .cloned()
            .unwrap_or_default()
    }

    /// Snapshot every edge in the graph, across all domains.
    pub fn assignments(&self) -> Vec<RoleAssignment> {
        let mut out = Vec::new();
        for (domain, members) in &self.edges {
            for (member, targets) in members {
                for role in targets {
                    out.push(RoleAssignment::new(member.clone(), role.clone(), *domain));
                }
            }
        }
        out
    }

    /// Drop all edges.
    pub fn clear(&mut self) {
        self.edges.clear();
    }
}
