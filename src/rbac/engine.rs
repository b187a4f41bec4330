//! Policy enforcement engine
//!
//! Composes [`RoleGraph`] and [`PolicyStore`] behind a read-mostly lock and
//! writes every mutation through the [`PolicyAdapter`]. Enforcement is the
//! hot path: it takes a shared lock only, so concurrent `enforce` calls are
//! never serialized behind administrative mutations.

use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::adapter::PolicyAdapter;
use super::graph::RoleGraph;
use super::store::PolicyStore;
use crate::error::Result;
use crate::types::{Domain, PolicyRule, RoleAssignment};

struct EnforcerState {
    graph: RoleGraph,
    store: PolicyStore,
}

/// Authorization decision engine over role hierarchies and policy rules.
///
/// There are no deny rules: absence of a matching allow rule is the only way
/// to deny (open-world default-deny). All mutating calls update memory
/// eagerly and then write through to the adapter; [`Enforcer::load_policy`]
/// rebuilds memory from the durable source.
pub struct Enforcer {
    state: RwLock<EnforcerState>,
    adapter: Arc<dyn PolicyAdapter>,
}

impl Enforcer {
    /// Build an enforcer and load its working copy from `adapter`.
    pub async fn new(adapter: Arc<dyn PolicyAdapter>) -> Result<Self> {
        let enforcer = Self {
            state: RwLock::new(EnforcerState {
                graph: RoleGraph::new(),
                store: PolicyStore::new(),
            }),
            adapter,
        };
        enforcer.load_policy().await?;
        Ok(enforcer)
    }

    /// Re-populate the in-memory graph and rule set from durable storage.
    pub async fn load_policy(&self) -> Result<()> {
        let rules = self.adapter.load_policy_rules().await?;
        let edges = self.adapter.load_role_edges().await?;

        let mut graph = RoleGraph::new();
        for edge in &edges {
            if let Err(err) = graph.add_edge(&edge.member, &edge.role, edge.domain) {
                warn!(member = %edge.member, role = %edge.role, domain = %edge.domain,
                    "skipping invalid role edge from durable storage: {err}");
            }
        }

        let mut store = PolicyStore::new();
        for rule in rules {
            store.add_policy(rule);
        }

        let mut state = self.state.write();
        info!(
            rules = store.len(),
            edges = edges.len(),
            "policy loaded from durable storage"
        );
        state.graph = graph;
        state.store = store;
        Ok(())
    }

    /// Can `subject` perform `action` on `resource` within `domain`?
    ///
    /// The subject's transitive role closure is checked against the rule
    /// set; rules may also name a subject directly in their role slot.
    pub fn enforce(
        &self,
        subject: &str,
        domain: Domain,
        resource: &str,
        action: &str,
    ) -> Result<bool> {
        let state = self.state.read();

        if state.store.matches(subject, domain, resource, action) {
            debug!(%subject, %domain, %resource, %action, "allowed by direct rule");
            return Ok(true);
        }

        for role in state.graph.roles_of(subject, domain) {
            if state.store.matches(&role, domain, resource, action) {
                debug!(%subject, %role, %domain, %resource, %action, "allowed via role");
                return Ok(true);
            }
        }

        debug!(%subject, %domain, %resource, %action, "denied: no matching rule");
        Ok(false)
    }

    /// Add an allow rule. Returns `false` when the rule already existed.
    pub async fn add_policy(&self, rule: PolicyRule) -> Result<bool> {
        let added = self.state.write().store.add_policy(rule.clone());
        if !added {
            warn!(role = %rule.role, domain = %rule.domain, resource = %rule.resource,
                action = %rule.action, "policy already exists");
            return Ok(false);
        }
        self.adapter.persist_policy_change(&rule, true).await?;
        info!(role = %rule.role, domain = %rule.domain, resource = %rule.resource,
            action = %rule.action, "policy added");
        Ok(true)
    }

    /// Remove an allow rule. Returns `false` when the rule was absent.
    pub async fn remove_policy(&self, rule: &PolicyRule) -> Result<bool> {
        let removed = self.state.write().store.remove_policy(rule);
        if !removed {
            warn!(role = %rule.role, domain = %rule.domain, resource = %rule.resource,
                action = %rule.action, "policy not found");
            return Ok(false);
        }
        self.adapter.persist_policy_change(rule, false).await?;
        info!(role = %rule.role, domain = %rule.domain, resource = %rule.resource,
            action = %rule.action, "policy removed");
        Ok(true)
    }

    /// Grant `role` to `user` in `domain`. Returns `false` on duplicates.
    pub async fn add_role_for_user(&self, user: &str, role: &str, domain: Domain) -> Result<bool> {
        let added = self.state.write().graph.add_edge(user, role, domain)?;
        if !added {
            warn!(%user, %role, %domain, "role assignment already exists");
            return Ok(false);
        }
        let edge = RoleAssignment::new(user, role, domain);
        self.adapter.persist_role_edge_change(&edge, true).await?;
        info!(%user, %role, %domain, "role assigned");
        Ok(true)
    }

    /// Revoke `role` from `user` in `domain`. Returns `false` when absent.
    pub async fn remove_role_for_user(
        &self,
        user: &str,
        role: &str,
        domain: Domain,
    ) -> Result<bool> {
        let removed = self.state.write().graph.remove_edge(user, role, domain);
        if !removed {
            warn!(%user, %role, %domain, "role assignment not found");
            return Ok(false);
        }
        let edge = RoleAssignment::new(user, role, domain);
        self.adapter.persist_role_edge_change(&edge, false).await?;
        info!(%user, %role, %domain, "role revoked");
        Ok(true)
    }

    /// Transitive role closure of `user` in `domain`.
    pub fn get_roles_for_user(&self, user: &str, domain: Domain) -> Vec<String> {
        self.state.read().graph.roles_of(user, domain)
    }

    /// Transitive membership check.
    pub fn has_role_for_user(&self, user: &str, role: &str, domain: Domain) -> bool {
        self.state.read().graph.has_role(user, role, domain)
    }

    /// Flattened `(resource, action)` pairs reachable through all of the
    /// subject's roles in `domain` (plus any rules naming it directly),
    /// deduplicated, first occurrence wins.
    pub fn get_permissions_for_user(&self, user: &str, domain: Domain) -> Vec<(String, String)> {
        let state = self.state.read();

        let mut holders = vec![user.to_string()];
        holders.extend(state.graph.roles_of(user, domain));

        let mut seen = HashSet::new();
        let mut permissions = Vec::new();
        for holder in &holders {
            for pair in state.store.rules_for(holder, domain) {
                if seen.insert(pair.clone()) {
                    permissions.push(pair);
                }
            }
        }
        permissions
    }

    /// `(resource, action)` pairs granted directly to `role` in `domain`.
    pub fn rules_for(&self, role: &str, domain: Domain) -> Vec<(String, String)> {
        self.state.read().store.rules_for(role, domain)
    }

    /// Authorize a raw API path + HTTP method in the `api` domain.
    pub fn check_api_access(&self, subject: &str, path: &str, method: &str) -> Result<bool> {
        self.enforce(subject, Domain::Api, path, method)
    }

    /// Authorize a CMS tab + action in the `cms` domain.
    ///
    /// The tab is expanded to its `/cms/{tab}/*` resource form, the shape
    /// CMS policies are stored in.
    pub fn check_cms_access(&self, subject: &str, tab: &str, action: &str) -> Result<bool> {
        let resource = format!("/cms/{tab}/*");
        self.enforce(subject, Domain::Cms, &resource, action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rbac::adapter::MemoryAdapter;

    async fn empty_enforcer() -> Enforcer {
        Enforcer::new(Arc::new(MemoryAdapter::new())).await.unwrap()
    }

    #[tokio::test]
    async fn test_default_deny() {
        let enforcer = empty_enforcer().await;
        assert!(!enforcer.enforce("alice", Domain::User, "/profile", "GET").unwrap());
    }

    #[tokio::test]
    async fn test_enforce_via_role() {
        let enforcer = empty_enforcer().await;
        enforcer
            .add_policy(PolicyRule::new("user", Domain::User, "/profile", "GET"))
            .await
            .unwrap();
        enforcer.add_role_for_user("alice", "user", Domain::User).await.unwrap();

        assert!(enforcer.enforce("alice", Domain::User, "/profile", "GET").unwrap());
        assert!(!enforcer.enforce("alice", Domain::User, "/profile", "DELETE").unwrap());
        assert!(!enforcer.enforce("bob", Domain::User, "/profile", "GET").unwrap());
    }

    #[tokio::test]
    async fn test_enforce_via_inherited_role() {
        let enforcer = empty_enforcer().await;
        enforcer
            .add_policy(PolicyRule::new("viewer", Domain::Cms, "/cms/report/*", "GET"))
            .await
            .unwrap();
        enforcer.add_role_for_user("editor", "viewer", Domain::Cms).await.unwrap();
        enforcer.add_role_for_user("alice", "editor", Domain::Cms).await.unwrap();

        assert!(enforcer
            .enforce("alice", Domain::Cms, "/cms/report/export", "GET")
            .unwrap());
    }

    #[tokio::test]
    async fn test_domain_isolation() {
        let enforcer = empty_enforcer().await;
        enforcer.add_role_for_user("alice", "editor", Domain::Cms).await.unwrap();
        enforcer
            .add_policy(PolicyRule::new("editor", Domain::Cms, "/cms/report/*", "GET"))
            .await
            .unwrap();

        // No corresponding policy in api: deny everything there
        assert!(!enforcer
            .enforce("alice", Domain::Api, "/cms/report/export", "GET")
            .unwrap());
        assert!(!enforcer.enforce("alice", Domain::Api, "/anything", "GET").unwrap());
    }

    #[tokio::test]
    async fn test_direct_subject_rule() {
        let enforcer = empty_enforcer().await;
        enforcer
            .add_policy(PolicyRule::new("alice", Domain::Api, "/v1/export", "POST"))
            .await
            .unwrap();

        assert!(enforcer.check_api_access("alice", "/v1/export", "POST").unwrap());
    }

    #[tokio::test]
    async fn test_permissions_flattened_and_deduplicated() {
        let enforcer = empty_enforcer().await;
        enforcer.add_role_for_user("alice", "editor", Domain::Cms).await.unwrap();
        enforcer.add_role_for_user("editor", "viewer", Domain::Cms).await.unwrap();
        enforcer
            .add_policy(PolicyRule::new("editor", Domain::Cms, "/cms/report/*", "GET"))
            .await
            .unwrap();
        enforcer
            .add_policy(PolicyRule::new("viewer", Domain::Cms, "/cms/report/*", "GET"))
            .await
            .unwrap();
        enforcer
            .add_policy(PolicyRule::new("viewer", Domain::Cms, "/cms/media/*", "GET"))
            .await
            .unwrap();

        let permissions = enforcer.get_permissions_for_user("alice", Domain::Cms);
        assert_eq!(
            permissions,
            vec![
                ("/cms/report/*".to_string(), "GET".to_string()),
                ("/cms/media/*".to_string(), "GET".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_mutations_survive_reload() {
        let adapter = Arc::new(MemoryAdapter::new());
        let enforcer = Enforcer::new(adapter.clone()).await.unwrap();
        enforcer
            .add_policy(PolicyRule::new("user", Domain::User, "/profile", "GET"))
            .await
            .unwrap();
        enforcer.add_role_for_user("alice", "user", Domain::User).await.unwrap();

        // A fresh enforcer over the same adapter sees the same state
        let reloaded = Enforcer::new(adapter).await.unwrap();
        assert!(reloaded.enforce("alice", Domain::User, "/profile", "GET").unwrap());
    }

    #[tokio::test]
    async fn test_cms_access_expands_tab() {
        let enforcer = empty_enforcer().await;
        enforcer.add_role_for_user("alice", "editor", Domain::Cms).await.unwrap();
        enforcer
            .add_policy(PolicyRule::new("editor", Domain::Cms, "/cms/report/*", "read"))
            .await
            .unwrap();

        assert!(enforcer.check_cms_access("alice", "report", "read").unwrap());
        assert!(!enforcer.check_cms_access("alice", "media", "read").unwrap());
    }

    #[tokio::test]
    async fn test_remove_role_revokes_access() {
        let enforcer = empty_enforcer().await;
        enforcer
            .add_policy(PolicyRule::new("user", Domain::User, "/profile", "GET"))
            .await
            .unwrap();
        enforcer.add_role_for_user("alice", "user", Domain::User).await.unwrap();
        assert!(enforcer.enforce("alice", Domain::User, "/profile", "GET").unwrap());

        assert!(enforcer.remove_role_for_user("alice", "user", Domain::User).await.unwrap());
        assert!(!enforcer.enforce("alice", Domain::User, "/profile", "GET").unwrap());
    }
}
