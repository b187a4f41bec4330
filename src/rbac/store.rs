//! In-memory policy rule set
//!
//! Ordered set of allow rules mirrored from the durable adapter. Matching is
//! domain-equal, action-equal (case-sensitive), resource exact or trailing
//! `/*` prefix (see [`PolicyRule::matches`]). In-memory operations never
//! fail; persistence lives behind [`crate::rbac::PolicyAdapter`].

use crate::types::{Domain, PolicyRule};

/// Ordered, duplicate-free collection of policy rules.
#[derive(Debug, Clone, Default)]
pub struct PolicyStore {
    rules: Vec<PolicyRule>,
}

impl PolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule; returns `false` (not an error) when it already exists.
    pub fn add_policy(&mut self, rule: PolicyRule) -> bool {
        if self.rules.contains(&rule) {
            return false;
        }
        self.rules.push(rule);
        true
    }

    /// Remove a rule; returns `false` (not an error) when it was absent.
    pub fn remove_policy(&mut self, rule: &PolicyRule) -> bool {
        let before = self.rules.len();
        self.rules.retain(|r| r != rule);
        self.rules.len() != before
    }

    /// Does any rule grant `role` access to `(domain, resource, action)`?
    pub fn matches(&self, role: &str, domain: Domain, resource: &str, action: &str) -> bool {
        self.rules
            .iter()
            .any(|r| r.role == role && r.matches(domain, resource, action))
    }

    /// All `(resource, action)` pairs granted to `role` in `domain`.
    pub fn rules_for(&self, role: &str, domain: Domain) -> Vec<(String, String)> {
        self.rules
            .iter()
            .filter(|r| r.role == role && r.domain == domain)
            .map(|r| (r.resource.clone(), r.action.clone()))
            .collect()
    }

    /// Snapshot of every rule, in insertion order.
    pub fn rules(&self) -> &[PolicyRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Drop all rules.
    pub fn clear(&mut self) {
        self.rules.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report_rule() -> PolicyRule {
        PolicyRule::new("editor", Domain::Cms, "/cms/report/*", "GET")
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut store = PolicyStore::new();
        assert!(store.add_policy(report_rule()));
        assert!(!store.add_policy(report_rule()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut store = PolicyStore::new();
        store.add_policy(report_rule());
        assert!(store.remove_policy(&report_rule()));
        assert!(!store.remove_policy(&report_rule()));
        assert!(store.is_empty());
    }

    #[test]
    fn test_match_respects_domain() {
        let mut store = PolicyStore::new();
        store.add_policy(report_rule());

        assert!(store.matches("editor", Domain::Cms, "/cms/report/export", "GET"));
        assert!(!store.matches("editor", Domain::Api, "/cms/report/export", "GET"));
        assert!(!store.matches("viewer", Domain::Cms, "/cms/report/export", "GET"));
    }

    #[test]
    fn test_rules_for_filters_by_role_and_domain() {
        let mut store = PolicyStore::new();
        store.add_policy(report_rule());
        store.add_policy(PolicyRule::new("editor", Domain::Cms, "/cms/media/*", "POST"));
        store.add_policy(PolicyRule::new("editor", Domain::Api, "/v1/media", "POST"));

        let rules = store.rules_for("editor", Domain::Cms);
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0], ("/cms/report/*".to_string(), "GET".to_string()));
    }
}
