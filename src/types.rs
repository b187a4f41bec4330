//! Core authorization types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AuthError;

/// Policy domain: an isolated policy universe.
///
/// Roles and rules in one domain never affect another; a role named
/// `"editor"` in [`Domain::Cms`] is unrelated to a role of the same name in
/// [`Domain::Api`]. The set is closed and fixed at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    /// End-user API surface
    User,
    /// Admin/CMS surface
    Cms,
    /// Raw API-path authorization
    Api,
}

impl Domain {
    /// All domains, in declaration order.
    pub const ALL: [Domain; 3] = [Domain::User, Domain::Cms, Domain::Api];

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::User => "user",
            Domain::Cms => "cms",
            Domain::Api => "api",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Domain {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Domain::User),
            "cms" => Ok(Domain::Cms),
            "api" => Ok(Domain::Api),
            other => Err(AuthError::InvalidInput(format!("unknown domain: {other}"))),
        }
    }
}

/// An allow rule binding a role, domain, resource pattern, and action.
///
/// `resource` is either an exact path or ends in a single `/*` wildcard
/// segment, meaning the path and everything nested under it matched as a
/// prefix. There are no deny rules; absence of a matching rule is the only
/// way to deny.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRule {
    /// Role the rule grants access to
    pub role: String,

    /// Domain the rule lives in
    pub domain: Domain,

    /// Exact resource path or trailing-`/*` pattern
    pub resource: String,

    /// Action name, matched case-sensitively
    pub action: String,
}

impl PolicyRule {
    pub fn new(
        role: impl Into<String>,
        domain: Domain,
        resource: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            role: role.into(),
            domain,
            resource: resource.into(),
            action: action.into(),
        }
    }

    /// Check whether this rule grants `(domain, resource, action)`.
    ///
    /// Domain and action are compared exactly; the resource matches either by
    /// string equality or, when the rule's pattern ends with `*`, by prefix
    /// against the pattern with the `*` stripped.
    pub fn matches(&self, domain: Domain, resource: &str, action: &str) -> bool {
        self.domain == domain && self.action == action && self.matches_resource(resource)
    }

    fn matches_resource(&self, resource: &str) -> bool {
        if self.resource == resource {
            return true;
        }
        // Only a whole trailing /* segment is a wildcard; a bare trailing *
        // is part of the literal path
        if let Some(base) = self.resource.strip_suffix("/*") {
            return resource
                .strip_prefix(base)
                .is_some_and(|rest| rest.starts_with('/'));
        }
        false
    }
}

/// Role edge: "subject has role" or "role inherits role", scoped to a domain.
///
/// The edge is domain-scoped by construction; there is no way to express a
/// cross-domain inheritance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    /// Subject id or inheriting role name
    pub member: String,

    /// Role being granted or inherited
    pub role: String,

    /// Domain the edge lives in
    pub domain: Domain,
}

impl RoleAssignment {
    pub fn new(member: impl Into<String>, role: impl Into<String>, domain: Domain) -> Self {
        Self {
            member: member.into(),
            role: role.into(),
            domain,
        }
    }
}

/// Enforcement query: can `subject` do `action` on `resource` within `domain`?
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessRequest {
    pub subject: String,
    pub domain: Domain,
    pub resource: String,
    pub action: String,
}

/// Enforcement answer with a human-readable reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessDecision {
    pub allowed: bool,
    pub reason: String,
}

impl AccessDecision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: "permission granted".to_string(),
        }
    }

    pub fn deny() -> Self {
        Self {
            allowed: false,
            reason: "permission denied".to_string(),
        }
    }
}

/// Access/refresh token pair returned by login and refresh.
///
/// `expires_in` is the configured access-token duration in whole seconds,
/// not a recomputed remaining-time value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}
