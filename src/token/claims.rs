//! Token claims

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Token kind discriminator carried inside the claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// Short-lived, carries the role snapshot
    Access,
    /// Long-lived, carries the subject id only
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signed token payload.
///
/// Roles are a snapshot taken at issuance; they do not auto-update when role
/// assignments change later. Refresh tokens intentionally omit the display
/// name and roles to limit blast radius if leaked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject id
    pub sub: String,

    /// Display name (access tokens only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Role snapshot, order-preserving (access tokens only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expires at (Unix timestamp)
    pub exp: i64,

    /// Token kind
    pub kind: TokenKind,
}

impl Claims {
    /// Claims for an access token expiring `ttl` from now.
    pub fn access(
        subject_id: impl Into<String>,
        display_name: impl Into<String>,
        roles: Vec<String>,
        ttl: Duration,
    ) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: subject_id.into(),
            name: Some(display_name.into()),
            roles,
            iat: now,
            exp: now + ttl.as_secs() as i64,
            kind: TokenKind::Access,
        }
    }

    /// Claims for a refresh token expiring `ttl` from now.
    pub fn refresh(subject_id: impl Into<String>, ttl: Duration) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: subject_id.into(),
            name: None,
            roles: Vec::new(),
            iat: now,
            exp: now + ttl.as_secs() as i64,
            kind: TokenKind::Refresh,
        }
    }

    pub fn subject_id(&self) -> &str {
        &self.sub
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.iat, 0)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_claims_window() {
        let claims = Claims::access("u1", "Alice", vec!["user".to_string()], Duration::from_secs(60));
        assert_eq!(claims.kind, TokenKind::Access);
        assert_eq!(claims.exp - claims.iat, 60);
        assert!(claims.iat < claims.exp);
        assert!(claims.has_role("user"));
    }

    #[test]
    fn test_refresh_claims_are_minimal() {
        let claims = Claims::refresh("u1", Duration::from_secs(3600));
        assert_eq!(claims.kind, TokenKind::Refresh);
        assert!(claims.name.is_none());
        assert!(claims.roles.is_empty());
    }

    #[test]
    fn test_refresh_claims_omit_empty_fields_on_wire() {
        let claims = Claims::refresh("u1", Duration::from_secs(3600));
        let json = serde_json::to_string(&claims).unwrap();
        assert!(!json.contains("name"));
        assert!(!json.contains("roles"));
        assert!(json.contains("\"kind\":\"refresh\""));
    }
}
