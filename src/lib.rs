//! # IAM Core
//!
//! Multi-domain authorization decision engine and token lifecycle manager.
//!
//! ## Features
//!
//! - **RBAC Enforcement**: Default-deny policy checks over per-domain role
//!   graphs with transitive role inheritance and trailing-wildcard resources
//! - **Token Lifecycle**: HS256 access/refresh pairs, rotation on refresh,
//!   and a soft revocation cache keyed by subject
//! - **Accounts**: Argon2id credential storage and register/login/logout
//!   flows that never leak which usernames exist
//! - **Pluggable Persistence**: in-memory backends by default, Postgres
//!   policy storage and Redis token caching behind features
//!
//! ## Module Structure
//!
//! ```text
//! iam-core/
//! ├── rbac/      - role graph, policy store, enforcement engine, adapters
//! ├── token/     - claims, issuer, revocation cache
//! ├── auth/      - users, password hashing, session flows
//! ├── config     - environment-driven configuration
//! ├── types      - domains, rules, decisions, token pairs
//! └── error      - crate-wide error taxonomy
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod rbac;
pub mod token;
pub mod types;

pub use auth::AuthFlow;
pub use config::Config;
pub use error::{AuthError, Result};
pub use rbac::Enforcer;
pub use token::{TokenCache, TokenIssuer};
pub use types::{AccessDecision, AccessRequest, Domain, PolicyRule, RoleAssignment, TokenPair};

/// Crate version, surfaced by the health endpoint.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
