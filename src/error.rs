//! Error types for the IAM core

use thiserror::Error;

/// Errors produced by the authorization engine and the token lifecycle.
///
/// Authentication failures are deliberately information-minimal:
/// [`AuthError::InvalidCredentials`] is returned identically for an unknown
/// username and a wrong password. Administrative and policy errors carry the
/// full detail, since callers managing policy need to know what went wrong.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown username or wrong password (never distinguished)
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Subject exists but is deactivated
    #[error("user account is inactive")]
    UserInactive,

    /// Username or email already taken at registration
    #[error("user already exists: {0}")]
    UserAlreadyExists(String),

    /// Missing or malformed request fields
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Token failed structural or signature validation
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// Token signature is valid but the token has expired
    #[error("token expired")]
    TokenExpired,

    /// Signing primitive failure; fatal to the enclosing call
    #[error("token generation failed: {0}")]
    TokenGenerationFailed(String),

    /// Administrative operation referenced an unknown policy rule
    #[error("policy not found: {0}")]
    PolicyNotFound(String),

    /// Administrative operation referenced an unknown role
    #[error("role not found: {0}")]
    RoleNotFound(String),

    /// Self-referential role inheritance attempted
    #[error("invalid role edge: {0}")]
    InvalidRoleEdge(String),

    /// Token cache unreachable; soft error, recovered locally by callers
    #[error("token cache unavailable: {0}")]
    CacheUnavailable(String),

    /// Durable policy or user storage error
    #[error("storage error: {0}")]
    Storage(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for IAM operations
pub type Result<T> = std::result::Result<T, AuthError>;
