//! Account and session flows: register, login, refresh, verify, logout.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{AuthError, Result};
use crate::rbac::Enforcer;
use crate::token::{Claims, TokenCache, TokenIssuer, TokenKind};
use crate::types::{Domain, TokenPair};

use super::password::PasswordHasher;
use super::user::{User, UserDirectory};

/// Orchestrates the credential, token, and role layers.
///
/// The cache is advisory throughout: a degraded cache is logged and the
/// flow continues, since token signatures remain authoritative.
pub struct AuthFlow {
    users: Arc<dyn UserDirectory>,
    hasher: Arc<dyn PasswordHasher>,
    issuer: Arc<TokenIssuer>,
    cache: TokenCache,
    enforcer: Arc<Enforcer>,
}

impl AuthFlow {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        hasher: Arc<dyn PasswordHasher>,
        issuer: Arc<TokenIssuer>,
        cache: TokenCache,
        enforcer: Arc<Enforcer>,
    ) -> Self {
        Self {
            users,
            hasher,
            issuer,
            cache,
            enforcer,
        }
    }

    /// Creates an account. No tokens are issued; the caller logs in next.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        full_name: &str,
        password: &str,
    ) -> Result<User> {
        if username.trim().is_empty() {
            return Err(AuthError::InvalidInput("username must not be empty".into()));
        }
        if email.trim().is_empty() {
            return Err(AuthError::InvalidInput("email must not be empty".into()));
        }
        if password.is_empty() {
            return Err(AuthError::InvalidInput("password must not be empty".into()));
        }

        let hash = self.hasher.hash(password)?;
        let user = self.users.create(User::new(username, email, full_name, hash)).await?;
        info!(user_id = %user.id, username = %user.username, "registered user");
        Ok(user)
    }

    /// Verifies credentials and issues a fresh token pair.
    ///
    /// Unknown usernames and wrong passwords both come back as
    /// [`AuthError::InvalidCredentials`] so the response does not leak
    /// which accounts exist.
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenPair> {
        let user = match self.users.find_by_username(username).await? {
            Some(user) => user,
            None => {
                debug!(username, "login for unknown username");
                return Err(AuthError::InvalidCredentials);
            }
        };
        // Deactivation is checked before the password so a suspended
        // account always reads as inactive, right password or not.
        if !user.active {
            return Err(AuthError::UserInactive);
        }
        if !self.hasher.verify(password, &user.password_hash)? {
            debug!(user_id = %user.id, "login with wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        let pair = self.issue_for(&user)?;
        self.cache_pair(&user.id, &pair).await;
        info!(user_id = %user.id, "login succeeded");
        Ok(pair)
    }

    /// Exchanges a refresh token for a new pair, rotating both tokens.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair> {
        let claims = self.issuer.verify(refresh_token)?;
        if claims.kind != TokenKind::Refresh {
            return Err(AuthError::InvalidToken(
                "access token presented where a refresh token is required".into(),
            ));
        }

        let user = self
            .users
            .find_by_id(claims.subject_id())
            .await?
            .ok_or_else(|| AuthError::InvalidToken("unknown subject".into()))?;
        if !user.active {
            return Err(AuthError::UserInactive);
        }

        // Best effort; the rotated pair is stored right after.
        let outcome = self.cache.revoke_all(&user.id).await;
        if outcome.is_degraded() {
            warn!(user_id = %user.id, "could not revoke previous tokens during refresh");
        }

        let pair = self.issue_for(&user)?;
        self.cache_pair(&user.id, &pair).await;
        info!(user_id = %user.id, "refreshed token pair");
        Ok(pair)
    }

    /// Decodes and validates a token signature. Does not consult the
    /// revocation cache; callers that need rotation awareness go through
    /// [`TokenCache::is_current`].
    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        self.issuer.verify(token)
    }

    /// Drops the subject's cached tokens. Always succeeds from the
    /// caller's view; with the cache down, outstanding tokens simply run
    /// to their natural expiry.
    pub async fn logout(&self, subject_id: &str) {
        let outcome = self.cache.revoke_all(subject_id).await;
        if outcome.is_degraded() {
            warn!(subject_id, "logout could not reach the token cache");
        } else {
            info!(subject_id, "logged out");
        }
    }

    fn issue_for(&self, user: &User) -> Result<TokenPair> {
        let roles = self.enforcer.get_roles_for_user(&user.id, Domain::User);
        self.issuer.issue_pair(&user.id, &user.full_name, roles)
    }

    async fn cache_pair(&self, user_id: &str, pair: &TokenPair) {
        let access = self
            .cache
            .store(
                user_id,
                TokenKind::Access,
                &pair.access_token,
                self.issuer.access_ttl(),
            )
            .await;
        let refresh = self
            .cache
            .store(
                user_id,
                TokenKind::Refresh,
                &pair.refresh_token,
                self.issuer.refresh_ttl(),
            )
            .await;
        if access.is_degraded() || refresh.is_degraded() {
            warn!(user_id, "token pair issued but not cached; revocation weakened until expiry");
        }
    }
}
