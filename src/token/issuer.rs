//! Signed token issuance and verification
//!
//! Tokens are HS256 JWTs over a process-wide symmetric secret. Verification
//! fails closed: any parse error or signature mismatch yields
//! [`AuthError::InvalidToken`], expiry yields [`AuthError::TokenExpired`],
//! and no claims are ever returned from a failed verification.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::time::Duration;

use super::claims::Claims;
use crate::error::{AuthError, Result};
use crate::types::TokenPair;

/// Issues and verifies access/refresh tokens.
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenIssuer {
    /// Build an issuer over `secret` with the configured token lifetimes.
    pub fn new(secret: &str, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry boundaries are exact; no clock-skew leeway
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            access_ttl,
            refresh_ttl,
        }
    }

    /// Mint an access token carrying the subject's role snapshot.
    pub fn issue_access_token(
        &self,
        subject_id: &str,
        display_name: &str,
        roles: Vec<String>,
    ) -> Result<String> {
        self.sign(&Claims::access(subject_id, display_name, roles, self.access_ttl))
    }

    /// Mint a refresh token carrying the subject id only.
    pub fn issue_refresh_token(&self, subject_id: &str) -> Result<String> {
        self.sign(&Claims::refresh(subject_id, self.refresh_ttl))
    }

    /// Mint an access/refresh pair atomically.
    ///
    /// `expires_in` reports the configured access-token duration in whole
    /// seconds, not a recomputed remaining-time value.
    pub fn issue_pair(
        &self,
        subject_id: &str,
        display_name: &str,
        roles: Vec<String>,
    ) -> Result<TokenPair> {
        let access_token = self.issue_access_token(subject_id, display_name, roles)?;
        let refresh_token = self.issue_refresh_token(subject_id)?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.access_ttl.as_secs() as i64,
        })
    }

    /// Verify signature and expiry, returning the decoded claims.
    ///
    /// A token whose expiry equals the current second is already expired:
    /// the lifetime is `[iat, exp)`.
    pub fn verify(&self, token: &str) -> Result<Claims> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                    AuthError::InvalidToken("signature mismatch".to_string())
                }
                _ => AuthError::InvalidToken(e.to_string()),
            })?;

        // The library's check is exclusive (exp < now); close the boundary
        if claims.exp <= chrono::Utc::now().timestamp() {
            return Err(AuthError::TokenExpired);
        }
        Ok(claims)
    }

    /// Configured access-token lifetime.
    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    /// Configured refresh-token lifetime.
    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    fn sign(&self, claims: &Claims) -> Result<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AuthError::TokenGenerationFailed(e.to_string()))
    }
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::claims::TokenKind;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(
            "0123456789abcdef0123456789abcdef",
            Duration::from_secs(900),
            Duration::from_secs(7 * 24 * 3600),
        )
    }

    #[test]
    fn test_access_token_round_trip() {
        let issuer = issuer();
        let roles = vec!["admin".to_string(), "user".to_string()];
        let token = issuer.issue_access_token("u1", "Alice", roles.clone()).unwrap();

        let claims = issuer.verify(&token).unwrap();
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.name.as_deref(), Some("Alice"));
        // Role order is preserved
        assert_eq!(claims.roles, roles);
        assert_eq!(claims.kind, TokenKind::Access);
        assert!(claims.iat < claims.exp);
    }

    #[test]
    fn test_refresh_token_carries_subject_only() {
        let issuer = issuer();
        let token = issuer.issue_refresh_token("u1").unwrap();

        let claims = issuer.verify(&token).unwrap();
        assert_eq!(claims.sub, "u1");
        assert!(claims.name.is_none());
        assert!(claims.roles.is_empty());
        assert_eq!(claims.kind, TokenKind::Refresh);
    }

    #[test]
    fn test_pair_reports_configured_duration() {
        let issuer = issuer();
        let pair = issuer.issue_pair("u1", "Alice", vec![]).unwrap();
        assert_eq!(pair.token_type, "Bearer");
        assert_eq!(pair.expires_in, 900);
        assert_ne!(pair.access_token, pair.refresh_token);
    }

    #[test]
    fn test_expired_token_fails_closed() {
        let issuer = issuer();
        let mut claims = Claims::access("u1", "Alice", vec![], Duration::from_secs(60));
        claims.iat -= 120;
        claims.exp -= 120;
        let token = issuer.sign(&claims).unwrap();

        assert!(matches!(issuer.verify(&token), Err(AuthError::TokenExpired)));
    }

    #[test]
    fn test_expiry_boundary_is_inclusive() {
        let issuer = issuer();
        // exp exactly now: already outside the [iat, exp) lifetime
        let mut claims = Claims::access("u1", "Alice", vec![], Duration::from_secs(0));
        claims.iat -= 60;
        let token = issuer.sign(&claims).unwrap();

        assert!(matches!(issuer.verify(&token), Err(AuthError::TokenExpired)));
    }

    #[test]
    fn test_tampered_token_rejected() {
        let issuer = issuer();
        let token = issuer.issue_access_token("u1", "Alice", vec![]).unwrap();

        // Swap the payload for a forged one; the signature no longer matches
        let parts: Vec<&str> = token.split('.').collect();
        let forged_payload = issuer.issue_access_token("u2", "Mallory", vec![]).unwrap();
        let forged_parts: Vec<&str> = forged_payload.split('.').collect();
        let tampered = format!("{}.{}.{}", parts[0], forged_parts[1], parts[2]);

        assert!(matches!(issuer.verify(&tampered), Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let issuer = issuer();
        let other = TokenIssuer::new(
            "ffffffffffffffffffffffffffffffff",
            Duration::from_secs(900),
            Duration::from_secs(3600),
        );
        let token = issuer.issue_access_token("u1", "Alice", vec![]).unwrap();
        assert!(other.verify(&token).is_err());
    }

    #[test]
    fn test_garbage_input_never_panics() {
        let issuer = issuer();
        for garbage in ["", "not-a-token", "a.b.c", "....", "🦀"] {
            assert!(issuer.verify(garbage).is_err());
        }
    }
}
