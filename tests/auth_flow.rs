//! Full session lifecycle: register, login, authorize, refresh, logout.

use std::sync::Arc;
use std::time::Duration;

use iam_core::auth::{Argon2Hasher, MemoryUserDirectory};
use iam_core::rbac::MemoryAdapter;
use iam_core::token::{TokenCache, TokenKind};
use iam_core::{AuthError, AuthFlow, Domain, Enforcer, PolicyRule, TokenIssuer};

struct Harness {
    flow: AuthFlow,
    enforcer: Arc<Enforcer>,
    cache: TokenCache,
}

async fn harness() -> Harness {
    let adapter = Arc::new(MemoryAdapter::new());
    let enforcer = Arc::new(Enforcer::new(adapter).await.unwrap());
    let cache = TokenCache::in_memory(Duration::from_secs(2));
    let flow = AuthFlow::new(
        Arc::new(MemoryUserDirectory::new()),
        Arc::new(Argon2Hasher::new()),
        Arc::new(TokenIssuer::new(
            "integration-test-secret-0123456789ab",
            Duration::from_secs(900),
            Duration::from_secs(3600),
        )),
        cache.clone(),
        enforcer.clone(),
    );
    Harness {
        flow,
        enforcer,
        cache,
    }
}

#[tokio::test]
async fn register_login_then_pass_an_authorization_check() {
    let h = harness().await;

    let user = h
        .flow
        .register("alice", "alice@example.com", "Alice", "Secret123!")
        .await
        .unwrap();

    h.enforcer
        .add_role_for_user(&user.id, "user", Domain::User)
        .await
        .unwrap();
    h.enforcer
        .add_policy(PolicyRule::new("user", Domain::User, "/profile", "GET"))
        .await
        .unwrap();

    let pair = h.flow.login("alice", "Secret123!").await.unwrap();
    assert_eq!(pair.token_type, "Bearer");
    assert_eq!(pair.expires_in, 900);

    let claims = h.flow.verify_token(&pair.access_token).unwrap();
    assert_eq!(claims.kind, TokenKind::Access);
    assert!(claims.has_role("user"));

    assert!(h
        .enforcer
        .enforce(claims.subject_id(), Domain::User, "/profile", "GET")
        .unwrap());
    assert!(!h
        .enforcer
        .enforce(claims.subject_id(), Domain::User, "/admin", "GET")
        .unwrap());
}

#[tokio::test]
async fn role_snapshot_in_the_token_reflects_login_time_state() {
    let h = harness().await;
    let user = h
        .flow
        .register("bob", "bob@example.com", "Bob", "Secret123!")
        .await
        .unwrap();

    let before = h.flow.login("bob", "Secret123!").await.unwrap();
    let claims = h.flow.verify_token(&before.access_token).unwrap();
    assert!(claims.roles.is_empty());

    h.enforcer
        .add_role_for_user(&user.id, "admin", Domain::User)
        .await
        .unwrap();

    // The old token keeps its stale snapshot; a new login sees the role.
    let claims = h.flow.verify_token(&before.access_token).unwrap();
    assert!(!claims.has_role("admin"));

    let after = h.flow.login("bob", "Secret123!").await.unwrap();
    let claims = h.flow.verify_token(&after.access_token).unwrap();
    assert!(claims.has_role("admin"));
}

#[tokio::test]
async fn refresh_rotation_supersedes_the_old_pair_in_the_cache() {
    let h = harness().await;
    let user = h
        .flow
        .register("carol", "carol@example.com", "Carol", "Secret123!")
        .await
        .unwrap();

    let first = h.flow.login("carol", "Secret123!").await.unwrap();
    let second = h.flow.refresh(&first.refresh_token).await.unwrap();
    assert_ne!(first.access_token, second.access_token);
    assert_ne!(first.refresh_token, second.refresh_token);

    // The rotated-out refresh token still verifies cryptographically...
    assert!(h.flow.verify_token(&first.refresh_token).is_ok());
    // ...but it is no longer the current one for the subject.
    let (current, _) = h
        .cache
        .is_current(&user.id, TokenKind::Refresh, &first.refresh_token)
        .await;
    assert!(!current);
    let (current, _) = h
        .cache
        .is_current(&user.id, TokenKind::Refresh, &second.refresh_token)
        .await;
    assert!(current);
}

#[tokio::test]
async fn refresh_requires_a_refresh_token_and_a_live_user() {
    let h = harness().await;
    h.flow
        .register("dave", "dave@example.com", "Dave", "Secret123!")
        .await
        .unwrap();
    let pair = h.flow.login("dave", "Secret123!").await.unwrap();

    assert!(matches!(
        h.flow.refresh(&pair.access_token).await,
        Err(AuthError::InvalidToken(_))
    ));
    assert!(matches!(
        h.flow.refresh("not-a-token").await,
        Err(AuthError::InvalidToken(_))
    ));
}

#[tokio::test]
async fn logout_clears_both_cache_entries() {
    let h = harness().await;
    let user = h
        .flow
        .register("erin", "erin@example.com", "Erin", "Secret123!")
        .await
        .unwrap();
    h.flow.login("erin", "Secret123!").await.unwrap();

    let (valid, _) = h.cache.is_valid(&user.id, TokenKind::Access).await;
    assert!(valid);
    let (valid, _) = h.cache.is_valid(&user.id, TokenKind::Refresh).await;
    assert!(valid);

    h.flow.logout(&user.id).await;

    let (valid, _) = h.cache.is_valid(&user.id, TokenKind::Access).await;
    assert!(!valid);
    let (valid, _) = h.cache.is_valid(&user.id, TokenKind::Refresh).await;
    assert!(!valid);
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let h = harness().await;
    h.flow
        .register("frank", "frank@example.com", "Frank", "Secret123!")
        .await
        .unwrap();

    assert!(matches!(
        h.flow
            .register("frank", "frank2@example.com", "Frank II", "Other456!")
            .await,
        Err(AuthError::UserAlreadyExists(_))
    ));
}
