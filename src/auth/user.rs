//! User records and the directory they live in.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AuthError, Result};

/// A registered account. `password_hash` is a PHC string and never
/// leaves the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub full_name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        full_name: impl Into<String>,
        password_hash: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            username: username.into(),
            email: email.into(),
            full_name: full_name.into(),
            password_hash: password_hash.into(),
            active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Account lookup and creation.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>>;
    async fn find_by_id(&self, id: &str) -> Result<Option<User>>;
    /// Fails with [`AuthError::UserAlreadyExists`] on a duplicate username.
    async fn create(&self, user: User) -> Result<User>;
}

/// Process-local directory keyed by user id, with a username index.
#[derive(Default)]
pub struct MemoryUserDirectory {
    by_id: DashMap<String, User>,
    by_username: DashMap<String, String>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let Some(id) = self.by_username.get(username).map(|v| v.clone()) else {
            return Ok(None);
        };
        Ok(self.by_id.get(&id).map(|u| u.clone()))
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>> {
        Ok(self.by_id.get(id).map(|u| u.clone()))
    }

    async fn create(&self, user: User) -> Result<User> {
        use dashmap::mapref::entry::Entry;
        match self.by_username.entry(user.username.clone()) {
            Entry::Occupied(_) => Err(AuthError::UserAlreadyExists(user.username)),
            Entry::Vacant(slot) => {
                slot.insert(user.id.clone());
                self.by_id.insert(user.id.clone(), user.clone());
                Ok(user)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_then_find_by_both_keys() {
        let dir = MemoryUserDirectory::new();
        let created = dir.create(User::new("alice", "alice@example.com", "Alice", "$hash")).await.unwrap();

        let by_name = dir.find_by_username("alice").await.unwrap().unwrap();
        assert_eq!(by_name.id, created.id);
        assert!(by_name.active);

        let by_id = dir.find_by_id(&created.id).await.unwrap().unwrap();
        assert_eq!(by_id.username, "alice");
    }

    #[tokio::test]
    async fn duplicate_username_is_rejected() {
        let dir = MemoryUserDirectory::new();
        dir.create(User::new("alice", "alice@example.com", "Alice", "$h1")).await.unwrap();

        let err = dir.create(User::new("alice", "other@example.com", "Other Alice", "$h2")).await.unwrap_err();
        assert!(matches!(err, AuthError::UserAlreadyExists(name) if name == "alice"));
    }

    #[tokio::test]
    async fn unknown_lookups_return_none() {
        let dir = MemoryUserDirectory::new();
        assert!(dir.find_by_username("nobody").await.unwrap().is_none());
        assert!(dir.find_by_id("no-such-id").await.unwrap().is_none());
    }
}
