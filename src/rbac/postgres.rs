//! PostgreSQL policy adapter

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use std::time::Duration;

use super::adapter::PolicyAdapter;
use crate::error::{AuthError, Result};
use crate::types::{Domain, PolicyRule, RoleAssignment};

/// Durable policy storage backed by PostgreSQL with connection pooling.
///
/// Expects two tables:
///
/// ```sql
/// CREATE TABLE policy_rules (
///     role TEXT NOT NULL, domain TEXT NOT NULL,
///     resource TEXT NOT NULL, action TEXT NOT NULL,
///     PRIMARY KEY (role, domain, resource, action)
/// );
/// CREATE TABLE role_edges (
///     member TEXT NOT NULL, role TEXT NOT NULL, domain TEXT NOT NULL,
///     PRIMARY KEY (member, role, domain)
/// );
/// ```
pub struct PostgresAdapter {
    pool: PgPool,
}

impl PostgresAdapter {
    /// Connect to `database_url` with the standard pool settings.
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(25)
            .min_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AuthError::Storage(format!("failed to connect to database: {e}")))?;

        Ok(Self { pool })
    }

    /// Pool handle for advanced queries.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl PolicyAdapter for PostgresAdapter {
    async fn load_policy_rules(&self) -> Result<Vec<PolicyRule>> {
        let rows = sqlx::query("SELECT role, domain, resource, action FROM policy_rules")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AuthError::Storage(format!("failed to load policy rules: {e}")))?;

        let mut rules = Vec::with_capacity(rows.len());
        for row in rows {
            let domain: String = row
                .try_get("domain")
                .map_err(|e| AuthError::Storage(format!("failed to read policy row: {e}")))?;
            let role: String = row
                .try_get("role")
                .map_err(|e| AuthError::Storage(format!("failed to read policy row: {e}")))?;
            let resource: String = row
                .try_get("resource")
                .map_err(|e| AuthError::Storage(format!("failed to read policy row: {e}")))?;
            let action: String = row
                .try_get("action")
                .map_err(|e| AuthError::Storage(format!("failed to read policy row: {e}")))?;

            rules.push(PolicyRule::new(role, domain.parse::<Domain>()?, resource, action));
        }
        Ok(rules)
    }

    async fn load_role_edges(&self) -> Result<Vec<RoleAssignment>> {
        let rows = sqlx::query("SELECT member, role, domain FROM role_edges")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AuthError::Storage(format!("failed to load role edges: {e}")))?;

        let mut edges = Vec::with_capacity(rows.len());
        for row in rows {
            let member: String = row
                .try_get("member")
                .map_err(|e| AuthError::Storage(format!("failed to read edge row: {e}")))?;
            let role: String = row
                .try_get("role")
                .map_err(|e| AuthError::Storage(format!("failed to read edge row: {e}")))?;
            let domain: String = row
                .try_get("domain")
                .map_err(|e| AuthError::Storage(format!("failed to read edge row: {e}")))?;

            edges.push(RoleAssignment::new(member, role, domain.parse::<Domain>()?));
        }
        Ok(edges)
    }

    async fn persist_policy_change(&self, rule: &PolicyRule, added: bool) -> Result<()> {
        let query = if added {
            sqlx::query(
                "INSERT INTO policy_rules (role, domain, resource, action)
                 VALUES ($1, $2, $3, $4) ON CONFLICT DO NOTHING",
            )
        } else {
            sqlx::query(
                "DELETE FROM policy_rules
                 WHERE role = $1 AND domain = $2 AND resource = $3 AND action = $4",
            )
        };

        query
            .bind(&rule.role)
            .bind(rule.domain.as_str())
            .bind(&rule.resource)
            .bind(&rule.action)
            .execute(&self.pool)
            .await
            .map_err(|e| AuthError::Storage(format!("failed to persist policy change: {e}")))?;
        Ok(())
    }

    async fn persist_role_edge_change(&self, edge: &RoleAssignment, added: bool) -> Result<()> {
        let query = if added {
            sqlx::query(
                "INSERT INTO role_edges (member, role, domain)
                 VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
            )
        } else {
            sqlx::query("DELETE FROM role_edges WHERE member = $1 AND role = $2 AND domain = $3")
        };

        query
            .bind(&edge.member)
            .bind(&edge.role)
            .bind(edge.domain.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| AuthError::Storage(format!("failed to persist edge change: {e}")))?;
        Ok(())
    }
}
