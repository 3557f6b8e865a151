//! Read-only lookup of principals and their role names.
//!
//! The authorizer depends only on [`PrincipalStore`]. Production wires in
//! [`PgPrincipalStore`]; tests and local runs without Postgres use
//! [`InMemoryPrincipalStore`].

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tokio::sync::RwLock;

use super::role::RoleSet;

/// Identifier of an authenticated caller: the `sub` claim of a verified token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(String);

impl PrincipalId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: PrincipalId,
    pub roles: RoleSet,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("principal store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

#[async_trait]
pub trait PrincipalStore: Send + Sync {
    /// Fetch a principal with all assigned role names.
    ///
    /// `Ok(None)` means the store answered and has no such principal.
    async fn find_principal(&self, id: &PrincipalId) -> Result<Option<Principal>, StoreError>;
}

/// Postgres-backed store reading `users`, `user_roles` and `roles`.
#[derive(Clone)]
pub struct PgPrincipalStore {
    pool: PgPool,
}

impl PgPrincipalStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PrincipalStore for PgPrincipalStore {
    async fn find_principal(&self, id: &PrincipalId) -> Result<Option<Principal>, StoreError> {
        let rows: Vec<(String, Option<String>)> = sqlx::query_as(
            r#"
            SELECT u.external_id, r.name
            FROM users u
            LEFT JOIN user_roles ur ON ur.user_id = u.id
            LEFT JOIN roles r ON r.id = ur.role_id
            WHERE u.external_id = $1 AND u.status <> 'deleted'
            "#,
        )
        .bind(id.as_str())
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(None);
        }

        let roles: RoleSet = rows.into_iter().filter_map(|(_, role)| role).collect();

        Ok(Some(Principal {
            id: id.clone(),
            roles,
        }))
    }
}

/// Process-local store; state is lost on restart.
#[derive(Default)]
pub struct InMemoryPrincipalStore {
    principals: RwLock<HashMap<PrincipalId, RoleSet>>,
}

impl InMemoryPrincipalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, id: PrincipalId, roles: RoleSet) {
        self.principals.write().await.insert(id, roles);
    }

    pub async fn remove(&self, id: &PrincipalId) -> Option<RoleSet> {
        self.principals.write().await.remove(id)
    }
}

#[async_trait]
impl PrincipalStore for InMemoryPrincipalStore {
    async fn find_principal(&self, id: &PrincipalId) -> Result<Option<Principal>, StoreError> {
        let principals = self.principals.read().await;
        Ok(principals.get(id).map(|roles| Principal {
            id: id.clone(),
            roles: roles.clone(),
        }))
    }
}
