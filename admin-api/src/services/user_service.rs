// User service - queries the calendar users table and role assignments
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::authz::{holds_admin_tier, RoleSet};
use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{Role, UpdateUser, User, UserDetail, UserFilter, UserSummary};
use crate::utils::Page;

pub struct UserService {
    db: Database,
}

const SUMMARY_COLUMNS: &str = r#"
    SELECT
        u.id,
        u.external_id,
        u.email,
        u.name,
        u.status,
        COALESCE(array_agg(r.name ORDER BY r.name) FILTER (WHERE r.name IS NOT NULL), '{}'::text[]) AS roles,
        u.created_at,
        u.last_login_at
    FROM users u
    LEFT JOIN user_roles ur ON ur.user_id = u.id
    LEFT JOIN roles r ON r.id = ur.role_id
"#;

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &UserFilter) {
    builder.push(" WHERE u.status <> 'deleted'");

    if let Some(status) = filter.status {
        builder.push(" AND u.status = ").push_bind(status.as_str());
    }

    if let Some(search) = &filter.search {
        let pattern = format!("%{}%", search.replace('%', "\\%").replace('_', "\\_"));
        builder
            .push(" AND (u.email ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR u.name ILIKE ")
            .push_bind(pattern)
            .push(")");
    }

    if let Some(role) = &filter.role {
        builder
            .push(
                " AND EXISTS (SELECT 1 FROM user_roles fur JOIN roles fr ON fr.id = fur.role_id \
                 WHERE fur.user_id = u.id AND fr.name = ",
            )
            .push_bind(role.clone())
            .push(")");
    }
}

/// Whether revoking `role` from `current` would leave no admin-tier role.
pub fn revoke_drops_admin_tier(current: &RoleSet, role: &str, baseline: &RoleSet) -> bool {
    let mut remaining = current.clone();
    remaining.remove(role);
    holds_admin_tier(current, baseline) && !holds_admin_tier(&remaining, baseline)
}

impl UserService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// List users with pagination and filters, newest first
    pub async fn list_users(&self, filter: &UserFilter, page: Page) -> Result<(Vec<UserSummary>, i64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users u");
        push_filters(&mut count, filter);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&self.db.pg)
            .await?;

        let mut query = QueryBuilder::<Postgres>::new(SUMMARY_COLUMNS);
        push_filters(&mut query, filter);
        query
            .push(" GROUP BY u.id ORDER BY u.created_at DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let users: Vec<UserSummary> = query
            .build_query_as()
            .fetch_all(&self.db.pg)
            .await?;

        Ok((users, total))
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<User> {
        sqlx::query_as("SELECT * FROM users WHERE id = $1 AND status <> 'deleted'")
            .bind(user_id)
            .fetch_optional(&self.db.pg)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    pub async fn get_user_detail(&self, user_id: Uuid) -> Result<UserDetail> {
        sqlx::query_as(
            r#"
            SELECT
                u.id,
                u.external_id,
                u.email,
                u.name,
                u.status,
                COALESCE(array_agg(r.name ORDER BY r.name) FILTER (WHERE r.name IS NOT NULL), '{}'::text[]) AS roles,
                (SELECT COUNT(*) FROM integrations i WHERE i.user_id = u.id) AS integrations_count,
                u.last_login_at,
                u.created_at,
                u.updated_at
            FROM users u
            LEFT JOIN user_roles ur ON ur.user_id = u.id
            LEFT JOIN roles r ON r.id = ur.role_id
            WHERE u.id = $1 AND u.status <> 'deleted'
            GROUP BY u.id
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.db.pg)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    pub async fn update_user(&self, user_id: Uuid, update: &UpdateUser) -> Result<User> {
        sqlx::query_as(
            r#"
            UPDATE users
            SET name = COALESCE($2, name),
                status = COALESCE($3, status),
                updated_at = NOW()
            WHERE id = $1 AND status <> 'deleted'
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(update.name.as_deref())
        .bind(update.status.map(|s| s.as_str()))
        .fetch_optional(&self.db.pg)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    /// Soft delete: the row stays for audit history but disappears from listings
    /// and from authorization lookups.
    pub async fn delete_user(&self, user_id: Uuid) -> Result<User> {
        sqlx::query_as(
            r#"
            UPDATE users
            SET status = 'deleted', updated_at = NOW()
            WHERE id = $1 AND status <> 'deleted'
            RETURNING *
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.db.pg)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    pub async fn list_roles(&self) -> Result<Vec<Role>> {
        let roles: Vec<Role> = sqlx::query_as("SELECT * FROM roles ORDER BY name")
            .fetch_all(&self.db.pg)
            .await?;

        Ok(roles)
    }

    pub async fn user_roles(&self, user_id: Uuid) -> Result<RoleSet> {
        let names: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT r.name FROM user_roles ur
            JOIN roles r ON r.id = ur.role_id
            WHERE ur.user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db.pg)
        .await?;

        Ok(names.into_iter().collect())
    }

    pub async fn assign_role(&self, user_id: Uuid, role_name: &str, assigned_by: &str) -> Result<Role> {
        self.get_user(user_id).await?;

        let role: Role = sqlx::query_as("SELECT * FROM roles WHERE name = $1")
            .bind(role_name)
            .fetch_optional(&self.db.pg)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Role {} not found", role_name)))?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO user_roles (user_id, role_id, assigned_by, assigned_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (user_id, role_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(role.id)
        .bind(assigned_by)
        .execute(&self.db.pg)
        .await?
        .rows_affected();

        if inserted == 0 {
            return Err(AppError::Conflict(format!("User already has role {}", role_name)));
        }

        Ok(role)
    }

    pub async fn revoke_role(&self, user_id: Uuid, role_name: &str) -> Result<()> {
        let removed = sqlx::query(
            r#"
            DELETE FROM user_roles ur
            USING roles r
            WHERE ur.role_id = r.id AND ur.user_id = $1 AND r.name = $2
            "#,
        )
        .bind(user_id)
        .bind(role_name)
        .execute(&self.db.pg)
        .await?
        .rows_affected();

        if removed == 0 {
            return Err(AppError::NotFound(format!("User does not have role {}", role_name)));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::{ADMIN, MEMBER, SUPER_ADMIN};

    fn roles(names: &[&str]) -> RoleSet {
        names.iter().copied().collect()
    }

    #[test]
    fn revoking_last_admin_tier_role_is_detected() {
        let baseline = RoleSet::admin_tier();
        assert!(revoke_drops_admin_tier(&roles(&[ADMIN, MEMBER]), ADMIN, &baseline));
        assert!(!revoke_drops_admin_tier(&roles(&[ADMIN, SUPER_ADMIN]), ADMIN, &baseline));
        assert!(!revoke_drops_admin_tier(&roles(&[ADMIN, MEMBER]), MEMBER, &baseline));
    }

    #[test]
    fn non_admin_cannot_drop_what_it_lacks() {
        let baseline = RoleSet::admin_tier();
        assert!(!revoke_drops_admin_tier(&roles(&[MEMBER]), MEMBER, &baseline));
    }

    #[test]
    fn filters_compose_into_where_clause() {
        let filter = UserFilter {
            search: Some("ali".to_string()),
            status: Some(crate::models::UserStatus::Suspended),
            role: Some(ADMIN.to_string()),
        };
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users u");
        push_filters(&mut builder, &filter);
        let sql = builder.sql();
        assert!(sql.contains("u.status <> 'deleted'"));
        assert!(sql.contains("u.status = $1"));
        assert!(sql.contains("u.email ILIKE $2 OR u.name ILIKE $3"));
        assert!(sql.contains("fr.name = $4"));
    }
}
