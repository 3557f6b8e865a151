// Audit service - append-only record of admin actions
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::db::Database;
use crate::error::Result;
use crate::models::{AuditLog, AuditLogFilter, CreateAuditLog};
use crate::utils::Page;

pub struct AuditService {
    db: Database,
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &AuditLogFilter) {
    builder.push(" WHERE 1=1");

    if let Some(actor) = &filter.actor_id {
        builder.push(" AND actor_id = ").push_bind(actor.clone());
    }
    if let Some(action) = &filter.action {
        builder.push(" AND action = ").push_bind(action.clone());
    }
    if let Some(resource_type) = &filter.resource_type {
        builder.push(" AND resource_type = ").push_bind(resource_type.clone());
    }
}

impl AuditService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn log(&self, entry: CreateAuditLog) -> Result<AuditLog> {
        let log: AuditLog = sqlx::query_as(
            r#"
            INSERT INTO audit_logs (id, actor_id, action, resource_type, resource_id, details, ip_address, user_agent, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())
            RETURNING *
            "#
        )
        .bind(Uuid::new_v4())
        .bind(entry.actor_id)
        .bind(entry.action.as_str())
        .bind(entry.resource_type.as_str())
        .bind(entry.resource_id)
        .bind(entry.details)
        .bind(entry.ip_address)
        .bind(entry.user_agent)
        .fetch_one(&self.db.pg)
        .await?;

        Ok(log)
    }

    /// Record an entry without failing the surrounding admin action.
    pub async fn record(&self, entry: CreateAuditLog) {
        let action = entry.action.as_str();
        if let Err(e) = self.log(entry).await {
            tracing::warn!(action, error = %e, "failed to write audit log");
        }
    }

    pub async fn list(&self, filter: &AuditLogFilter, page: Page) -> Result<(Vec<AuditLog>, i64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM audit_logs");
        push_filters(&mut count, filter);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&self.db.pg)
            .await?;

        let mut query = QueryBuilder::<Postgres>::new("SELECT * FROM audit_logs");
        push_filters(&mut query, filter);
        query
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let logs: Vec<AuditLog> = query
            .build_query_as()
            .fetch_all(&self.db.pg)
            .await?;

        Ok((logs, total))
    }

    pub async fn count_today(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM audit_logs WHERE created_at >= date_trunc('day', NOW())"
        )
        .fetch_one(&self.db.pg)
        .await?;

        Ok(count)
    }
}
