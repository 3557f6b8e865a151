// Dashboard service - provides statistics and chart data
use serde::Serialize;
use sqlx::FromRow;

use crate::db::Database;
use crate::error::Result;
use crate::services::AuditService;

pub const DEFAULT_CHART_DAYS: u32 = 30;
pub const MAX_CHART_DAYS: u32 = 90;

pub struct DashboardService {
    db: Database,
}

#[derive(Debug, Serialize)]
pub struct DashboardStats {
    pub total_users: i64,
    pub new_users_today: i64,
    pub active_users_week: i64,
    pub suspended_users: i64,
    pub total_integrations: i64,
    pub integrations_by_provider: Vec<ProviderCount>,
    pub admin_actions_today: i64,
}

#[derive(Debug, Serialize, FromRow)]
pub struct ProviderCount {
    pub provider: String,
    pub count: i64,
}

#[derive(Debug, Serialize, FromRow)]
pub struct ChartDataPoint {
    pub date: String,
    pub value: i64,
}

/// Number of days a chart covers: default 30, clamped to `1..=90`.
pub fn chart_window(days: Option<u32>) -> u32 {
    days.unwrap_or(DEFAULT_CHART_DAYS).clamp(1, MAX_CHART_DAYS)
}

impl DashboardService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Get dashboard statistics
    pub async fn get_stats(&self) -> Result<DashboardStats> {
        let (total_users, new_users_today, active_users_week, suspended_users): (i64, i64, i64, i64) =
            sqlx::query_as(
                r#"
                SELECT
                    COUNT(*) FILTER (WHERE status <> 'deleted'),
                    COUNT(*) FILTER (WHERE status <> 'deleted' AND created_at >= date_trunc('day', NOW())),
                    COUNT(*) FILTER (WHERE status = 'active' AND last_login_at >= NOW() - INTERVAL '7 days'),
                    COUNT(*) FILTER (WHERE status = 'suspended')
                FROM users
                "#,
            )
            .fetch_one(&self.db.pg)
            .await?;

        let integrations_by_provider: Vec<ProviderCount> = sqlx::query_as(
            r#"
            SELECT i.provider, COUNT(*) AS count
            FROM integrations i
            JOIN users u ON u.id = i.user_id
            WHERE u.status <> 'deleted'
            GROUP BY i.provider
            ORDER BY count DESC, i.provider
            "#,
        )
        .fetch_all(&self.db.pg)
        .await?;

        let total_integrations: i64 = integrations_by_provider.iter().map(|p| p.count).sum();

        let admin_actions_today = AuditService::new(self.db.clone()).count_today().await?;

        Ok(DashboardStats {
            total_users,
            new_users_today,
            active_users_week,
            suspended_users,
            total_integrations,
            integrations_by_provider,
            admin_actions_today,
        })
    }

    /// Daily signups for the last `days` days including today, zero-filled.
    pub async fn signup_chart(&self, days: u32) -> Result<Vec<ChartDataPoint>> {
        let points: Vec<ChartDataPoint> = sqlx::query_as(
            r#"
            SELECT to_char(d.day, 'YYYY-MM-DD') AS date, COUNT(u.id) AS value
            FROM generate_series(
                date_trunc('day', NOW()) - ($1::int - 1) * INTERVAL '1 day',
                date_trunc('day', NOW()),
                INTERVAL '1 day'
            ) AS d(day)
            LEFT JOIN users u
                ON u.created_at >= d.day AND u.created_at < d.day + INTERVAL '1 day'
            GROUP BY d.day
            ORDER BY d.day
            "#,
        )
        .bind(days as i32)
        .fetch_all(&self.db.pg)
        .await?;

        Ok(points)
    }
}
