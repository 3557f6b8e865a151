use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::authz::Operation;
use crate::error::Result;
use crate::middleware::guarded;
use crate::models::AuditLogFilter;
use crate::services::AuditService;
use crate::utils::{format_datetime, PageParams, Paginated};
use crate::AppState;

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new().route(
        "/",
        guarded(get(list_audit_logs), state.gate(Operation::ListAuditLogs)),
    )
}

#[derive(Debug, Deserialize)]
pub struct AuditLogQuery {
    pub actor: Option<String>,
    pub action: Option<String>,
    pub resource_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AuditLogResponse {
    pub id: String,
    pub actor_id: String,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub details: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: String,
}

async fn list_audit_logs(
    State(state): State<AppState>,
    Query(page): Query<PageParams>,
    Query(query): Query<AuditLogQuery>,
) -> Result<Json<Paginated<AuditLogResponse>>> {
    let page = page.resolve();
    let filter = AuditLogFilter {
        actor_id: query.actor,
        action: query.action,
        resource_type: query.resource_type,
    };

    let (logs, total) = AuditService::new(state.db.clone()).list(&filter, page).await?;

    Ok(Json(Paginated::new(logs, total, page).map(|log| AuditLogResponse {
        id: log.id.to_string(),
        actor_id: log.actor_id,
        action: log.action,
        resource_type: log.resource_type,
        resource_id: log.resource_id,
        details: log.details,
        ip_address: log.ip_address,
        user_agent: log.user_agent,
        created_at: format_datetime(log.created_at),
    })))
}
