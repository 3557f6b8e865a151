use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::authz::Operation;
use crate::error::Result;
use crate::middleware::guarded;
use crate::services::UserService;
use crate::utils::format_datetime;
use crate::AppState;

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new().route("/", guarded(get(list_roles), state.gate(Operation::ListRoles)))
}

#[derive(Debug, Serialize)]
pub struct RoleResponse {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub admin_tier: bool,
    pub created_at: String,
}

async fn list_roles(State(state): State<AppState>) -> Result<Json<Vec<RoleResponse>>> {
    let baseline = state.authorizer.baseline();
    let roles = UserService::new(state.db.clone()).list_roles().await?;

    Ok(Json(
        roles
            .into_iter()
            .map(|r| RoleResponse {
                id: r.id.to_string(),
                admin_tier: baseline.contains(&r.name),
                name: r.name,
                description: r.description,
                created_at: format_datetime(r.created_at),
            })
            .collect(),
    ))
}
