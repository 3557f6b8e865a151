use axum::{extract::State, Json};
use serde::Serialize;

use crate::authz::{holds_admin_tier, AuthzError, PrincipalStore};
use crate::error::{AppError, Result};
use crate::middleware::CurrentPrincipal;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub id: String,
    pub roles: Vec<String>,
    pub admin_tier: bool,
}

/// The caller's identity and roles, as the authorizer sees them.
pub async fn get_me(
    State(state): State<AppState>,
    CurrentPrincipal(id): CurrentPrincipal,
) -> Result<Json<MeResponse>> {
    let principal = state
        .principals
        .find_principal(&id)
        .await
        .map_err(AuthzError::from)?
        .ok_or_else(|| AppError::NotFound("Principal not found".to_string()))?;

    Ok(Json(MeResponse {
        id: principal.id.to_string(),
        admin_tier: holds_admin_tier(&principal.roles, state.authorizer.baseline()),
        roles: principal.roles.to_strings(),
    }))
}
