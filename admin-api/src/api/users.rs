use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::{parse_user_id, ClientContext};
use crate::authz::Operation;
use crate::error::{AppError, Result};
use crate::middleware::{guarded, CurrentPrincipal};
use crate::models::{AuditAction, CreateAuditLog, ResourceType, UpdateUser, UserFilter, UserStatus};
use crate::services::{revoke_drops_admin_tier, AuditService, UserService};
use crate::utils::{format_datetime, mask_email, PageParams, Paginated};
use crate::AppState;

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", guarded(get(list_users), state.gate(Operation::ListUsers)))
        .route("/:id", guarded(get(get_user), state.gate(Operation::ViewUser)))
        .route("/:id", guarded(patch(update_user), state.gate(Operation::UpdateUser)))
        .route("/:id", guarded(delete(delete_user), state.gate(Operation::DeleteUser)))
        .route("/:id/roles", guarded(post(assign_role), state.gate(Operation::AssignRole)))
        .route("/:id/roles/:role", guarded(delete(revoke_role), state.gate(Operation::RevokeRole)))
}

#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    pub search: Option<String>,
    pub status: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserSummaryResponse {
    pub id: String,
    pub external_id: String,
    pub email: String,
    pub name: Option<String>,
    pub status: String,
    pub roles: Vec<String>,
    pub created_at: String,
    pub last_login_at: Option<String>,
}

async fn list_users(
    State(state): State<AppState>,
    Query(page): Query<PageParams>,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<Paginated<UserSummaryResponse>>> {
    let page = page.resolve();
    let status = query
        .status
        .as_deref()
        .map(str::parse::<UserStatus>)
        .transpose()
        .map_err(AppError::BadRequest)?;

    let filter = UserFilter {
        search: query.search.filter(|s| !s.trim().is_empty()),
        status,
        role: query.role,
    };

    let (users, total) = UserService::new(state.db.clone()).list_users(&filter, page).await?;

    Ok(Json(Paginated::new(users, total, page).map(|u| UserSummaryResponse {
        id: u.id.to_string(),
        external_id: u.external_id,
        email: u.email,
        name: u.name,
        status: u.status,
        roles: u.roles,
        created_at: format_datetime(u.created_at),
        last_login_at: u.last_login_at.map(format_datetime),
    })))
}

#[derive(Debug, Serialize)]
pub struct UserDetailResponse {
    pub id: String,
    pub external_id: String,
    pub email: String,
    pub name: Option<String>,
    pub status: String,
    pub roles: Vec<String>,
    pub integrations_count: i64,
    pub last_login_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

async fn get_user(
    State(state): State<AppState>,
    CurrentPrincipal(caller): CurrentPrincipal,
    client: ClientContext,
    Path(id): Path<String>,
) -> Result<Json<UserDetailResponse>> {
    let user_id = parse_user_id(&id)?;

    let user = UserService::new(state.db.clone()).get_user_detail(user_id).await?;

    AuditService::new(state.db.clone())
        .record(CreateAuditLog {
            actor_id: caller.to_string(),
            action: AuditAction::ViewUser,
            resource_type: ResourceType::User,
            resource_id: Some(id),
            details: None,
            ip_address: client.ip_address,
            user_agent: client.user_agent,
        })
        .await;

    Ok(Json(UserDetailResponse {
        id: user.id.to_string(),
        external_id: user.external_id,
        email: user.email,
        name: user.name,
        status: user.status,
        roles: user.roles,
        integrations_count: user.integrations_count,
        last_login_at: user.last_login_at.map(format_datetime),
        created_at: format_datetime(user.created_at),
        updated_at: format_datetime(user.updated_at),
    }))
}

fn validate_settable_status(status: &str) -> std::result::Result<(), ValidationError> {
    match status.parse::<UserStatus>() {
        Ok(UserStatus::Active | UserStatus::Suspended) => Ok(()),
        _ => {
            let mut err = ValidationError::new("invalid_status");
            err.message = Some("status must be active or suspended".into());
            Err(err)
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(custom(function = "validate_settable_status"))]
    pub status: Option<String>,
}

async fn update_user(
    State(state): State<AppState>,
    CurrentPrincipal(caller): CurrentPrincipal,
    client: ClientContext,
    Path(id): Path<String>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<serde_json::Value>> {
    payload.validate()?;

    if payload.name.is_none() && payload.status.is_none() {
        return Err(AppError::BadRequest("Nothing to update".to_string()));
    }

    let user_id = parse_user_id(&id)?;
    let status = payload
        .status
        .as_deref()
        .map(str::parse::<UserStatus>)
        .transpose()
        .map_err(AppError::BadRequest)?;

    let user_service = UserService::new(state.db.clone());
    if status == Some(UserStatus::Suspended) {
        let target = user_service.get_user(user_id).await?;
        if target.external_id == caller.as_str() {
            return Err(AppError::Conflict("Cannot suspend your own account".to_string()));
        }
    }

    let user = user_service
        .update_user(user_id, &UpdateUser { name: payload.name.clone(), status })
        .await?;

    AuditService::new(state.db.clone())
        .record(CreateAuditLog {
            actor_id: caller.to_string(),
            action: AuditAction::UpdateUser,
            resource_type: ResourceType::User,
            resource_id: Some(id.clone()),
            details: Some(serde_json::json!({
                "name": payload.name,
                "status": payload.status,
            })),
            ip_address: client.ip_address,
            user_agent: client.user_agent,
        })
        .await;

    Ok(Json(serde_json::json!({
        "success": true,
        "message": format!("User {} has been updated", id),
        "status": user.status,
        "updated_at": format_datetime(user.updated_at),
    })))
}

async fn delete_user(
    State(state): State<AppState>,
    CurrentPrincipal(caller): CurrentPrincipal,
    client: ClientContext,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let user_id = parse_user_id(&id)?;

    let user_service = UserService::new(state.db.clone());
    let target = user_service.get_user(user_id).await?;
    if target.external_id == caller.as_str() {
        return Err(AppError::Conflict("Cannot delete your own account".to_string()));
    }

    let user = user_service.delete_user(user_id).await?;
    tracing::info!(user_id = %user.id, email = %mask_email(&user.email), "user deleted");

    AuditService::new(state.db.clone())
        .record(CreateAuditLog {
            actor_id: caller.to_string(),
            action: AuditAction::DeleteUser,
            resource_type: ResourceType::User,
            resource_id: Some(id.clone()),
            details: Some(serde_json::json!({ "external_id": user.external_id })),
            ip_address: client.ip_address,
            user_agent: client.user_agent,
        })
        .await;

    Ok(Json(serde_json::json!({
        "success": true,
        "message": format!("User {} has been deleted", id),
    })))
}

#[derive(Debug, Deserialize, Validate)]
pub struct AssignRoleRequest {
    #[validate(length(min = 1, max = 64))]
    pub role: String,
}

async fn assign_role(
    State(state): State<AppState>,
    CurrentPrincipal(caller): CurrentPrincipal,
    client: ClientContext,
    Path(id): Path<String>,
    Json(payload): Json<AssignRoleRequest>,
) -> Result<Json<serde_json::Value>> {
    payload.validate()?;
    let user_id = parse_user_id(&id)?;

    let role = UserService::new(state.db.clone())
        .assign_role(user_id, &payload.role, caller.as_str())
        .await?;

    AuditService::new(state.db.clone())
        .record(CreateAuditLog {
            actor_id: caller.to_string(),
            action: AuditAction::AssignRole,
            resource_type: ResourceType::Role,
            resource_id: Some(role.name.clone()),
            details: Some(serde_json::json!({ "user_id": id })),
            ip_address: client.ip_address,
            user_agent: client.user_agent,
        })
        .await;

    Ok(Json(serde_json::json!({
        "success": true,
        "message": format!("Role {} assigned to user {}", role.name, id),
    })))
}

async fn revoke_role(
    State(state): State<AppState>,
    CurrentPrincipal(caller): CurrentPrincipal,
    client: ClientContext,
    Path((id, role)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>> {
    let user_id = parse_user_id(&id)?;

    let user_service = UserService::new(state.db.clone());
    let target = user_service.get_user(user_id).await?;
    if target.external_id == caller.as_str() {
        let current = user_service.user_roles(user_id).await?;
        if revoke_drops_admin_tier(&current, &role, state.authorizer.baseline()) {
            return Err(AppError::Conflict(
                "Cannot revoke your own last admin role".to_string(),
            ));
        }
    }

    user_service.revoke_role(user_id, &role).await?;

    AuditService::new(state.db.clone())
        .record(CreateAuditLog {
            actor_id: caller.to_string(),
            action: AuditAction::RevokeRole,
            resource_type: ResourceType::Role,
            resource_id: Some(role.clone()),
            details: Some(serde_json::json!({ "user_id": id })),
            ip_address: client.ip_address,
            user_agent: client.user_agent,
        })
        .await;

    Ok(Json(serde_json::json!({
        "success": true,
        "message": format!("Role {} revoked from user {}", role, id),
    })))
}
