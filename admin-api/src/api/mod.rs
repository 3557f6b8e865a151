mod audit;
mod dashboard;
mod me;
mod roles;
mod users;

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::{header::USER_AGENT, request::Parts},
    middleware,
    routing::get,
    Router,
};
use uuid::Uuid;

use crate::authz::Operation;
use crate::error::{AppError, Result};
use crate::middleware::{guarded, identify};
use crate::AppState;

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/me", guarded(get(me::get_me), state.gate(Operation::ViewSelf)))
        .nest("/dashboard", dashboard::routes(state))
        .nest("/users", users::routes(state))
        .nest("/roles", roles::routes(state))
        .nest("/audit-logs", audit::routes(state))
        .layer(middleware::from_fn_with_state(state.verifier.clone(), identify))
}

/// Where an admin request came from, recorded alongside audit entries.
#[derive(Debug, Clone, Default)]
pub struct ClientContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[async_trait]
impl<S> FromRequestParts<S> for ClientContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> std::result::Result<Self, Self::Rejection> {
        let ip_address = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());
        let user_agent = parts
            .headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        Ok(Self { ip_address, user_agent })
    }
}

fn parse_user_id(id: &str) -> Result<Uuid> {
    Uuid::parse_str(id).map_err(|_| AppError::BadRequest("Invalid user ID".to_string()))
}
