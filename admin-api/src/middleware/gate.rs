use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
    routing::MethodRouter,
};

use super::auth::CurrentPrincipal;
use crate::authz::{Authorizer, Decision, Operation, RoleSet};
use crate::error::AppError;

/// Per-route authorization: the operation, its required roles and the
/// authorizer that decides.
#[derive(Clone)]
pub struct Gate {
    operation: Operation,
    required: Arc<RoleSet>,
    authorizer: Authorizer,
}

impl Gate {
    pub fn new(operation: Operation, required: RoleSet, authorizer: Authorizer) -> Self {
        Self {
            operation,
            required: Arc::new(required),
            authorizer,
        }
    }
}

/// Wrap every handler of `route` so it only runs when `gate` allows the caller.
pub fn guarded<S>(route: MethodRouter<S>, gate: Gate) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    route.route_layer(middleware::from_fn_with_state(gate, enforce))
}

async fn enforce(
    State(gate): State<Gate>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let caller = request
        .extensions()
        .get::<CurrentPrincipal>()
        .map(|p| p.0.clone());

    let decision = gate
        .authorizer
        .authorize(&gate.required, caller.as_ref())
        .await
        .map_err(|e| {
            tracing::error!(operation = %gate.operation, error = %e, "authorization check failed");
            AppError::from(e)
        })?;

    match decision {
        Decision::Allow => Ok(next.run(request).await),
        Decision::Deny(reason) => {
            tracing::warn!(
                operation = %gate.operation,
                principal = caller.as_ref().map(|c| c.as_str()).unwrap_or("-"),
                reason = reason.as_str(),
                "access denied"
            );
            Err(AppError::Forbidden)
        }
    }
}
