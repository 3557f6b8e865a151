//! Admin backend for the calendar aggregation service.
//!
//! Every admin route is wrapped in a [`middleware::Gate`] built from the
//! [`authz::OperationPolicy`]: the caller is identified from a bearer token,
//! then [`authz::Authorizer`] decides from the roles held in the user store.

pub mod api;
pub mod authz;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod services;
pub mod telemetry;
pub mod utils;

use std::sync::Arc;

use axum::{routing::get, Router};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::authz::{Authorizer, Operation, OperationPolicy, PrincipalStore};
use crate::config::Config;
use crate::db::Database;
use crate::middleware::{Gate, TokenVerifier};

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Config,
    pub principals: Arc<dyn PrincipalStore>,
    pub authorizer: Authorizer,
    pub policy: Arc<OperationPolicy>,
    pub verifier: TokenVerifier,
}

impl AppState {
    pub fn new(config: Config, db: Database, principals: Arc<dyn PrincipalStore>) -> anyhow::Result<Self> {
        let verifier = TokenVerifier::from_config(&config.auth)?;
        let authorizer = Authorizer::new(principals.clone(), config.authz.baseline());
        let policy = Arc::new(OperationPolicy::from_config(&config.authz));

        Ok(Self {
            db,
            config,
            principals,
            authorizer,
            policy,
            verifier,
        })
    }

    /// Gate for `operation` using the configured requirement.
    pub fn gate(&self, operation: Operation) -> Gate {
        Gate::new(operation, self.policy.required(operation), self.authorizer.clone())
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api::routes(&state))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
