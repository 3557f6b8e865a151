use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::authz::Operation;
use crate::error::Result;
use crate::middleware::guarded;
use crate::services::{chart_window, ChartDataPoint, DashboardService, DashboardStats};
use crate::AppState;

pub fn routes(state: &AppState) -> Router<AppState> {
    let gate = || state.gate(Operation::ViewDashboard);

    Router::new()
        .route("/stats", guarded(get(get_stats), gate()))
        .route("/charts/signups", guarded(get(get_signup_chart), gate()))
}

async fn get_stats(
    State(state): State<AppState>,
) -> Result<Json<DashboardStats>> {
    let stats = DashboardService::new(state.db.clone()).get_stats().await?;
    Ok(Json(stats))
}

#[derive(Debug, Deserialize)]
pub struct ChartQuery {
    pub days: Option<u32>,
}

async fn get_signup_chart(
    State(state): State<AppState>,
    Query(query): Query<ChartQuery>,
) -> Result<Json<Vec<ChartDataPoint>>> {
    let days = chart_window(query.days);
    let points = DashboardService::new(state.db.clone()).signup_chart(days).await?;
    Ok(Json(points))
}
