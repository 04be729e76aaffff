use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::Json;
use axum::Router;

use crate::api::rest::auth::CurrentUser;
use crate::engine::expenses::{dashboard_kpi, expense_feed, DashboardKpi};
use crate::error::AppError;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/api/dashboard", get(dashboard))
}

async fn dashboard(
    _user: CurrentUser,
    State(state): State<Arc<AppState>>,
) -> Result<Json<DashboardKpi>, AppError> {
    let vehicles = state.store.list_vehicles().await?;
    let drivers = state.store.list_drivers().await?;
    let trips = state.store.list_trips().await?;
    let services = state.store.list_services().await?;
    let manual = state.store.list_expenses().await?;

    let feed = expense_feed(&services, &trips, &manual, None);
    Ok(Json(dashboard_kpi(
        vehicles.len(),
        &trips,
        drivers.len(),
        &services,
        &feed,
    )))
}
