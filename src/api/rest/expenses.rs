use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::api::rest::auth::{CurrentUser, EXPENSE_LOGGERS, MANAGERS};
use crate::api::rest::params::{missing_fields, parse_timestamp, text, IdQuery, Numeric};
use crate::engine::expenses::expense_feed;
use crate::error::AppError;
use crate::models::expense::{ExpenseEntry, ExpenseKind, NewExpense};
use crate::state::AppState;
use crate::store::StoreError;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route(
        "/api/expenses",
        get(get_expenses).post(create_expense).delete(delete_expense),
    )
}

#[derive(Debug, Default, Deserialize)]
pub struct ExpenseQuery {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseRequest {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub amount: Option<Numeric>,
    pub description: Option<String>,
    pub date: Option<String>,
    pub trip_id: Option<Numeric>,
    pub driver_id: Option<String>,
}

async fn get_expenses(
    _user: CurrentUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ExpenseQuery>,
) -> Result<Json<Vec<ExpenseEntry>>, AppError> {
    let filter = match text(query.kind) {
        Some(raw) => match raw.parse::<ExpenseKind>() {
            Ok(kind) => Some(kind),
            // An unknown type matches nothing.
            Err(_) => return Ok(Json(Vec::new())),
        },
        None => None,
    };

    let services = state.store.list_services().await?;
    let trips = state.store.list_trips().await?;
    let manual = state.store.list_expenses().await?;

    Ok(Json(expense_feed(&services, &trips, &manual, filter)))
}

async fn create_expense(
    user: CurrentUser,
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ExpenseRequest>,
) -> Result<impl IntoResponse, AppError> {
    user.require(&state, EXPENSE_LOGGERS)?;

    let (Some(kind), Some(amount), Some(description)) =
        (text(payload.kind), payload.amount, text(payload.description))
    else {
        return Err(missing_fields("type, amount, description"));
    };

    let kind = match kind.parse::<ExpenseKind>() {
        Ok(ExpenseKind::Maintenance) => {
            return Err(AppError::BadRequest(
                "Maintenance expenses should be logged via the Maintenance page".to_string(),
            ));
        }
        Ok(kind) => kind,
        Err(_) => {
            return Err(AppError::BadRequest(
                "Invalid expense type. Supported: fuel, other".to_string(),
            ));
        }
    };

    let amount = amount.to_i32("amount")?;
    if amount <= 0 {
        return Err(AppError::BadRequest("amount must be > 0".to_string()));
    }

    let expense = state
        .store
        .create_expense(NewExpense {
            kind,
            amount,
            description,
            date: match text(payload.date) {
                Some(raw) => parse_timestamp(&raw, "date")?,
                None => Utc::now(),
            },
            trip_id: payload
                .trip_id
                .as_ref()
                .map(|id| id.to_i32("tripId"))
                .transpose()?,
            driver_id: text(payload.driver_id),
        })
        .await?;

    info!(expense_id = expense.id, kind = %expense.kind, amount = expense.amount, "expense logged");
    Ok((StatusCode::CREATED, Json(expense)))
}

async fn delete_expense(
    user: CurrentUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ExpenseQuery>,
) -> Result<impl IntoResponse, AppError> {
    user.require(&state, MANAGERS)?;
    let id = IdQuery { id: query.id }.required_int("Expense")?;

    let deleted = if text(query.kind).as_deref() == Some(ExpenseKind::Maintenance.as_str()) {
        state.store.delete_service(id).await.map(|_| ())
    } else {
        state.store.delete_expense(id).await.map(|_| ())
    };

    match deleted {
        Err(StoreError::NotFound(_)) => {
            return Err(AppError::NotFound("Expense not found".to_string()));
        }
        other => other?,
    }

    info!(expense_id = id, "expense deleted");
    Ok(Json(json!({ "message": "Expense deleted successfully" })))
}
