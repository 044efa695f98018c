use axum::{
    extract::{Path, State},
    response::Response,
    Json,
};
use serde::Serialize;

use crate::client::UserId;
use crate::http::response::{self, ApiError};
use crate::http::server::AppState;
use crate::orders::{NewOrder, Order, OrderId};
use crate::resilience::BreakerSnapshot;

#[derive(Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "UP",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn create_order(
    State(state): State<AppState>,
    Json(new_order): Json<NewOrder>,
) -> Result<Response, ApiError> {
    let outcome = state.orders.create_order(new_order).await?;
    Ok(response::created_order(outcome))
}

pub async fn list_orders(State(state): State<AppState>) -> Json<Vec<Order>> {
    Json(state.orders.list())
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>, ApiError> {
    state
        .orders
        .find(id)
        .map(Json)
        .ok_or(ApiError::OrderNotFound(id))
}

pub async fn get_user_details(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> Response {
    tracing::info!(user_id, "Fetching user details");
    let result = state.orders.user_details(user_id).await;
    response::user_details(user_id, result)
}

pub async fn breaker_status(State(state): State<AppState>) -> Json<BreakerSnapshot> {
    Json(state.breaker.snapshot())
}
