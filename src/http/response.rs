//! Response shaping.
//!
//! # Responsibilities
//! - Map degradation levels to HTTP status codes
//! - Build the order and user-details JSON bodies, warnings included
//! - Map request errors to 4xx responses
//!
//! # Design Decisions
//! - Dependency trouble is a 503 with a usable body, never a 5xx without one
//! - The degradation level decides the status, not the payload contents

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::client::{UserId, UserRecord};
use crate::orders::{Order, OrderError, OrderId, OrderOutcome};
use crate::resilience::{DegradationLevel, RemoteResult};

pub const DEGRADED_ORDER_WARNING: &str =
    "User service degraded. Order created with fallback validation.";
pub const UNAVAILABLE_ORDER_WARNING: &str =
    "User service unavailable. Order created without user validation.";
pub const DEGRADED_USER_WARNING: &str = "User service degraded - returning fallback data";
pub const UNAVAILABLE_USER_ERROR: &str = "User service unavailable";

pub fn status_for(level: DegradationLevel) -> StatusCode {
    match level {
        DegradationLevel::Ok => StatusCode::OK,
        DegradationLevel::Degraded | DegradationLevel::Unavailable => {
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// Body of `POST /api/orders`.
#[derive(Debug, Serialize)]
pub struct CreatedOrder {
    pub order: Order,
    pub user_validated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_user: Option<UserRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<&'static str>,
}

impl From<OrderOutcome> for CreatedOrder {
    fn from(outcome: OrderOutcome) -> Self {
        let OrderOutcome { order, user, level } = outcome;
        match level {
            DegradationLevel::Ok => CreatedOrder {
                order,
                user_validated: true,
                user,
                fallback_user: None,
                warning: None,
            },
            DegradationLevel::Degraded => CreatedOrder {
                order,
                user_validated: false,
                user: None,
                fallback_user: user,
                warning: Some(DEGRADED_ORDER_WARNING),
            },
            DegradationLevel::Unavailable => CreatedOrder {
                order,
                user_validated: false,
                user: None,
                fallback_user: None,
                warning: Some(UNAVAILABLE_ORDER_WARNING),
            },
        }
    }
}

pub fn created_order(outcome: OrderOutcome) -> Response {
    let status = status_for(outcome.level);
    (status, Json(CreatedOrder::from(outcome))).into_response()
}

/// Body of `GET /api/orders/user/{user_id}`.
pub fn user_details(user_id: UserId, result: RemoteResult<UserRecord>) -> Response {
    match (result.level, result.payload) {
        (DegradationLevel::Ok, Some(user)) => (StatusCode::OK, Json(user)).into_response(),
        (DegradationLevel::Degraded, Some(user)) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "warning": DEGRADED_USER_WARNING, "user": user })),
        )
            .into_response(),
        _ => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": UNAVAILABLE_USER_ERROR, "user_id": user_id.to_string() })),
        )
            .into_response(),
    }
}

/// Errors a handler can return directly.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    InvalidOrder(#[from] OrderError),

    #[error("order {0} not found")]
    OrderNotFound(OrderId),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidOrder(_) => StatusCode::BAD_REQUEST,
            ApiError::OrderNotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
