//! Order types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::client::UserId;
use crate::resilience::DegradationLevel;

pub type OrderId = u64;

/// How far the ordering user was verified when the order was stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    /// The user service confirmed the user.
    Validated,
    /// Only a placeholder user was available.
    Degraded,
    /// No user information at all.
    Unvalidated,
}

impl ValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationStatus::Validated => "validated",
            ValidationStatus::Degraded => "degraded",
            ValidationStatus::Unvalidated => "unvalidated",
        }
    }
}

impl From<DegradationLevel> for ValidationStatus {
    fn from(level: DegradationLevel) -> Self {
        match level {
            DegradationLevel::Ok => ValidationStatus::Validated,
            DegradationLevel::Degraded => ValidationStatus::Degraded,
            DegradationLevel::Unavailable => ValidationStatus::Unvalidated,
        }
    }
}

/// Order creation request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrder {
    pub user_id: UserId,
    pub product: String,
    pub quantity: u32,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrderError {
    #[error("product must not be empty")]
    EmptyProduct,

    #[error("quantity must be at least 1")]
    ZeroQuantity,

    #[error("price must be a non-negative number, got {0}")]
    InvalidPrice(f64),
}

impl NewOrder {
    pub fn validate(&self) -> Result<(), OrderError> {
        if self.product.trim().is_empty() {
            return Err(OrderError::EmptyProduct);
        }
        if self.quantity == 0 {
            return Err(OrderError::ZeroQuantity);
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(OrderError::InvalidPrice(self.price));
        }
        Ok(())
    }
}

/// An order that has not been stored yet.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderDraft {
    pub order: NewOrder,
    pub validation: ValidationStatus,
}

/// A stored order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub product: String,
    pub quantity: u32,
    pub price: f64,
    pub validation: ValidationStatus,
    /// Seconds since the Unix epoch.
    pub created_at: u64,
}
