//! Order domain.
//!
//! # Data Flow
//! ```text
//! NewOrder
//!     → service.rs (validate input, look up user through the orchestrator)
//!     → model.rs (map degradation level to validation status)
//!     → store.rs (persist, assign id)
//!     → OrderOutcome back to the HTTP layer
//! ```

pub mod model;
pub mod service;
pub mod store;

pub use model::{NewOrder, Order, OrderDraft, OrderError, OrderId, ValidationStatus};
pub use service::{OrderOutcome, OrderService, UserLookup};
pub use store::{InMemoryOrderStore, OrderStore};
