//! Order creation workflow.
//!
//! Orders are always stored, whatever the health of the user service. The
//! lookup's degradation level only decides the stored validation status:
//!
//! ```text
//! OK          → validated
//! DEGRADED    → degraded     (placeholder user)
//! UNAVAILABLE → unvalidated  (no user at all)
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::client::{UserId, UserRecord};
use crate::observability::metrics;
use crate::orders::model::{NewOrder, Order, OrderDraft, OrderError, OrderId, ValidationStatus};
use crate::orders::store::OrderStore;
use crate::resilience::{CallOrchestrator, DegradationLevel, Dependency, FallbackResolver, RemoteResult};

pub type LookupFuture<'a> = Pin<Box<dyn Future<Output = RemoteResult<UserRecord>> + Send + 'a>>;

/// Resolves users for the order workflow. Never fails; see [`RemoteResult`].
pub trait UserLookup: Send + Sync {
    fn lookup(&self, id: UserId) -> LookupFuture<'_>;
}

impl<D, F> UserLookup for CallOrchestrator<D, F>
where
    D: Dependency<Id = UserId, Output = UserRecord>,
    F: FallbackResolver<UserId, UserRecord>,
{
    fn lookup(&self, id: UserId) -> LookupFuture<'_> {
        Box::pin(self.fetch(id))
    }
}

/// Result of a create request.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderOutcome {
    pub order: Order,
    /// Genuine user for `Ok`, placeholder for `Degraded`, none for `Unavailable`.
    pub user: Option<UserRecord>,
    pub level: DegradationLevel,
}

#[derive(Clone)]
pub struct OrderService {
    users: Arc<dyn UserLookup>,
    store: Arc<dyn OrderStore>,
}

impl OrderService {
    pub fn new(users: Arc<dyn UserLookup>, store: Arc<dyn OrderStore>) -> Self {
        Self { users, store }
    }

    pub async fn create_order(&self, new_order: NewOrder) -> Result<OrderOutcome, OrderError> {
        new_order.validate()?;
        tracing::info!(user_id = new_order.user_id, "Creating order");

        let lookup = self.users.lookup(new_order.user_id).await;
        let validation = ValidationStatus::from(lookup.level);
        let order = self.store.save(OrderDraft {
            order: new_order,
            validation,
        });

        match validation {
            ValidationStatus::Validated => tracing::info!(
                order_id = order.id,
                user_id = order.user_id,
                "Order created with validated user"
            ),
            ValidationStatus::Degraded => tracing::warn!(
                order_id = order.id,
                user_id = order.user_id,
                "Order created with placeholder user, user service degraded"
            ),
            ValidationStatus::Unvalidated => tracing::warn!(
                order_id = order.id,
                user_id = order.user_id,
                "Order created without user validation, user service unavailable"
            ),
        }
        metrics::record_order_created(validation.as_str());

        Ok(OrderOutcome {
            order,
            user: lookup.payload,
            level: lookup.level,
        })
    }

    pub async fn user_details(&self, id: UserId) -> RemoteResult<UserRecord> {
        self.users.lookup(id).await
    }

    pub fn find(&self, id: OrderId) -> Option<Order> {
        self.store.find(id)
    }

    pub fn list(&self) -> Vec<Order> {
        self.store.all()
    }
}

impl std::fmt::Debug for OrderService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderService").finish_non_exhaustive()
    }
}
