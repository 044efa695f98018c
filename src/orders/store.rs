//! Order persistence.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;

use crate::orders::model::{Order, OrderDraft, OrderId};

/// Key-value store for orders.
pub trait OrderStore: Send + Sync {
    /// Persist a draft and return it with its assigned id.
    fn save(&self, draft: OrderDraft) -> Order;

    fn find(&self, id: OrderId) -> Option<Order>;

    /// All orders, ordered by id.
    fn all(&self) -> Vec<Order>;
}

/// In-memory store with sequential ids starting at 1.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderStore {
    orders: Arc<DashMap<OrderId, Order>>,
    next_id: Arc<AtomicU64>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

impl OrderStore for InMemoryOrderStore {
    fn save(&self, draft: OrderDraft) -> Order {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        let order = Order {
            id,
            user_id: draft.order.user_id,
            product: draft.order.product,
            quantity: draft.order.quantity,
            price: draft.order.price,
            validation: draft.validation,
            created_at,
        };
        self.orders.insert(id, order.clone());
        order
    }

    fn find(&self, id: OrderId) -> Option<Order> {
        self.orders.get(&id).map(|r| r.value().clone())
    }

    fn all(&self) -> Vec<Order> {
        let mut orders: Vec<Order> = self.orders.iter().map(|r| r.value().clone()).collect();
        orders.sort_by_key(|o| o.id);
        orders
    }
}
