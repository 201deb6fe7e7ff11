//! Typed listener registry.
//!
//! Each topic keeps its own insertion-ordered list of listeners. Delivery is
//! synchronous, in registration order, and isolated: a listener that returns
//! an error or panics is logged and skipped.

use po3_core::*;
use std::fmt;
use std::marker::PhantomData;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::warn;

pub type ListenerResult = Result<(), ListenerError>;

type Listener<E> = Arc<dyn Fn(&E) -> ListenerResult + Send + Sync>;

/// An event payload with its own listener list.
pub trait Topic: Sized + Send + Sync + 'static {
    /// Public event name.
    const NAME: &'static str;

    fn registry(bus: &EventBus) -> &Registry<Self>;
}

impl Topic for AccountUpdate {
    const NAME: &'static str = "account_update";

    fn registry(bus: &EventBus) -> &Registry<Self> {
        &bus.accounts
    }
}

impl Topic for PositionsUpdate {
    const NAME: &'static str = "positions_update";

    fn registry(bus: &EventBus) -> &Registry<Self> {
        &bus.positions
    }
}

impl Topic for OrdersUpdate {
    const NAME: &'static str = "orders_update";

    fn registry(bus: &EventBus) -> &Registry<Self> {
        &bus.orders
    }
}

impl Topic for MarketDataUpdate {
    const NAME: &'static str = "market_data_update";

    fn registry(bus: &EventBus) -> &Registry<Self> {
        &bus.market_data
    }
}

impl Topic for StreamFault {
    const NAME: &'static str = "stream_fault";

    fn registry(bus: &EventBus) -> &Registry<Self> {
        &bus.faults
    }
}

/// Handle returned by [`EventBus::subscribe`], bound to the topic it was
/// registered on.
pub struct Subscription<E> {
    id: u64,
    _topic: PhantomData<fn(&E)>,
}

impl<E> Subscription<E> {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl<E> Clone for Subscription<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for Subscription<E> {}

impl<E> PartialEq for Subscription<E> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<E> Eq for Subscription<E> {}

impl<E: Topic> fmt::Debug for Subscription<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Subscription({}#{})", E::NAME, self.id)
    }
}

/// Listeners registered for one topic.
pub struct Registry<E> {
    listeners: RwLock<Vec<(u64, Listener<E>)>>,
}

impl<E> Default for Registry<E> {
    fn default() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
        }
    }
}

impl<E> Registry<E> {
    fn snapshot(&self) -> Vec<(u64, Listener<E>)> {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn push(&self, id: u64, listener: Listener<E>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, listener));
    }

    fn remove(&self, id: u64) -> bool {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        match listeners.iter().position(|(existing, _)| *existing == id) {
            Some(index) => {
                listeners.remove(index);
                true
            }
            None => false,
        }
    }

    fn len(&self) -> usize {
        self.listeners.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Outcome of one publish.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Default)]
pub struct EventBus {
    next_id: AtomicU64,
    accounts: Registry<AccountUpdate>,
    positions: Registry<PositionsUpdate>,
    orders: Registry<OrdersUpdate>,
    market_data: Registry<MarketDataUpdate>,
    faults: Registry<StreamFault>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<E, F>(&self, listener: F) -> Subscription<E>
    where
        E: Topic,
        F: Fn(&E) -> ListenerResult + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        E::registry(self).push(id, Arc::new(listener));
        Subscription {
            id,
            _topic: PhantomData,
        }
    }

    /// Remove a listener. Returns false if it was already gone.
    pub fn unsubscribe<E: Topic>(&self, subscription: Subscription<E>) -> bool {
        E::registry(self).remove(subscription.id)
    }

    pub fn listener_count<E: Topic>(&self) -> usize {
        E::registry(self).len()
    }

    /// Deliver `event` to every listener of its topic.
    ///
    /// Listeners run on the caller's task against a snapshot of the list, so
    /// a listener may subscribe or unsubscribe without deadlocking.
    pub fn publish<E: Topic>(&self, event: &E) -> Delivery {
        let mut delivery = Delivery::default();
        for (id, listener) in E::registry(self).snapshot() {
            match catch_unwind(AssertUnwindSafe(|| listener(event))) {
                Ok(Ok(())) => delivery.delivered += 1,
                Ok(Err(e)) => {
                    warn!(event = E::NAME, subscription = id, "Listener failed: {}", e);
                    delivery.failed += 1;
                }
                Err(_) => {
                    warn!(event = E::NAME, subscription = id, "Listener panicked");
                    delivery.failed += 1;
                }
            }
        }
        delivery
    }
}
