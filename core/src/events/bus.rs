//! Process-wide error channel with explicit lifecycle.
//!
//! Handlers run synchronously inside `publish`, in publish order. The handler
//! list is copied before delivery so a handler may publish or unsubscribe
//! re-entrantly.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::mpsc;

use super::types::ErrorEvent;

type Handler = Arc<dyn Fn(&ErrorEvent) + Send + Sync>;

struct Subscriber {
    id: u64,
    active: Arc<AtomicBool>,
    handler: Handler,
}

struct BusInner {
    subscribers: Mutex<Vec<Subscriber>>,
    next_id: AtomicU64,
}

impl BusInner {
    fn remove(&self, id: u64) {
        let mut subs = match self.subscribers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        subs.retain(|s| s.id != id);
    }
}

/// Cheaply clonable handle; clones share subscribers.
#[derive(Clone)]
pub struct ErrorBus {
    inner: Arc<BusInner>,
}

impl ErrorBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                subscribers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Fire-and-forget delivery to every current subscriber.
    pub fn publish(&self, event: ErrorEvent) {
        let targets: Vec<(Arc<AtomicBool>, Handler)> = {
            let subs = match self.inner.subscribers.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            subs.iter()
                .map(|s| (s.active.clone(), s.handler.clone()))
                .collect()
        };

        tracing::debug!(
            target: "qualcode.events",
            stage = "events.publish",
            event_id = %event.id,
            status = event.status,
            path = %event.path,
            subscribers = targets.len()
        );

        for (active, handler) in targets {
            if active.load(Ordering::Acquire) {
                handler(&event);
            }
        }
    }

    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&ErrorEvent) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let active = Arc::new(AtomicBool::new(true));
        {
            let mut subs = match self.inner.subscribers.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            subs.push(Subscriber {
                id,
                active: active.clone(),
                handler: Arc::new(handler),
            });
        }
        Subscription {
            id,
            active,
            bus: Arc::downgrade(&self.inner),
            detached: false,
        }
    }

    /// Subscription that forwards events to an unbounded channel.
    pub fn subscribe_channel(&self) -> (Subscription, mpsc::UnboundedReceiver<ErrorEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sub = self.subscribe(move |event| {
            let _ = tx.send(event.clone());
        });
        (sub, rx)
    }

    pub fn subscriber_count(&self) -> usize {
        match self.inner.subscribers.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

impl Default for ErrorBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Capability returned by [`ErrorBus::subscribe`].
///
/// Once `unsubscribe` runs (or the value is dropped) the handler receives no
/// further events.
pub struct Subscription {
    id: u64,
    active: Arc<AtomicBool>,
    bus: Weak<BusInner>,
    detached: bool,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        self.release();
    }

    /// Keeps the handler registered for the lifetime of the bus.
    pub fn detach(mut self) {
        self.detached = true;
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn release(&mut self) {
        if self.detached {
            return;
        }
        if self.active.swap(false, Ordering::AcqRel) {
            if let Some(bus) = self.bus.upgrade() {
                bus.remove(self.id);
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}
