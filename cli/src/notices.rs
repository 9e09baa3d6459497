//! Bounded list of error notices shown to the user.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use qualcode_core::api::{ErrorBus, ErrorEvent, ErrorOrigin, Subscription};

/// Keeps the newest `max_visible` notices. Older ones fall off; the bus itself
/// never drops anything.
#[derive(Clone)]
pub struct NoticeTray {
    max_visible: usize,
    items: Arc<Mutex<VecDeque<ErrorEvent>>>,
}

impl NoticeTray {
    pub fn new(max_visible: usize) -> Self {
        Self {
            max_visible: max_visible.max(1),
            items: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Subscribes the tray to `bus`; each new notice is also printed to stderr
    /// when `echo` is set.
    pub fn attach(&self, bus: &ErrorBus, echo: bool) -> Subscription {
        let tray = self.clone();
        bus.subscribe(move |event| {
            if echo {
                eprintln!("{}", render(event));
            }
            tray.push(event.clone());
        })
    }

    pub fn push(&self, event: ErrorEvent) {
        let mut items = match self.items.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        items.push_back(event);
        while items.len() > self.max_visible {
            items.pop_front();
        }
    }

    pub fn dismiss(&self, id: &str) -> bool {
        let mut items = match self.items.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        let before = items.len();
        items.retain(|e| e.id != id);
        items.len() != before
    }

    /// Oldest first.
    pub fn visible(&self) -> Vec<ErrorEvent> {
        match self.items.lock() {
            Ok(g) => g.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        }
    }
}

pub fn render(event: &ErrorEvent) -> String {
    let label = match event.origin {
        ErrorOrigin::Transport if event.is_connectivity() => "no connection",
        ErrorOrigin::Transport => "request failed",
        ErrorOrigin::ConnectionLost => "connection lost",
        ErrorOrigin::TaskReported => "task error",
        ErrorOrigin::DedupCheck => "dedup check failed",
    };
    if event.status == 0 {
        format!("[{label}] {} ({})", event.message, event.path)
    } else {
        format!("[{label}] {} {} ({})", event.status, event.message, event.path)
    }
}
