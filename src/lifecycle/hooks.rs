/*!
 * Restart Hooks
 * Fan-out of restart notifications to collaborators such as a UI layer
 */

use crate::process::{RestartCallback, RestartEvent};
use parking_lot::RwLock;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, trace};

/// Buffered events per broadcast subscriber before the slowest one lags
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Registry of restart callbacks plus a broadcast channel of events
pub struct RestartHooks {
    callbacks: RwLock<Vec<RestartCallback>>,
    events: broadcast::Sender<RestartEvent>,
}

impl RestartHooks {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            callbacks: RwLock::new(Vec::new()),
            events,
        }
    }

    /// Add a callback; it sees every restart from now on
    pub fn register<F>(&self, callback: F)
    where
        F: Fn(&RestartEvent) + Send + Sync + 'static,
    {
        self.callbacks.write().push(Arc::new(callback));
    }

    /// Receive restart events asynchronously
    pub fn subscribe(&self) -> broadcast::Receiver<RestartEvent> {
        self.events.subscribe()
    }

    pub fn len(&self) -> usize {
        self.callbacks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.read().is_empty()
    }

    /// Deliver one event to every callback and subscriber
    ///
    /// A panicking callback is logged and skipped; later callbacks and the
    /// broadcast still see the event.
    pub fn dispatch(&self, event: &RestartEvent) {
        // Snapshot so a callback may register further hooks
        let callbacks = self.callbacks.read().clone();
        for (index, callback) in callbacks.iter().enumerate() {
            if catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
                error!(subprogram = %event.name, hook = index, "Restart hook panicked");
            }
        }

        // No subscribers is fine
        let delivered = self.events.send(event.clone()).unwrap_or(0);
        trace!(
            subprogram = %event.name,
            callbacks = callbacks.len(),
            subscribers = delivered,
            "Restart event dispatched"
        );
    }

    /// Adapter handed to supervisors
    pub fn as_callback(self: &Arc<Self>) -> RestartCallback {
        let hooks = Arc::clone(self);
        Arc::new(move |event: &RestartEvent| hooks.dispatch(event))
    }
}

impl Default for RestartHooks {
    fn default() -> Self {
        Self::new()
    }
}
