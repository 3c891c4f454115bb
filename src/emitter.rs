//! Subscription registry with per-channel dispatch and fault isolation
//!
//! Three channels: `entity`, `remove`, `diagnostic`. Handlers run
//! synchronously in registration order; by the time an emit call returns,
//! every handler has been invoked. A panicking handler never starves the
//! others: the panic is caught and surfaced as an error diagnostic, and
//! panics from diagnostic handlers themselves are swallowed so a faulty
//! diagnostic consumer cannot recurse.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Mutex;

use tracing::debug;

use crate::types::{DiagnosticEvent, EntityEvent, RemoveEvent};

/// Handle returned from a subscription, used to unsubscribe
pub type SubscriptionId = u64;

/// The three event channels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventChannel {
    Entity,
    Remove,
    Diagnostic,
}

type Handler<E> = Box<dyn FnMut(&E) + Send>;

struct Channel<E> {
    handlers: Vec<(SubscriptionId, Handler<E>)>,
}

impl<E> Channel<E> {
    fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    fn remove(&mut self, id: SubscriptionId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(handler_id, _)| *handler_id != id);
        self.handlers.len() != before
    }

    /// Invoke every handler in registration order, collecting panic messages
    fn dispatch(&mut self, event: &E) -> Vec<String> {
        let mut panics = Vec::new();
        for (_, handler) in self.handlers.iter_mut() {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| handler(event))) {
                panics.push(panic_message(payload));
            }
        }
        panics
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

struct Inner {
    entity: Channel<EntityEvent>,
    remove: Channel<RemoveEvent>,
    diagnostic: Channel<DiagnosticEvent>,
    next_id: SubscriptionId,
}

/// Event emitter for the three recognizer channels
pub struct Emitter {
    inner: Mutex<Inner>,
}

impl Emitter {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                entity: Channel::new(),
                remove: Channel::new(),
                diagnostic: Channel::new(),
                next_id: 1,
            }),
        }
    }

    pub fn on_entity(&self, handler: impl FnMut(&EntityEvent) + Send + 'static) -> SubscriptionId {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.entity.handlers.push((id, Box::new(handler)));
        id
    }

    pub fn on_remove(&self, handler: impl FnMut(&RemoveEvent) + Send + 'static) -> SubscriptionId {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.remove.handlers.push((id, Box::new(handler)));
        id
    }

    pub fn on_diagnostic(
        &self,
        handler: impl FnMut(&DiagnosticEvent) + Send + 'static,
    ) -> SubscriptionId {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.diagnostic.handlers.push((id, Box::new(handler)));
        id
    }

    pub fn off_entity(&self, id: SubscriptionId) -> bool {
        self.inner.lock().unwrap().entity.remove(id)
    }

    pub fn off_remove(&self, id: SubscriptionId) -> bool {
        self.inner.lock().unwrap().remove.remove(id)
    }

    pub fn off_diagnostic(&self, id: SubscriptionId) -> bool {
        self.inner.lock().unwrap().diagnostic.remove(id)
    }

    pub fn emit_entity(&self, event: &EntityEvent) {
        let mut inner = self.inner.lock().unwrap();
        let panics = inner.entity.dispatch(event);
        Self::report_handler_panics(&mut inner, "entity", panics);
    }

    pub fn emit_remove(&self, event: &RemoveEvent) {
        let mut inner = self.inner.lock().unwrap();
        let panics = inner.remove.dispatch(event);
        Self::report_handler_panics(&mut inner, "remove", panics);
    }

    pub fn emit_diagnostic(&self, event: &DiagnosticEvent) {
        let mut inner = self.inner.lock().unwrap();
        let panics = inner.diagnostic.dispatch(event);
        for message in panics {
            debug!(%message, "diagnostic handler panicked; swallowed");
        }
    }

    /// Convert handler panics from a non-diagnostic channel into error
    /// diagnostics and deliver them
    fn report_handler_panics(inner: &mut Inner, channel: &str, panics: Vec<String>) {
        for message in panics {
            let event = DiagnosticEvent::error(format!("{channel} handler panicked: {message}"))
                .with_source("emitter");
            let swallowed = inner.diagnostic.dispatch(&event);
            for message in swallowed {
                debug!(%message, "diagnostic handler panicked; swallowed");
            }
        }
    }

    pub fn listener_count(&self, channel: EventChannel) -> usize {
        let inner = self.inner.lock().unwrap();
        match channel {
            EventChannel::Entity => inner.entity.handlers.len(),
            EventChannel::Remove => inner.remove.handlers.len(),
            EventChannel::Diagnostic => inner.diagnostic.handlers.len(),
        }
    }

    /// Drop listeners on one channel, or on all channels when `None`
    pub fn remove_all(&self, channel: Option<EventChannel>) {
        let mut inner = self.inner.lock().unwrap();
        match channel {
            Some(EventChannel::Entity) => inner.entity.handlers.clear(),
            Some(EventChannel::Remove) => inner.remove.handlers.clear(),
            Some(EventChannel::Diagnostic) => inner.diagnostic.handlers.clear(),
            None => {
                inner.entity.handlers.clear();
                inner.remove.handlers.clear();
                inner.diagnostic.handlers.clear();
            }
        }
    }
}

impl Default for Emitter {
    fn default() -> Self {
        Self::new()
    }
}
