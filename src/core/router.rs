//! Per-kind event dispatch table.
//!
//! Handlers are registered once while the bridge is wired up. Routing an event
//! runs every handler registered for its kind, in registration order, and
//! concatenates the actions they return. Handlers get exclusive access to the
//! routing context, so all state they touch is mutated from a single place.

use std::collections::HashMap;

use super::events::{EventKind, InboundEvent};

/// A routed handler: inspects the event, may update the context and returns
/// the actions the owner should perform.
pub type Handler<C, A> = Box<dyn Fn(&mut C, &InboundEvent) -> Vec<A> + Send + Sync>;

/// Dispatch table keyed by [`EventKind`].
pub struct EventRouter<C, A> {
    handlers: HashMap<EventKind, Vec<Handler<C, A>>>,
}

impl<C, A> EventRouter<C, A> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler for one event kind.
    pub fn on<F>(&mut self, kind: EventKind, handler: F) -> &mut Self
    where
        F: Fn(&mut C, &InboundEvent) -> Vec<A> + Send + Sync + 'static,
    {
        self.handlers
            .entry(kind)
            .or_default()
            .push(Box::new(handler));
        self
    }

    /// Number of handlers registered for `kind`.
    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers.get(&kind).map_or(0, Vec::len)
    }

    /// Run every handler for the event's kind and collect their actions.
    pub fn route(&self, ctx: &mut C, event: &InboundEvent) -> Vec<A> {
        let Some(handlers) = self.handlers.get(&event.kind()) else {
            return Vec::new();
        };

        let mut actions = Vec::new();
        for handler in handlers {
            actions.extend(handler(ctx, event));
        }
        actions
    }
}

impl<C, A> Default for EventRouter<C, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C, A> std::fmt::Debug for EventRouter<C, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self
            .handlers
            .iter()
            .map(|(kind, handlers)| (kind.as_str(), handlers.len()))
            .collect();
        kinds.sort_unstable();
        f.debug_struct("EventRouter")
            .field("handlers", &kinds)
            .finish()
    }
}
