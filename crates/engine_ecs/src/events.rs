//! Synchronous publish/subscribe dispatch keyed by event identifier.
//!
//! The bus is generic over the context its listeners receive, so a listener
//! can mutate the world, subscribe more listeners or publish nested events
//! while it runs. Dispatch is depth-first: a nested publish completes before
//! the outer one moves to its next listener.

use std::collections::HashMap;
use std::rc::Rc;

use serde_json::Value;
use tracing::{trace, warn};

use crate::error::EngineError;

/// Default limit on nested publishes.
pub const DEFAULT_MAX_EVENT_DEPTH: usize = 64;

/// A listener callback. Receives the context and the payload, which it may
/// edit for the listeners after it.
pub type Listener<C> = Rc<dyn Fn(&mut C, &mut Value) -> anyhow::Result<()>>;

/// Identifies one subscription for later removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

struct Subscription<C> {
    id: SubscriptionId,
    listener: Listener<C>,
}

/// A listener that returned an error during a publish.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriberFailure {
    pub subscription: SubscriptionId,
    pub error: String,
}

/// Outcome of one publish.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishReport {
    pub event: String,
    /// Listeners that ran to completion.
    pub delivered: usize,
    pub failures: Vec<SubscriberFailure>,
}

impl PublishReport {
    /// Whether every listener succeeded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Listener table plus the nesting counter.
pub struct EventBus<C> {
    listeners: HashMap<String, Vec<Subscription<C>>>,
    next_id: u64,
    depth: usize,
    max_depth: usize,
}

impl<C> std::fmt::Debug for EventBus<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("events", &self.listeners.len())
            .field("subscriptions", &self.subscription_count())
            .field("depth", &self.depth)
            .field("max_depth", &self.max_depth)
            .finish()
    }
}

impl<C> Default for EventBus<C> {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_EVENT_DEPTH)
    }
}

impl<C> EventBus<C> {
    /// An empty bus that refuses publishes nested deeper than `max_depth`.
    #[must_use]
    pub fn new(max_depth: usize) -> Self {
        Self {
            listeners: HashMap::new(),
            next_id: 1,
            depth: 0,
            max_depth,
        }
    }

    /// Append a listener for `event`. Listeners run in subscription order.
    pub fn subscribe(
        &mut self,
        event: &str,
        listener: impl Fn(&mut C, &mut Value) -> anyhow::Result<()> + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners
            .entry(event.to_string())
            .or_default()
            .push(Subscription {
                id,
                listener: Rc::new(listener),
            });
        trace!(event, subscription = %id, "subscribed");
        id
    }

    /// Remove a subscription. Returns `false` if it was not present.
    ///
    /// A publish already in progress still calls the removed listener.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let mut removed = false;
        self.listeners.retain(|_, subs| {
            let before = subs.len();
            subs.retain(|sub| sub.id != id);
            removed |= subs.len() != before;
            !subs.is_empty()
        });
        removed
    }

    /// Number of listeners subscribed to `event`.
    #[must_use]
    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.get(event).map_or(0, Vec::len)
    }

    /// Number of live subscriptions across all events.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.listeners.values().map(Vec::len).sum()
    }

    /// Current nesting level; zero outside any publish.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// The nesting limit.
    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    fn snapshot(&self, event: &str) -> Vec<(SubscriptionId, Listener<C>)> {
        self.listeners.get(event).map_or_else(Vec::new, |subs| {
            subs.iter()
                .map(|sub| (sub.id, Rc::clone(&sub.listener)))
                .collect()
        })
    }
}

/// Something that owns an [`EventBus`] whose listeners receive it.
pub trait EventContext: Sized {
    fn event_bus(&mut self) -> &mut EventBus<Self>;
}

/// Deliver `payload` to every listener subscribed to `event` when the call
/// begins.
///
/// Listener errors are logged and collected in the report; the remaining
/// listeners still run. Fails only when the nesting limit is reached, in
/// which case no listener is called.
pub fn publish<C: EventContext>(
    ctx: &mut C,
    event: &str,
    payload: &mut Value,
) -> Result<PublishReport, EngineError> {
    let bus = ctx.event_bus();
    if bus.depth >= bus.max_depth {
        warn!(event, limit = bus.max_depth, "event depth limit reached");
        return Err(EngineError::ReentrancyLimitExceeded {
            event: event.to_string(),
            limit: bus.max_depth,
        });
    }
    let listeners = bus.snapshot(event);
    bus.depth += 1;
    let depth = bus.depth;

    let mut report = PublishReport {
        event: event.to_string(),
        delivered: 0,
        failures: Vec::new(),
    };
    for (subscription, listener) in listeners {
        match listener(ctx, payload) {
            Ok(()) => report.delivered += 1,
            Err(err) => {
                warn!(event, %subscription, depth, error = %err, "event listener failed");
                report.failures.push(SubscriberFailure {
                    subscription,
                    error: format!("{err:#}"),
                });
            }
        }
    }

    ctx.event_bus().depth -= 1;
    trace!(event, depth, delivered = report.delivered, "published event");
    Ok(report)
}
