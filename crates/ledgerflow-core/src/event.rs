/*!
 * Event system for LedgerFlow.
 *
 * This module provides the in-process publish/subscribe bus that decouples
 * entity-mutating services from the automation rule engine. Listeners are
 * keyed by exact `(entity type, event)` pairs, with a second wildcard tier
 * that receives every event for an entity type.
 *
 * The bus is process-local and in-memory only; there is no persistence or
 * cross-process delivery.
 */
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use chrono::{DateTime, Utc};
use futures::future::{join_all, BoxFuture};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;
use crate::types::Entity;

/// An event envelope delivered to listeners.
///
/// Producers populate `entity` with the full current-state record and, for
/// update events, `previous_state` with the record as it was before the
/// mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationEvent {
    /// Entity type the event concerns (e.g. "transaction")
    pub entity_type: String,
    /// Event name (e.g. "created", "updated", "overspent")
    pub event: String,
    /// Identifier of the affected entity, when known
    pub entity_id: Option<String>,
    /// Full current-state record of the entity
    pub entity: Entity,
    /// Record state before the mutation, for update events
    pub previous_state: Option<Entity>,
    /// Workspace (tenant) the event belongs to
    pub workspace_id: String,
    /// When the event was emitted
    pub timestamp: DateTime<Utc>,
}

/// Payload supplied by producers when emitting an event
#[derive(Debug, Clone, Default)]
pub struct EventPayload {
    /// Identifier of the affected entity, when known
    pub entity_id: Option<String>,
    /// Full current-state record of the entity
    pub entity: Entity,
    /// Record state before the mutation, for update events
    pub previous_state: Option<Entity>,
    /// Workspace (tenant) the event belongs to
    pub workspace_id: String,
}

/// Boxed future returned by event listeners
pub type ListenerFuture = BoxFuture<'static, Result<()>>;

/// An event listener callback
pub type Listener = Arc<dyn Fn(AutomationEvent) -> ListenerFuture + Send + Sync>;

/// Wrap an async closure into a [`Listener`]
pub fn listener<F, Fut>(f: F) -> Listener
where
    F: Fn(AutomationEvent) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move |event| Box::pin(f(event)))
}

/// Where a listener is registered within the bus
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ListenerKey {
    /// Exact `(entity type, event)` match
    Specific(String, String),
    /// Every event for an entity type
    Wildcard(String),
}

struct ListenerEntry {
    id: u64,
    listener: Listener,
}

#[derive(Default)]
struct Registry {
    specific: HashMap<(String, String), Vec<ListenerEntry>>,
    wildcard: HashMap<String, Vec<ListenerEntry>>,
}

struct BusInner {
    registry: Mutex<Registry>,
    next_id: AtomicU64,
}

/// Event bus for publishing and subscribing to automation events.
///
/// Cloning the bus produces another handle to the same listener registry;
/// the composition root owns the bus and hands clones to producers and to
/// the rule engine registry.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    /// Create a new event bus
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                registry: Mutex::new(Registry::default()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Register a listener for an exact `(entity type, event)` pair
    pub fn on<S1, S2>(&self, entity_type: S1, event: S2, listener: Listener) -> Subscription
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        let key = ListenerKey::Specific(entity_type.into(), event.into());
        self.register(key, listener)
    }

    /// Register a listener for every event of an entity type
    pub fn on_all<S: Into<String>>(&self, entity_type: S, listener: Listener) -> Subscription {
        let key = ListenerKey::Wildcard(entity_type.into());
        self.register(key, listener)
    }

    fn register(&self, key: ListenerKey, listener: Listener) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let entry = ListenerEntry { id, listener };

        let mut registry = self.inner.registry.lock().expect("event registry poisoned");
        match &key {
            ListenerKey::Specific(entity_type, event) => {
                registry
                    .specific
                    .entry((entity_type.clone(), event.clone()))
                    .or_default()
                    .push(entry);
            }
            ListenerKey::Wildcard(entity_type) => {
                registry
                    .wildcard
                    .entry(entity_type.clone())
                    .or_default()
                    .push(entry);
            }
        }

        Subscription {
            bus: Arc::downgrade(&self.inner),
            key,
            id,
        }
    }

    /// Publish an event to all matching listeners.
    ///
    /// Every matching specific listener and every wildcard listener for the
    /// entity type is invoked concurrently. A failing or panicking listener
    /// is caught and logged; it never blocks the other listeners or the
    /// caller. The future resolves only after all listener invocations have
    /// settled.
    pub async fn emit<S1, S2>(&self, entity_type: S1, event: S2, payload: EventPayload)
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        let entity_type = entity_type.into();
        let event = event.into();

        let envelope = AutomationEvent {
            entity_type: entity_type.clone(),
            event: event.clone(),
            entity_id: payload.entity_id,
            entity: payload.entity,
            previous_state: payload.previous_state,
            workspace_id: payload.workspace_id,
            timestamp: Utc::now(),
        };

        let listeners = self.matching_listeners(&entity_type, &event);
        if listeners.is_empty() {
            debug!(entity_type = %entity_type, event = %event, "No listeners for event");
            return;
        }

        let handles: Vec<_> = listeners
            .into_iter()
            .map(|l| {
                let envelope = envelope.clone();
                tokio::spawn(async move { l(envelope).await })
            })
            .collect();

        for outcome in join_all(handles).await {
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(entity_type = %entity_type, event = %event, error = %e, "Event listener failed");
                }
                Err(e) => {
                    warn!(entity_type = %entity_type, event = %event, error = %e, "Event listener panicked");
                }
            }
        }
    }

    fn matching_listeners(&self, entity_type: &str, event: &str) -> Vec<Listener> {
        let registry = self.inner.registry.lock().expect("event registry poisoned");

        let mut listeners = Vec::new();
        let key = (entity_type.to_string(), event.to_string());
        if let Some(entries) = registry.specific.get(&key) {
            listeners.extend(entries.iter().map(|e| Arc::clone(&e.listener)));
        }
        if let Some(entries) = registry.wildcard.get(entity_type) {
            listeners.extend(entries.iter().map(|e| Arc::clone(&e.listener)));
        }

        listeners
    }

    /// Number of registered listeners, across both tiers
    pub fn listener_count(&self) -> usize {
        let registry = self.inner.registry.lock().expect("event registry poisoned");
        registry.specific.values().map(Vec::len).sum::<usize>()
            + registry.wildcard.values().map(Vec::len).sum::<usize>()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Handle for removing a registered listener.
///
/// Dropping the handle does NOT unsubscribe; teardown is explicit so that
/// listeners survive as long as their owner intends them to.
#[derive(Debug)]
pub struct Subscription {
    bus: Weak<BusInner>,
    key: ListenerKey,
    id: u64,
}

impl Subscription {
    /// Remove the listener from the bus.
    ///
    /// A no-op if the bus has already been dropped.
    pub fn unsubscribe(self) {
        let Some(inner) = self.bus.upgrade() else {
            return;
        };
        let mut registry = inner.registry.lock().expect("event registry poisoned");
        match &self.key {
            ListenerKey::Specific(entity_type, event) => {
                let key = (entity_type.clone(), event.clone());
                if let Some(entries) = registry.specific.get_mut(&key) {
                    entries.retain(|e| e.id != self.id);
                    if entries.is_empty() {
                        registry.specific.remove(&key);
                    }
                }
            }
            ListenerKey::Wildcard(entity_type) => {
                if let Some(entries) = registry.wildcard.get_mut(entity_type.as_str()) {
                    entries.retain(|e| e.id != self.id);
                    if entries.is_empty() {
                        registry.wildcard.remove(entity_type.as_str());
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::entity;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn payload(workspace: &str) -> EventPayload {
        EventPayload {
            entity_id: Some("tx-1".to_string()),
            entity: entity([("amount", -42)]),
            previous_state: None,
            workspace_id: workspace.to_string(),
        }
    }

    #[tokio::test]
    async fn test_specific_listener_receives_matching_event() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        bus.on(
            "transaction",
            "created",
            listener(move |event| {
                let counter = Arc::clone(&counter);
                async move {
                    assert_eq!(event.entity_type, "transaction");
                    assert_eq!(event.event, "created");
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }),
        );

        bus.emit("transaction", "created", payload("ws-1")).await;
        bus.emit("transaction", "deleted", payload("ws-1")).await;
        bus.emit("account", "created", payload("ws-1")).await;

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_wildcard_listener_receives_all_events_for_type() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        bus.on_all(
            "transaction",
            listener(move |_| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }),
        );

        bus.emit("transaction", "created", payload("ws-1")).await;
        bus.emit("transaction", "updated", payload("ws-1")).await;
        bus.emit("budget", "overspent", payload("ws-1")).await;

        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failing_listener_does_not_block_others() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));

        bus.on(
            "transaction",
            "created",
            listener(|_| async { Err(crate::error::Error::event("listener blew up")) }),
        );
        bus.on(
            "transaction",
            "created",
            listener(|_| async { panic!("listener panicked") }),
        );

        let counter = Arc::clone(&hits);
        bus.on(
            "transaction",
            "created",
            listener(move |_| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }),
        );

        // Resolves despite the failures, and the healthy listener ran.
        bus.emit("transaction", "created", payload("ws-1")).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        let sub = bus.on(
            "payee",
            "created",
            listener(move |_| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }),
        );

        bus.emit("payee", "created", payload("ws-1")).await;
        sub.unsubscribe();
        bus.emit("payee", "created", payload("ws-1")).await;

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(bus.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_emit_without_listeners_resolves() {
        let bus = EventBus::new();
        bus.emit("schedule", "due", payload("ws-1")).await;
    }

    #[tokio::test]
    async fn test_envelope_carries_payload_and_timestamp() {
        let bus = EventBus::new();
        let seen: Arc<Mutex<Option<AutomationEvent>>> = Arc::new(Mutex::new(None));

        let slot = Arc::clone(&seen);
        bus.on_all(
            "budget",
            listener(move |event| {
                let slot = Arc::clone(&slot);
                async move {
                    *slot.lock().unwrap() = Some(event);
                    Ok(())
                }
            }),
        );

        bus.emit("budget", "overspent", payload("ws-9")).await;

        let event = seen.lock().unwrap().take().expect("listener not invoked");
        assert_eq!(event.workspace_id, "ws-9");
        assert_eq!(event.entity_id.as_deref(), Some("tx-1"));
        assert!(event.timestamp <= Utc::now());
    }
}
