//! Observable events emitted by the registry, resolver and authorization gate.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::Serialize;

use warden_capability::{Capability, ContextId};

/// What an authorization check was guarding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CheckTarget {
    /// Importing a module.
    Import {
        /// Module name.
        module: String,
    },
    /// Calling a bridged function.
    Call {
        /// Module name.
        module: String,
        /// Function name.
        function: String,
    },
}

impl std::fmt::Display for CheckTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckTarget::Import { module } => write!(f, "import {}", module),
            CheckTarget::Call { module, function } => write!(f, "call {}.{}", module, function),
        }
    }
}

/// Events that can be observed while the runtime core is in use.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RuntimeEvent {
    /// A module was added to a registry.
    ModuleRegistered {
        /// Module name.
        name: String,
        /// Module version.
        version: String,
        /// Number of members.
        members: usize,
    },
    /// A registry was sealed.
    RegistrySealed {
        /// Number of modules at sealing time.
        modules: usize,
    },
    /// An import resolved.
    ImportResolved {
        /// Dotted import path.
        path: String,
        /// Where the module came from.
        source: String,
        /// Whether the result was served from the resolution cache.
        cached: bool,
    },
    /// An import failed to resolve.
    ImportFailed {
        /// Dotted import path.
        path: String,
        /// Error message.
        reason: String,
    },
    /// An authorization decision was made.
    CapabilityChecked {
        /// The context whose capabilities were checked.
        context: ContextId,
        /// What was being authorized.
        target: CheckTarget,
        /// Whether it was permitted.
        permitted: bool,
        /// Capabilities that were required but not held.
        missing: Vec<Capability>,
    },
    /// A capability was granted to a context.
    CapabilityGranted {
        /// The context.
        context: ContextId,
        /// The capability.
        capability: Capability,
    },
    /// A capability was revoked from a context.
    CapabilityRevoked {
        /// The context.
        context: ContextId,
        /// The capability.
        capability: Capability,
    },
    /// A bridged function ran (after authorization passed).
    FunctionInvoked {
        /// Module name.
        module: String,
        /// Function name.
        function: String,
        /// Call duration.
        #[serde(with = "duration_micros")]
        duration: Duration,
        /// Whether the implementation returned successfully.
        success: bool,
    },
}

impl RuntimeEvent {
    /// Get the event type name.
    pub fn event_type(&self) -> &'static str {
        match self {
            RuntimeEvent::ModuleRegistered { .. } => "module_registered",
            RuntimeEvent::RegistrySealed { .. } => "registry_sealed",
            RuntimeEvent::ImportResolved { .. } => "import_resolved",
            RuntimeEvent::ImportFailed { .. } => "import_failed",
            RuntimeEvent::CapabilityChecked { .. } => "capability_checked",
            RuntimeEvent::CapabilityGranted { .. } => "capability_granted",
            RuntimeEvent::CapabilityRevoked { .. } => "capability_revoked",
            RuntimeEvent::FunctionInvoked { .. } => "function_invoked",
        }
    }
}

mod duration_micros {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_micros() as u64)
    }
}

/// Subscriber for runtime events.
pub trait EventSubscriber: Send + Sync {
    /// Called when an event occurs.
    fn on_event(&self, event: &RuntimeEvent);

    /// Filter for event types this subscriber is interested in.
    /// Returns `None` to receive all events.
    fn event_filter(&self) -> Option<Vec<&'static str>> {
        None
    }
}

/// A subscriber that forwards events to `tracing`.
pub struct LoggingSubscriber;

impl LoggingSubscriber {
    /// Create a new logging subscriber.
    pub fn new() -> Self {
        Self
    }
}

impl Default for LoggingSubscriber {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSubscriber for LoggingSubscriber {
    fn on_event(&self, event: &RuntimeEvent) {
        match event {
            RuntimeEvent::ModuleRegistered { name, version, members } => {
                tracing::debug!(
                    event = "module_registered",
                    name = name,
                    version = version,
                    members = members,
                    "Module registered"
                );
            }
            RuntimeEvent::RegistrySealed { modules } => {
                tracing::info!(event = "registry_sealed", modules = modules, "Registry sealed");
            }
            RuntimeEvent::ImportResolved { path, source, cached } => {
                tracing::debug!(
                    event = "import_resolved",
                    path = path,
                    source = source,
                    cached = cached,
                    "Import resolved"
                );
            }
            RuntimeEvent::ImportFailed { path, reason } => {
                tracing::warn!(event = "import_failed", path = path, reason = reason, "Import failed");
            }
            RuntimeEvent::CapabilityChecked {
                context,
                target,
                permitted,
                missing,
            } => {
                if *permitted {
                    tracing::trace!(
                        event = "capability_checked",
                        context = %context,
                        target = %target,
                        "Capability check passed"
                    );
                } else {
                    tracing::warn!(
                        event = "capability_checked",
                        context = %context,
                        target = %target,
                        missing = ?missing,
                        "Capability check failed"
                    );
                }
            }
            RuntimeEvent::CapabilityGranted { context, capability } => {
                tracing::info!(
                    event = "capability_granted",
                    context = %context,
                    capability = %capability,
                    "Capability granted"
                );
            }
            RuntimeEvent::CapabilityRevoked { context, capability } => {
                tracing::info!(
                    event = "capability_revoked",
                    context = %context,
                    capability = %capability,
                    "Capability revoked"
                );
            }
            RuntimeEvent::FunctionInvoked {
                module,
                function,
                duration,
                success,
            } => {
                tracing::trace!(
                    event = "function_invoked",
                    module = module,
                    function = function,
                    duration_us = duration.as_micros(),
                    success = success,
                    "Function invoked"
                );
            }
        }
    }
}

/// A subscriber that collects events for later analysis.
pub struct CollectingSubscriber {
    events: RwLock<Vec<(Instant, RuntimeEvent)>>,
    max_events: usize,
}

impl CollectingSubscriber {
    /// Create a new collecting subscriber.
    pub fn new(max_events: usize) -> Self {
        Self {
            events: RwLock::new(Vec::new()),
            max_events,
        }
    }

    /// Get collected events.
    pub fn events(&self) -> Vec<(Instant, RuntimeEvent)> {
        self.events.read().clone()
    }

    /// Get collected events of one type.
    pub fn events_of(&self, event_type: &str) -> Vec<RuntimeEvent> {
        self.events
            .read()
            .iter()
            .filter(|(_, e)| e.event_type() == event_type)
            .map(|(_, e)| e.clone())
            .collect()
    }

    /// Clear collected events.
    pub fn clear(&self) {
        self.events.write().clear();
    }

    /// Get event count.
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }
}

impl EventSubscriber for CollectingSubscriber {
    fn on_event(&self, event: &RuntimeEvent) {
        let mut events = self.events.write();
        if events.len() < self.max_events {
            events.push((Instant::now(), event.clone()));
        }
    }
}

/// Event dispatcher that manages subscribers.
#[derive(Default)]
pub struct EventDispatcher {
    subscribers: RwLock<Vec<Arc<dyn EventSubscriber>>>,
}

impl EventDispatcher {
    /// Create a new event dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber.
    pub fn subscribe(&self, subscriber: Arc<dyn EventSubscriber>) {
        self.subscribers.write().push(subscriber);
    }

    /// Remove all subscribers.
    pub fn clear_subscribers(&self) {
        self.subscribers.write().clear();
    }

    /// Get subscriber count.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Emit an event to all subscribers.
    pub fn emit(&self, event: RuntimeEvent) {
        let subscribers = self.subscribers.read();
        for subscriber in subscribers.iter() {
            if let Some(filter) = subscriber.event_filter() {
                if !filter.contains(&event.event_type()) {
                    continue;
                }
            }
            subscriber.on_event(&event);
        }
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}
