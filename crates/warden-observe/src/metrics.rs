//! Counters derived from runtime events.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::events::{EventSubscriber, RuntimeEvent};

/// Collects counters from the event stream.
///
/// Subscribe it to an [`EventDispatcher`](crate::EventDispatcher) and read a
/// [`MetricsSnapshot`] at any time.
#[derive(Default)]
pub struct RuntimeMetrics {
    modules_registered: AtomicU64,
    imports_resolved: AtomicU64,
    imports_cached: AtomicU64,
    imports_failed: AtomicU64,
    checks_allowed: AtomicU64,
    checks_denied: AtomicU64,
    calls_succeeded: AtomicU64,
    calls_failed: AtomicU64,
    call_counts: RwLock<BTreeMap<String, u64>>,
}

impl RuntimeMetrics {
    /// Create a new metrics collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a snapshot of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            modules_registered: self.modules_registered.load(Ordering::Relaxed),
            imports_resolved: self.imports_resolved.load(Ordering::Relaxed),
            imports_cached: self.imports_cached.load(Ordering::Relaxed),
            imports_failed: self.imports_failed.load(Ordering::Relaxed),
            checks_allowed: self.checks_allowed.load(Ordering::Relaxed),
            checks_denied: self.checks_denied.load(Ordering::Relaxed),
            calls_succeeded: self.calls_succeeded.load(Ordering::Relaxed),
            calls_failed: self.calls_failed.load(Ordering::Relaxed),
            call_counts: self.call_counts.read().clone(),
        }
    }

    /// Reset every counter to zero.
    pub fn reset(&self) {
        for counter in [
            &self.modules_registered,
            &self.imports_resolved,
            &self.imports_cached,
            &self.imports_failed,
            &self.checks_allowed,
            &self.checks_denied,
            &self.calls_succeeded,
            &self.calls_failed,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        self.call_counts.write().clear();
    }
}

impl EventSubscriber for RuntimeMetrics {
    fn on_event(&self, event: &RuntimeEvent) {
        match event {
            RuntimeEvent::ModuleRegistered { .. } => {
                self.modules_registered.fetch_add(1, Ordering::Relaxed);
            }
            RuntimeEvent::ImportResolved { cached, .. } => {
                self.imports_resolved.fetch_add(1, Ordering::Relaxed);
                if *cached {
                    self.imports_cached.fetch_add(1, Ordering::Relaxed);
                }
            }
            RuntimeEvent::ImportFailed { .. } => {
                self.imports_failed.fetch_add(1, Ordering::Relaxed);
            }
            RuntimeEvent::CapabilityChecked { permitted, .. } => {
                let counter = if *permitted {
                    &self.checks_allowed
                } else {
                    &self.checks_denied
                };
                counter.fetch_add(1, Ordering::Relaxed);
            }
            RuntimeEvent::FunctionInvoked {
                module,
                function,
                success,
                ..
            } => {
                let counter = if *success {
                    &self.calls_succeeded
                } else {
                    &self.calls_failed
                };
                counter.fetch_add(1, Ordering::Relaxed);
                *self
                    .call_counts
                    .write()
                    .entry(format!("{}.{}", module, function))
                    .or_insert(0) += 1;
            }
            RuntimeEvent::RegistrySealed { .. }
            | RuntimeEvent::CapabilityGranted { .. }
            | RuntimeEvent::CapabilityRevoked { .. } => {}
        }
    }
}

impl std::fmt::Debug for RuntimeMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("RuntimeMetrics").field(&self.snapshot()).finish()
    }
}

/// Point-in-time copy of [`RuntimeMetrics`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Modules registered.
    pub modules_registered: u64,
    /// Imports resolved, including cache hits.
    pub imports_resolved: u64,
    /// Imports served from the resolution cache.
    pub imports_cached: u64,
    /// Imports that failed.
    pub imports_failed: u64,
    /// Authorization checks that passed.
    pub checks_allowed: u64,
    /// Authorization checks that were denied.
    pub checks_denied: u64,
    /// Bridged calls whose implementation returned successfully.
    pub calls_succeeded: u64,
    /// Bridged calls whose implementation failed.
    pub calls_failed: u64,
    /// Per-function call counts, keyed by `module.function`.
    pub call_counts: BTreeMap<String, u64>,
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use warden_capability::ContextId;

    use super::*;
    use crate::events::CheckTarget;

    #[test]
    fn test_counts_events() {
        let metrics = RuntimeMetrics::new();

        metrics.on_event(&RuntimeEvent::ImportResolved {
            path: "math".to_string(),
            source: "stdlib".to_string(),
            cached: false,
        });
        metrics.on_event(&RuntimeEvent::ImportResolved {
            path: "math".to_string(),
            source: "stdlib".to_string(),
            cached: true,
        });
        metrics.on_event(&RuntimeEvent::CapabilityChecked {
            context: ContextId::new(),
            target: CheckTarget::Import {
                module: "time".to_string(),
            },
            permitted: false,
            missing: Vec::new(),
        });
        for _ in 0..2 {
            metrics.on_event(&RuntimeEvent::FunctionInvoked {
                module: "math".to_string(),
                function: "sqrt".to_string(),
                duration: Duration::from_micros(3),
                success: true,
            });
        }

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.imports_resolved, 2);
        assert_eq!(snapshot.imports_cached, 1);
        assert_eq!(snapshot.checks_denied, 1);
        assert_eq!(snapshot.calls_succeeded, 2);
        assert_eq!(snapshot.call_counts.get("math.sqrt"), Some(&2));
    }

    #[test]
    fn test_reset() {
        let metrics = RuntimeMetrics::new();
        metrics.on_event(&RuntimeEvent::ImportFailed {
            path: "x".to_string(),
            reason: "not found".to_string(),
        });
        metrics.reset();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }
}
