//! Warden Observability
//!
//! This crate provides observability for the Warden runtime core:
//!
//! - [`RuntimeEvent`]: Structured events for registration, resolution and
//!   authorization decisions
//! - [`EventDispatcher`]: Fan-out of events to subscribers
//! - [`RuntimeMetrics`]: Counters derived from the event stream
//!
//! # Event Subscription
//!
//! ```ignore
//! use warden_observe::{EventDispatcher, LoggingSubscriber, RuntimeMetrics};
//! use std::sync::Arc;
//!
//! let dispatcher = EventDispatcher::new();
//! let metrics = Arc::new(RuntimeMetrics::new());
//! dispatcher.subscribe(Arc::new(LoggingSubscriber::new()));
//! dispatcher.subscribe(metrics.clone());
//!
//! // ... resolve imports, invoke functions ...
//!
//! println!("{:?}", metrics.snapshot());
//! ```

pub mod events;
pub mod metrics;

// Re-export main types
pub use events::{
    CheckTarget, CollectingSubscriber, EventDispatcher, EventSubscriber, LoggingSubscriber,
    RuntimeEvent,
};
pub use metrics::{MetricsSnapshot, RuntimeMetrics};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::events::{EventDispatcher, EventSubscriber, RuntimeEvent};
    pub use crate::metrics::{MetricsSnapshot, RuntimeMetrics};
}
