//! Warden Capability Model
//!
//! This crate provides the capability model for the Warden scripting
//! runtime. Capabilities are explicit, opt-in permissions that gate both
//! importing a module and calling a bridged host function.
//!
//! # Capability-Based Security
//!
//! Warden uses a capability-based security model where:
//!
//! - All permissions must be explicitly granted (no ambient authority)
//! - Importing a module never grants the capabilities it requires
//! - Capabilities are plain `scope:resource` tokens compared by exact match
//! - Absence of a capability guarantees denial
//!
//! # Usage
//!
//! ```
//! use warden_capability::{authorize, Capability, CapabilitySet};
//!
//! let mut held = CapabilitySet::new();
//! let required = CapabilitySet::from_tokens(["execute:calculations"]).unwrap();
//!
//! assert!(authorize(&held, &required).is_err());
//!
//! held.grant(Capability::parse("execute:calculations").unwrap());
//! assert!(authorize(&held, &required).is_ok());
//! ```

pub mod capability;
pub mod context;
pub mod error;
pub mod set;

// Re-export main types
pub use capability::{Capability, standard};
pub use context::ContextId;
pub use error::{CapabilityError, CapabilityResult};
pub use set::{CapabilitySet, authorize};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::capability::Capability;
    pub use crate::context::ContextId;
    pub use crate::error::{CapabilityError, CapabilityResult};
    pub use crate::set::{CapabilitySet, authorize};
}
