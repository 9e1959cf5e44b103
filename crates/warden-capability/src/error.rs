//! Error types for the capability system.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::capability::Capability;
use crate::context::ContextId;

/// Errors related to capabilities.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CapabilityError {
    /// The caller lacks one or more required capabilities.
    #[error("Missing capabilities: {}", join(.missing))]
    Missing {
        /// Exactly the required capabilities that are not held.
        missing: BTreeSet<Capability>,
    },

    /// A capability token does not match the `scope:resource` grammar.
    #[error("Invalid capability token '{token}': {reason}")]
    InvalidToken {
        /// The offending token.
        token: String,
        /// Why it was rejected.
        reason: String,
    },

    /// No execution context exists with this ID.
    #[error("Unknown execution context: {0}")]
    UnknownContext(ContextId),
}

impl CapabilityError {
    /// The missing capabilities, if this is a denial.
    pub fn missing(&self) -> Option<&BTreeSet<Capability>> {
        match self {
            CapabilityError::Missing { missing } => Some(missing),
            _ => None,
        }
    }
}

fn join(set: &BTreeSet<Capability>) -> String {
    set.iter()
        .map(Capability::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type for capability operations.
pub type CapabilityResult<T> = std::result::Result<T, CapabilityError>;
