//! Capability set management.
//!
//! This module provides the `CapabilitySet` type, which holds the
//! capabilities granted to one execution context, and [`authorize`], the
//! subset check every import and call goes through.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::capability::Capability;
use crate::error::{CapabilityError, CapabilityResult};

/// A set of capabilities held by one execution context.
///
/// Grants and revocations are idempotent: granting an already-held
/// capability or revoking an absent one changes nothing and is not an error.
///
/// # Example
///
/// ```
/// use warden_capability::{Capability, CapabilitySet};
///
/// let mut set = CapabilitySet::new();
/// let cap = Capability::parse("execute:calculations").unwrap();
///
/// set.grant(cap.clone());
/// assert!(set.has(&cap));
///
/// set.revoke(&cap);
/// assert!(!set.has(&cap));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilitySet {
    inner: BTreeSet<Capability>,
}

impl CapabilitySet {
    /// Create an empty capability set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a list of tokens into a set.
    ///
    /// # Errors
    ///
    /// Returns the first malformed token encountered.
    pub fn from_tokens<I, S>(tokens: I) -> CapabilityResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::new();
        for token in tokens {
            set.grant(token.as_ref().parse()?);
        }
        Ok(set)
    }

    /// Grant a capability. Returns `true` if it was not already held.
    pub fn grant(&mut self, capability: Capability) -> bool {
        let id = capability.to_string();
        let added = self.inner.insert(capability);
        if added {
            info!(capability = %id, "Capability granted");
        } else {
            debug!(capability = %id, "Capability already held");
        }
        added
    }

    /// Revoke a capability. Returns `true` if it was held.
    pub fn revoke(&mut self, capability: &Capability) -> bool {
        let removed = self.inner.remove(capability);
        if removed {
            info!(capability = %capability, "Capability revoked");
        } else {
            debug!(capability = %capability, "Capability was not held");
        }
        removed
    }

    /// Check if a capability is held.
    pub fn has(&self, capability: &Capability) -> bool {
        self.inner.contains(capability)
    }

    /// The capabilities in `required` that this set does not hold.
    pub fn missing<'a, I>(&self, required: I) -> BTreeSet<Capability>
    where
        I: IntoIterator<Item = &'a Capability>,
    {
        required
            .into_iter()
            .filter(|cap| !self.inner.contains(*cap))
            .cloned()
            .collect()
    }

    /// Check whether every capability in `required` is held.
    pub fn contains_all<'a, I>(&self, required: I) -> bool
    where
        I: IntoIterator<Item = &'a Capability>,
    {
        required.into_iter().all(|cap| self.inner.contains(cap))
    }

    /// Get the number of capabilities in the set.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Check if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Iterate over the capabilities in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &Capability> {
        self.inner.iter()
    }

    /// Remove every capability.
    pub fn clear(&mut self) {
        self.inner.clear();
        info!("Capability set cleared");
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<T: IntoIterator<Item = Capability>>(iter: T) -> Self {
        Self {
            inner: iter.into_iter().collect(),
        }
    }
}

impl Extend<Capability> for CapabilitySet {
    fn extend<T: IntoIterator<Item = Capability>>(&mut self, iter: T) {
        self.inner.extend(iter);
    }
}

impl<'a> IntoIterator for &'a CapabilitySet {
    type Item = &'a Capability;
    type IntoIter = std::collections::btree_set::Iter<'a, Capability>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.iter()
    }
}

/// Decide whether `held` satisfies `required`.
///
/// Succeeds iff `required ⊆ held`. On failure the error carries exactly
/// `required − held`. The decision depends on nothing but its two inputs.
pub fn authorize(held: &CapabilitySet, required: &CapabilitySet) -> CapabilityResult<()> {
    let missing = held.missing(required);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(CapabilityError::Missing { missing })
    }
}
