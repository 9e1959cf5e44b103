//! Resolver configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Defaults applied to every resolution.
#[derive(Debug, Clone, Default)]
pub struct ResolverConfig {
    /// Search roots used by [`ResolverConfig::context`].
    pub search_roots: Vec<PathBuf>,

    /// Whether [`ResolverConfig::context`] enables the current-directory
    /// fallback.
    pub allow_current_dir: bool,

    /// Probing budget for contexts that carry no deadline of their own.
    pub probe_timeout: Option<Duration>,
}

impl ResolverConfig {
    /// Create a configuration with no search roots.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a search root.
    pub fn with_search_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.search_roots.push(root.into());
        self
    }

    /// Enable the current-directory fallback.
    pub fn with_current_dir(mut self, allow: bool) -> Self {
        self.allow_current_dir = allow;
        self
    }

    /// Bound probing time for contexts without a deadline.
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = Some(timeout);
        self
    }

    /// A resolution context carrying these defaults.
    pub fn context(&self) -> crate::ResolutionContext {
        crate::ResolutionContext::new()
            .with_search_roots(self.search_roots.iter().cloned())
            .with_current_dir_fallback(self.allow_current_dir)
    }
}
