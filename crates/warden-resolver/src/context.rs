//! Per-request resolution context.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// A shared flag the host can set to abandon an in-flight resolution.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Check whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Where an import is being resolved from and which locations it may use.
///
/// Two contexts with the same search roots and the same current-directory
/// fallback share cache entries; the requesting file, deadline and
/// cancellation token do not affect the result.
#[derive(Debug, Clone, Default)]
pub struct ResolutionContext {
    /// File containing the import statement, for diagnostics.
    pub requesting_file: Option<PathBuf>,
    /// Permitted user search roots, in priority order.
    pub search_roots: Vec<PathBuf>,
    /// Whether the current directory may be probed after the search roots.
    pub allow_current_dir: bool,
    /// Directory used as the current directory. Defaults to the process's.
    pub current_dir: Option<PathBuf>,
    /// Stop probing after this instant.
    pub deadline: Option<Instant>,
    /// Stop probing once cancelled.
    pub cancellation: Option<CancellationToken>,
}

impl ResolutionContext {
    /// Create a context with no search roots and no current-directory
    /// fallback. Only registered modules resolve.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the requesting file.
    pub fn with_requesting_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.requesting_file = Some(file.into());
        self
    }

    /// Append a search root.
    pub fn with_search_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.search_roots.push(root.into());
        self
    }

    /// Replace the search roots.
    pub fn with_search_roots<I, P>(mut self, roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.search_roots = roots.into_iter().map(Into::into).collect();
        self
    }

    /// Allow or forbid the current-directory fallback.
    pub fn with_current_dir_fallback(mut self, allow: bool) -> Self {
        self.allow_current_dir = allow;
        self
    }

    /// Use `dir` as the current directory instead of the process's.
    pub fn with_current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Stop probing at `deadline`.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Stop probing `timeout` from now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Stop probing once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// The directory probed by the current-directory fallback, if enabled.
    pub(crate) fn fallback_root(&self) -> Option<PathBuf> {
        if !self.allow_current_dir {
            return None;
        }
        match &self.current_dir {
            Some(dir) => Some(dir.clone()),
            None => std::env::current_dir().ok(),
        }
    }

    pub(crate) fn requesting_file(&self) -> Option<&Path> {
        self.requesting_file.as_deref()
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    /// The context's own deadline, or `timeout` from now when it has none.
    pub(crate) fn deadline_or(&self, timeout: Option<Duration>) -> Option<Instant> {
        self.deadline
            .or_else(|| timeout.map(|timeout| Instant::now() + timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_context_is_closed() {
        let ctx = ResolutionContext::new();
        assert!(ctx.search_roots.is_empty());
        assert!(ctx.fallback_root().is_none());
        assert!(!ctx.is_cancelled());
        assert!(ctx.deadline_or(None).is_none());
    }

    #[test]
    fn test_fallback_root() {
        let ctx = ResolutionContext::new()
            .with_current_dir("/srv/scripts")
            .with_current_dir_fallback(true);
        assert_eq!(ctx.fallback_root(), Some(PathBuf::from("/srv/scripts")));

        let ctx = ctx.with_current_dir_fallback(false);
        assert!(ctx.fallback_root().is_none());
    }

    #[test]
    fn test_cancellation_is_shared() {
        let token = CancellationToken::new();
        let ctx = ResolutionContext::new().with_cancellation(token.clone());
        assert!(!ctx.is_cancelled());
        token.cancel();
        assert!(ctx.is_cancelled());
    }

    #[test]
    fn test_deadline() {
        let own = Instant::now() + Duration::from_secs(5);
        let ctx = ResolutionContext::new().with_deadline(own);
        assert_eq!(ctx.deadline_or(Some(Duration::from_secs(60))), Some(own));

        let ctx = ResolutionContext::new();
        assert!(ctx.deadline_or(Some(Duration::from_secs(60))).unwrap() > Instant::now());
    }
}
