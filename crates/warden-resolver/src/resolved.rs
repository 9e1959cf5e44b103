//! The result of a successful resolution.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use warden_core::ModuleDescriptor;

/// Where a resolved module came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionSource {
    /// The registry of host-provided modules.
    Stdlib,
    /// A manifest under a configured search root.
    User {
        /// The search root.
        root: PathBuf,
        /// The manifest file.
        file: PathBuf,
    },
    /// A manifest under the current directory.
    CurrentDir {
        /// The manifest file.
        file: PathBuf,
    },
}

impl ResolutionSource {
    /// Short label: `stdlib`, `user` or `cwd`.
    pub fn kind(&self) -> &'static str {
        match self {
            ResolutionSource::Stdlib => "stdlib",
            ResolutionSource::User { .. } => "user",
            ResolutionSource::CurrentDir { .. } => "cwd",
        }
    }
}

impl fmt::Display for ResolutionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionSource::Stdlib => write!(f, "stdlib"),
            ResolutionSource::User { file, .. } => write!(f, "user:{}", file.display()),
            ResolutionSource::CurrentDir { file } => write!(f, "cwd:{}", file.display()),
        }
    }
}

/// A module handle ready for the execution layer.
#[derive(Debug, Clone)]
pub struct ResolvedModule {
    /// The shared descriptor.
    pub descriptor: Arc<ModuleDescriptor>,
    /// Where it came from.
    pub source: ResolutionSource,
    /// When it was first resolved. Cache hits keep the original time.
    pub resolved_at: SystemTime,
}

impl ResolvedModule {
    pub(crate) fn new(descriptor: Arc<ModuleDescriptor>, source: ResolutionSource) -> Self {
        Self {
            descriptor,
            source,
            resolved_at: SystemTime::now(),
        }
    }

    /// The module name.
    pub fn name(&self) -> &str {
        self.descriptor.name()
    }
}

impl PartialEq for ResolvedModule {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.descriptor, &other.descriptor)
            && self.source == other.source
            && self.resolved_at == other.resolved_at
    }
}
