//! Resolver error types.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use warden_core::ManifestError;

/// What happened at one probed location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Nothing there.
    Missing,
    /// Something there, but it could not be loaded.
    Failed(String),
}

/// One location the resolver looked at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe {
    /// `registry`, or a file path.
    pub location: String,
    /// What was found.
    pub outcome: ProbeOutcome,
}

impl Probe {
    pub(crate) fn missing(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            outcome: ProbeOutcome::Missing,
        }
    }

    pub(crate) fn failed(location: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            outcome: ProbeOutcome::Failed(reason.into()),
        }
    }
}

impl fmt::Display for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            ProbeOutcome::Missing => write!(f, "{} (not found)", self.location),
            ProbeOutcome::Failed(reason) => write!(f, "{} ({})", self.location, reason),
        }
    }
}

fn render_probes(probed: &[Probe]) -> String {
    probed
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors raised while resolving an import.
///
/// Unresolved imports are always hard errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImportError {
    /// No source provides the module.
    #[error("No module named '{path}'; probed: {}", render_probes(.probed))]
    NotFound {
        /// Dotted import path.
        path: String,
        /// Every location looked at, in order.
        probed: Vec<Probe>,
    },

    /// The import path is not a dotted sequence of identifiers.
    #[error("Invalid import path '{path}': {reason}")]
    InvalidPath {
        /// The path as given.
        path: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The module name is already bound to a user module from another file.
    #[error("Module '{path}' found at {} is already bound to {}", .found.display(), .bound.display())]
    AlreadyBound {
        /// Dotted import path.
        path: String,
        /// The manifest the name is bound to.
        bound: PathBuf,
        /// The manifest that was rejected.
        found: PathBuf,
    },

    /// The resolution context was cancelled before resolution finished.
    #[error("Resolution of '{path}' was cancelled")]
    Cancelled {
        /// Dotted import path.
        path: String,
    },

    /// The resolution context's deadline passed before resolution finished.
    #[error("Resolution of '{path}' timed out")]
    TimedOut {
        /// Dotted import path.
        path: String,
    },
}

impl ImportError {
    /// The dotted path the error is about.
    pub fn path(&self) -> &str {
        match self {
            ImportError::NotFound { path, .. }
            | ImportError::InvalidPath { path, .. }
            | ImportError::AlreadyBound { path, .. }
            | ImportError::Cancelled { path }
            | ImportError::TimedOut { path } => path,
        }
    }
}

/// Errors loading a user module manifest from disk.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The manifest is malformed or not registrable.
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// The manifest declares a different module than the one imported.
    #[error("manifest declares module '{found}', expected '{expected}'")]
    NameMismatch {
        /// The dotted import path.
        expected: String,
        /// The name in the manifest.
        found: String,
    },
}

/// Result type for resolution.
pub type ImportResult<T> = std::result::Result<T, ImportError>;
