//! Warden Module Resolver
//!
//! This crate maps import paths to module handles for the Warden scripting
//! runtime.
//!
//! - [`Resolver`]: cache, then registry, then search roots, then the
//!   current directory
//! - [`ResolutionContext`]: per-request search roots, fallback flag,
//!   deadline and cancellation
//! - [`ResolutionCache`]: concurrent cache keyed by path and context
//! - [`UserModuleTable`]: user modules loaded from TOML manifests
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use warden_core::{ModuleDeclaration, Registry};
//! use warden_resolver::{ImportError, ResolutionContext, ResolutionSource, Resolver};
//!
//! let registry = Registry::new();
//! registry.register(ModuleDeclaration::new("math").build().unwrap()).unwrap();
//! registry.seal().unwrap();
//!
//! let resolver = Resolver::new(Arc::new(registry));
//! let ctx = ResolutionContext::new();
//!
//! let math = resolver.resolve("math", &ctx).unwrap();
//! assert_eq!(math.source, ResolutionSource::Stdlib);
//!
//! let err = resolver.resolve_segments(&["nonexistent"], &ctx).unwrap_err();
//! assert!(matches!(err, ImportError::NotFound { .. }));
//! ```

pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod loader;
pub mod resolved;
pub mod resolver;
pub mod user;

// Re-export main types
pub use cache::{CacheKey, CacheStats, ResolutionCache};
pub use config::ResolverConfig;
pub use context::{CancellationToken, ResolutionContext};
pub use error::{ImportError, ImportResult, LoadError, Probe, ProbeOutcome};
pub use loader::ManifestLoader;
pub use resolved::{ResolutionSource, ResolvedModule};
pub use resolver::Resolver;
pub use user::UserModuleTable;
