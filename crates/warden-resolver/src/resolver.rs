//! Import resolution.
//!
//! Precedence, first match wins:
//!
//! 1. the resolution cache;
//! 2. the registry of host-provided modules;
//! 3. each search root of the context, in order;
//! 4. the current directory, when the context allows it.
//!
//! A module that exists in the registry can never be shadowed by a user
//! manifest of the same name.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use warden_core::declare::is_identifier;
use warden_core::{HostBindings, ModuleDescriptor, Registry};
use warden_observe::{EventDispatcher, RuntimeEvent};

use crate::cache::{CacheKey, CacheStats, ResolutionCache};
use crate::config::ResolverConfig;
use crate::context::ResolutionContext;
use crate::error::{ImportError, ImportResult, Probe};
use crate::loader::ManifestLoader;
use crate::resolved::{ResolutionSource, ResolvedModule};
use crate::user::UserModuleTable;

/// Maps import paths to module handles.
pub struct Resolver {
    registry: Arc<Registry>,
    user_modules: Arc<UserModuleTable>,
    cache: ResolutionCache,
    loader: ManifestLoader,
    config: ResolverConfig,
    events: Option<Arc<EventDispatcher>>,
}

impl Resolver {
    /// Create a resolver over `registry` with no host bindings.
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            user_modules: Arc::new(UserModuleTable::new()),
            cache: ResolutionCache::new(),
            loader: ManifestLoader::default(),
            config: ResolverConfig::default(),
            events: None,
        }
    }

    /// Use `config` for defaults.
    pub fn with_config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    /// Bind user-module functions against `bindings`.
    pub fn with_bindings(mut self, bindings: HostBindings) -> Self {
        self.loader = ManifestLoader::new(bindings);
        self
    }

    /// Store loaded user modules in `table`.
    pub fn with_user_modules(mut self, table: Arc<UserModuleTable>) -> Self {
        self.user_modules = table;
        self
    }

    /// Report resolutions to `events`.
    pub fn with_events(mut self, events: Arc<EventDispatcher>) -> Self {
        self.events = Some(events);
        self
    }

    /// The registry consulted before any search root.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// User modules loaded so far.
    pub fn user_modules(&self) -> &Arc<UserModuleTable> {
        &self.user_modules
    }

    /// The resolver's defaults.
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve an import given as path segments, e.g. `["pkg", "tools"]`.
    pub fn resolve_segments<S: AsRef<str>>(
        &self,
        segments: &[S],
        context: &ResolutionContext,
    ) -> ImportResult<ResolvedModule> {
        let path = segments
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(".");
        self.resolve(&path, context)
    }

    /// Resolve a dotted import path.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError::NotFound`] listing every probed location when
    /// no source provides the module.
    pub fn resolve(&self, path: &str, context: &ResolutionContext) -> ImportResult<ResolvedModule> {
        debug!(
            path,
            from = ?context.requesting_file(),
            roots = context.search_roots.len(),
            "Resolving import"
        );

        match self.resolve_inner(path, context) {
            Ok((module, cached)) => {
                debug!(path, source = %module.source, cached, "Import resolved");
                self.emit(RuntimeEvent::ImportResolved {
                    path: module.name().to_string(),
                    source: module.source.to_string(),
                    cached,
                });
                Ok(module)
            }
            Err(err) => {
                warn!(path, error = %err, "Import failed");
                self.emit(RuntimeEvent::ImportFailed {
                    path: path.to_string(),
                    reason: err.to_string(),
                });
                Err(err)
            }
        }
    }

    fn resolve_inner(
        &self,
        path: &str,
        context: &ResolutionContext,
    ) -> ImportResult<(ResolvedModule, bool)> {
        let segments = parse_path(path)?;
        let path = segments.join(".");
        let fallback = context.fallback_root();

        let key = CacheKey {
            path: path.clone(),
            roots: context.search_roots.clone(),
            fallback: fallback.clone(),
        };
        if let Some(hit) = self.cache.get(&key) {
            return Ok((hit, true));
        }

        let resolved = self.locate(&path, &segments, context, fallback)?;
        self.cache.insert(key, resolved.clone());
        Ok((resolved, false))
    }

    fn locate(
        &self,
        path: &str,
        segments: &[&str],
        context: &ResolutionContext,
        fallback: Option<PathBuf>,
    ) -> ImportResult<ResolvedModule> {
        if let Some(descriptor) = self.registry.lookup(path) {
            return Ok(ResolvedModule::new(descriptor, ResolutionSource::Stdlib));
        }

        let mut probed = vec![Probe::missing("registry")];
        let deadline = context.deadline_or(self.config.probe_timeout);

        for root in &context.search_roots {
            if let Some((descriptor, file)) =
                self.probe_root(root, path, segments, context, deadline, &mut probed)?
            {
                let source = ResolutionSource::User {
                    root: root.clone(),
                    file,
                };
                return Ok(ResolvedModule::new(descriptor, source));
            }
        }

        if let Some(cwd) = fallback {
            if let Some((descriptor, file)) =
                self.probe_root(&cwd, path, segments, context, deadline, &mut probed)?
            {
                return Ok(ResolvedModule::new(
                    descriptor,
                    ResolutionSource::CurrentDir { file },
                ));
            }
        }

        Err(ImportError::NotFound {
            path: path.to_string(),
            probed,
        })
    }

    /// Probe the candidate files under one root. Failures are recorded and
    /// never stop the caller from trying later roots. A manifest whose name
    /// is bound to another file is a hard error.
    fn probe_root(
        &self,
        root: &Path,
        path: &str,
        segments: &[&str],
        context: &ResolutionContext,
        deadline: Option<Instant>,
        probed: &mut Vec<Probe>,
    ) -> ImportResult<Option<(Arc<ModuleDescriptor>, PathBuf)>> {
        for file in ManifestLoader::candidates(root, segments) {
            if context.is_cancelled() {
                return Err(ImportError::Cancelled {
                    path: path.to_string(),
                });
            }
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                return Err(ImportError::TimedOut {
                    path: path.to_string(),
                });
            }

            let location = file.display().to_string();
            match std::fs::metadata(&file) {
                Ok(meta) if meta.is_file() => {}
                Ok(_) => {
                    probed.push(Probe::missing(location));
                    continue;
                }
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    probed.push(Probe::missing(location));
                    continue;
                }
                Err(err) => {
                    warn!(file = %location, error = %err, "Probe failed");
                    probed.push(Probe::failed(location, err.to_string()));
                    continue;
                }
            }

            let already_bound = |bound: PathBuf| ImportError::AlreadyBound {
                path: path.to_string(),
                bound,
                found: file.clone(),
            };
            if let Some(descriptor) = self.user_modules.bound_to(path, &file).map_err(already_bound)? {
                return Ok(Some((descriptor, file)));
            }

            match self.loader.load(&file, path) {
                Ok(descriptor) => {
                    let descriptor = self
                        .user_modules
                        .insert(&file, descriptor)
                        .map_err(already_bound)?;
                    return Ok(Some((descriptor, file)));
                }
                Err(err) => {
                    warn!(file = %location, error = %err, "Rejected user module");
                    probed.push(Probe::failed(location, err.to_string()));
                }
            }
        }
        Ok(None)
    }

    /// Drop every cached resolution.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Cache counters.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    fn emit(&self, event: RuntimeEvent) {
        if let Some(events) = &self.events {
            events.emit(event);
        }
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("config", &self.config)
            .field("cache", &self.cache.stats())
            .field("user_modules", &self.user_modules.len())
            .finish()
    }
}

fn parse_path(path: &str) -> ImportResult<Vec<&str>> {
    let invalid = |reason: String| ImportError::InvalidPath {
        path: path.to_string(),
        reason,
    };

    let trimmed = path.trim();
    if trimmed.is_empty() {
        return Err(invalid("path is empty".to_string()));
    }

    let segments: Vec<&str> = trimmed.split('.').collect();
    if let Some(bad) = segments.iter().find(|s| !is_identifier(s)) {
        return Err(invalid(format!("segment '{}' is not an identifier", bad)));
    }
    Ok(segments)
}
