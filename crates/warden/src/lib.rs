//! # Warden - Module Loading and Capability Enforcement
//!
//! Warden is the module system of an embedded, security-focused scripting
//! runtime. It binds `import` statements to host-provided modules and gates
//! every call across the host boundary behind a capability check.
//!
//! ## Features
//!
//! - **Declarative modules**: Module authors describe name, version,
//!   capabilities and signatures once, as data
//! - **Deterministic resolution**: Cache, then registry, then search roots,
//!   then the current directory
//! - **Capability enforcement**: Every import and call is authorized
//!   against the caller's capability set; importing never grants anything
//! - **Observability**: Structured events and counters for every decision
//!
//! ## Quick Start
//!
//! ```
//! use warden::prelude::*;
//!
//! let runtime = Warden::builder().build()?;
//! let ctx = runtime.create_context();
//!
//! // The import succeeds: `math` itself requires nothing.
//! runtime.import("math", ctx, &runtime.resolution_context())?;
//!
//! // Calling `sqrt` does require a capability.
//! assert!(runtime.invoke("math", "sqrt", ctx, &[Value::Int(16)]).is_err());
//!
//! runtime.grant(ctx, Capability::parse("execute:calculations")?)?;
//! assert_eq!(runtime.invoke("math", "sqrt", ctx, &[Value::Int(16)])?, Value::Float(4.0));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                  Host / code generator                  │
//! ├─────────────────────────────────────────────────────────┤
//! │                    warden (facade)                      │
//! │                  ┌─────────────────┐                    │
//! │                  │ Warden Builder  │                    │
//! │                  └────────┬────────┘                    │
//! │                           │                             │
//! │  ┌───────────────┬────────┴────────┬─────────────────┐  │
//! │  │ warden-core   │ warden-resolver │ warden-observe  │  │
//! │  │ (registry,    │ (cache, search  │ (events,        │  │
//! │  │  gate)        │  roots)         │  metrics)       │  │
//! │  └───────────────┴─────────────────┴─────────────────┘  │
//! ├─────────────────────────────────────────────────────────┤
//! │        warden-stdlib          warden-capability         │
//! └─────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use warden_capability::{Capability, CapabilityError, CapabilitySet, ContextId};
use warden_core::{
    AttributeError, CapabilityManager, HostBindings, InvokeError, InvokeResult, Introspector,
    ManifestError, ModuleCatalog, ModuleDescriptor, ModuleManifest, ModuleUnit, NativeResult,
    Registry, RegistrationError, RegistrationResult, CallFrame, Value,
};
use warden_observe::{EventDispatcher, EventSubscriber, RuntimeMetrics};
use warden_resolver::{
    ImportError, ResolutionContext, ResolvedModule, Resolver, ResolverConfig, UserModuleTable,
};

pub mod config;

pub use config::WardenConfig;

// Re-export from sub-crates
pub use warden_capability;
pub use warden_core;
pub use warden_observe;
pub use warden_resolver;
pub use warden_stdlib;

type UnitLoader = fn(&Registry) -> RegistrationResult<Arc<ModuleDescriptor>>;

/// Main entry point for Warden.
pub struct Warden;

impl Warden {
    /// Create a new runtime builder.
    pub fn builder() -> WardenBuilder {
        WardenBuilder::new()
    }

    /// Create a runtime with the standard library and default configuration.
    pub fn with_defaults() -> Result<WardenRuntime, WardenError> {
        WardenBuilder::new().build()
    }
}

/// Builder for configuring the runtime.
///
/// Every module is registered during [`WardenBuilder::build`], after which
/// the registry is sealed.
pub struct WardenBuilder {
    stdlib: bool,
    units: Vec<UnitLoader>,
    descriptors: Vec<ModuleDescriptor>,
    resolver: ResolverConfig,
    policy: CapabilitySet,
    bindings: HostBindings,
    event_subscribers: Vec<Arc<dyn EventSubscriber>>,
}

impl WardenBuilder {
    /// Create a new builder with the standard library enabled.
    pub fn new() -> Self {
        Self {
            stdlib: true,
            units: Vec::new(),
            descriptors: Vec::new(),
            resolver: ResolverConfig::default(),
            policy: CapabilitySet::new(),
            bindings: HostBindings::new(),
            event_subscribers: Vec::new(),
        }
    }

    /// Apply a configuration file's resolver defaults and policy grants.
    pub fn with_config(mut self, config: &WardenConfig) -> Result<Self, WardenError> {
        self.resolver = config.resolver_config();
        self.policy = config.grants()?;
        Ok(self)
    }

    // Modules

    /// Register the standard library (on by default).
    pub fn with_stdlib(mut self, enabled: bool) -> Self {
        self.stdlib = enabled;
        self
    }

    /// Load a module unit.
    pub fn with_unit<U: ModuleUnit>(mut self) -> Self {
        self.units.push(|registry: &Registry| registry.load::<U>());
        self
    }

    /// Register an already-built descriptor.
    pub fn with_module(mut self, descriptor: ModuleDescriptor) -> Self {
        self.descriptors.push(descriptor);
        self
    }

    // Resolution

    /// Add a default search root.
    pub fn with_search_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.resolver = self.resolver.with_search_root(root);
        self
    }

    /// Enable the current-directory fallback by default.
    pub fn with_current_dir(mut self, allow: bool) -> Self {
        self.resolver = self.resolver.with_current_dir(allow);
        self
    }

    /// Bound user-module probing time.
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.resolver = self.resolver.with_probe_timeout(timeout);
        self
    }

    /// Make host symbols available to user-module manifests.
    pub fn with_bindings(mut self, bindings: HostBindings) -> Self {
        self.bindings = bindings;
        self
    }

    /// Bind one host symbol for user-module manifests.
    pub fn with_binding<F>(mut self, symbol: impl Into<String>, implementation: F) -> Self
    where
        F: Fn(&CallFrame<'_>, &[Value]) -> NativeResult<Value> + Send + Sync + 'static,
    {
        self.bindings = self.bindings.bind(symbol, implementation);
        self
    }

    // Policy

    /// Add a capability to the policy grants.
    pub fn with_policy_grant(mut self, capability: Capability) -> Self {
        self.policy.grant(capability);
        self
    }

    // Observability

    /// Add an event subscriber.
    pub fn with_event_subscriber(mut self, subscriber: Arc<dyn EventSubscriber>) -> Self {
        self.event_subscribers.push(subscriber);
        self
    }

    /// Register every module into a private registry, seal it and build the
    /// runtime.
    pub fn build(self) -> Result<WardenRuntime, WardenError> {
        self.assemble(|events| Arc::new(Registry::with_events(Arc::clone(events))))
    }

    /// Register every module into the process-wide registry
    /// ([`warden_core::global`]), seal it and build the runtime.
    ///
    /// The global registry is sealed at most once per process, so only the
    /// first call can succeed; later calls fail with
    /// [`RegistrationError::Sealed`]. The global registry was created
    /// without an event dispatcher, so registration events are not emitted.
    pub fn build_global(self) -> Result<WardenRuntime, WardenError> {
        self.assemble(|_| Arc::clone(warden_core::global()))
    }

    fn assemble<F>(self, registry: F) -> Result<WardenRuntime, WardenError>
    where
        F: FnOnce(&Arc<EventDispatcher>) -> Arc<Registry>,
    {
        let events = Arc::new(EventDispatcher::new());
        let metrics = Arc::new(RuntimeMetrics::new());
        events.subscribe(metrics.clone());
        for subscriber in self.event_subscribers {
            events.subscribe(subscriber);
        }

        let registry = registry(&events);
        if self.stdlib {
            warden_stdlib::load_all(&registry)?;
        }
        for load in self.units {
            load(&registry)?;
        }
        for descriptor in self.descriptors {
            registry.register(descriptor)?;
        }
        registry.seal()?;

        let user_modules = Arc::new(UserModuleTable::new());
        let resolver = Resolver::new(Arc::clone(&registry))
            .with_config(self.resolver)
            .with_bindings(self.bindings)
            .with_user_modules(Arc::clone(&user_modules))
            .with_events(Arc::clone(&events));

        info!(modules = registry.len(), "Warden runtime ready");

        Ok(WardenRuntime {
            catalog: RuntimeCatalog {
                registry,
                user_modules,
            },
            resolver,
            gate: CapabilityManager::with_events(Arc::clone(&events)),
            policy: self.policy,
            events,
            metrics,
        })
    }
}

impl Default for WardenBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The modules visible to calls and introspection: the sealed registry
/// first, then user modules loaded by the resolver.
pub struct RuntimeCatalog {
    registry: Arc<Registry>,
    user_modules: Arc<UserModuleTable>,
}

impl ModuleCatalog for RuntimeCatalog {
    fn module(&self, name: &str) -> Option<Arc<ModuleDescriptor>> {
        self.registry
            .lookup(name)
            .or_else(|| self.user_modules.get(name))
    }

    fn module_names(&self) -> Vec<String> {
        let mut names = self.registry.list_modules();
        names.extend(self.user_modules.module_names());
        names.sort();
        names.dedup();
        names
    }
}

/// A configured, sealed runtime.
pub struct WardenRuntime {
    catalog: RuntimeCatalog,
    resolver: Resolver,
    gate: CapabilityManager,
    policy: CapabilitySet,
    events: Arc<EventDispatcher>,
    metrics: Arc<RuntimeMetrics>,
}

impl WardenRuntime {
    /// The sealed registry.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.catalog.registry
    }

    /// Every visible module: registry and loaded user modules.
    pub fn catalog(&self) -> &RuntimeCatalog {
        &self.catalog
    }

    /// The import resolver.
    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// The authorization gate.
    pub fn gate(&self) -> &CapabilityManager {
        &self.gate
    }

    /// The event dispatcher.
    pub fn event_dispatcher(&self) -> &Arc<EventDispatcher> {
        &self.events
    }

    /// Counters derived from runtime events.
    pub fn metrics(&self) -> &Arc<RuntimeMetrics> {
        &self.metrics
    }

    /// Capabilities granted by the configured policy.
    pub fn policy_grants(&self) -> &CapabilitySet {
        &self.policy
    }

    // Contexts

    /// Create a context holding no capabilities.
    pub fn create_context(&self) -> ContextId {
        self.gate.create_context()
    }

    /// Create a context holding `capabilities`.
    pub fn create_context_with(&self, capabilities: CapabilitySet) -> ContextId {
        self.gate.create_context_with(capabilities)
    }

    /// Create a context holding the policy grants.
    pub fn create_policy_context(&self) -> ContextId {
        self.gate.create_context_with(self.policy.clone())
    }

    /// Discard a context.
    pub fn drop_context(&self, context: ContextId) -> bool {
        self.gate.drop_context(context)
    }

    /// Grant a capability to a context.
    pub fn grant(&self, context: ContextId, capability: Capability) -> Result<(), WardenError> {
        Ok(self.gate.grant(context, capability)?)
    }

    /// Revoke a capability from a context.
    pub fn revoke(&self, context: ContextId, capability: &Capability) -> Result<(), WardenError> {
        Ok(self.gate.revoke(context, capability)?)
    }

    /// The capabilities a context currently holds.
    pub fn current_capabilities(&self, context: ContextId) -> Result<CapabilitySet, WardenError> {
        Ok(self.gate.current_capabilities(context)?)
    }

    // Imports

    /// A resolution context carrying the configured defaults.
    pub fn resolution_context(&self) -> ResolutionContext {
        self.resolver.config().context()
    }

    /// Resolve an import and authorize it for `context`.
    ///
    /// Importing requires the module's capabilities; it never grants them.
    pub fn import(
        &self,
        path: &str,
        context: ContextId,
        resolution: &ResolutionContext,
    ) -> Result<ResolvedModule, WardenError> {
        let module = self.resolver.resolve(path, resolution)?;
        self.gate.check_import(&module.descriptor, context)?;
        Ok(module)
    }

    /// Resolve an import given as path segments and authorize it.
    pub fn import_segments<S: AsRef<str>>(
        &self,
        segments: &[S],
        context: ContextId,
        resolution: &ResolutionContext,
    ) -> Result<ResolvedModule, WardenError> {
        let module = self.resolver.resolve_segments(segments, resolution)?;
        self.gate.check_import(&module.descriptor, context)?;
        Ok(module)
    }

    // Calls

    /// Invoke `module.function` by name.
    pub fn invoke(
        &self,
        module: &str,
        function: &str,
        context: ContextId,
        args: &[Value],
    ) -> InvokeResult<Value> {
        self.gate.invoke(&self.catalog, module, function, context, args)
    }

    /// Invoke a function of a module returned by [`WardenRuntime::import`].
    pub fn call(
        &self,
        module: &ResolvedModule,
        function: &str,
        context: ContextId,
        args: &[Value],
    ) -> InvokeResult<Value> {
        self.gate
            .invoke_resolved(&self.catalog, &module.descriptor, function, context, args)
    }

    // Introspection

    /// Metadata-only introspection over every visible module.
    pub fn introspect(&self) -> Introspector<'_> {
        Introspector::new(&self.catalog)
    }

    /// Every visible module name, sorted.
    pub fn list_modules(&self) -> Vec<String> {
        self.catalog.module_names()
    }

    /// The manifest of a visible module.
    pub fn manifest(&self, module: &str) -> Result<ModuleManifest, WardenError> {
        let descriptor = self
            .catalog
            .module(module)
            .ok_or_else(|| AttributeError::NoSuchModule(module.to_string()))?;
        Ok(descriptor.manifest()?)
    }
}

impl std::fmt::Debug for WardenRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WardenRuntime")
            .field("modules", &self.list_modules())
            .field("policy", &self.policy)
            .finish()
    }
}

/// Errors from the Warden runtime.
#[derive(Debug, thiserror::Error)]
pub enum WardenError {
    /// Registration error.
    #[error("Registration error: {0}")]
    Registration(#[from] RegistrationError),

    /// Import error.
    #[error("Import error: {0}")]
    Import(#[from] ImportError),

    /// Invocation error.
    #[error("Invocation error: {0}")]
    Invoke(#[from] InvokeError),

    /// Capability error.
    #[error("Capability error: {0}")]
    Capability(#[from] CapabilityError),

    /// Manifest error.
    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<AttributeError> for WardenError {
    fn from(err: AttributeError) -> Self {
        WardenError::Invoke(InvokeError::Attribute(err))
    }
}

/// Prelude module for convenient imports.
pub mod prelude {
    // Main types
    pub use crate::{Warden, WardenBuilder, WardenConfig, WardenError, WardenRuntime};

    // Core types
    pub use warden_core::{
        CallFrame, FunctionDeclaration, HostBindings, InvokeError, ModuleDeclaration,
        ModuleUnit, NativeError, NativeResult, Value,
    };

    // Capability types
    pub use warden_capability::{Capability, CapabilityError, CapabilitySet, ContextId};

    // Resolution types
    pub use warden_resolver::{ImportError, ResolutionContext, ResolutionSource, ResolvedModule};

    // Observability types
    pub use warden_observe::{EventDispatcher, EventSubscriber, RuntimeEvent, RuntimeMetrics};

    // Common std types
    pub use std::sync::Arc;
}
