//! Capability manager and authorization gate.
//!
//! Every execution context owns one [`CapabilitySet`], changed only through
//! [`CapabilityManager::grant`] and [`CapabilityManager::revoke`]. Imports
//! and calls are authorized against that set at the moment they happen:
//! nothing is cached, so a revocation applies to the very next call.
//!
//! [`CapabilityManager::invoke`] and [`CapabilityManager::invoke_resolved`]
//! are the only code paths that execute a bridged function.

use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use tracing::{debug, info, warn};

use warden_capability::{
    Capability, CapabilityError, CapabilityResult, CapabilitySet, ContextId, authorize,
};
use warden_observe::{CheckTarget, EventDispatcher, RuntimeEvent};

use crate::descriptor::{FunctionDescriptor, Member, ModuleDescriptor};
use crate::error::{AttributeError, CallError, InvokeError, InvokeResult, NativeError};
use crate::introspect::Introspector;
use crate::registry::ModuleCatalog;
use crate::value::Value;

/// Holds per-context capability sets and makes every authorization decision.
#[derive(Default)]
pub struct CapabilityManager {
    contexts: DashMap<ContextId, CapabilitySet>,
    events: Option<Arc<EventDispatcher>>,
}

impl CapabilityManager {
    /// Create a manager with no contexts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a manager that reports decisions to `events`.
    pub fn with_events(events: Arc<EventDispatcher>) -> Self {
        Self {
            contexts: DashMap::new(),
            events: Some(events),
        }
    }

    /// Create a context holding no capabilities.
    pub fn create_context(&self) -> ContextId {
        self.create_context_with(CapabilitySet::new())
    }

    /// Create a context holding `capabilities`.
    pub fn create_context_with(&self, capabilities: CapabilitySet) -> ContextId {
        let id = ContextId::new();
        info!(context = %id, capabilities = capabilities.len(), "Execution context created");
        self.contexts.insert(id, capabilities);
        id
    }

    /// Discard a context. Returns `true` if it existed.
    pub fn drop_context(&self, context: ContextId) -> bool {
        let existed = self.contexts.remove(&context).is_some();
        if existed {
            info!(context = %context, "Execution context dropped");
        }
        existed
    }

    /// Check whether a context exists.
    pub fn has_context(&self, context: ContextId) -> bool {
        self.contexts.contains_key(&context)
    }

    /// Grant a capability to a context. Granting a held capability is a no-op.
    pub fn grant(&self, context: ContextId, capability: Capability) -> CapabilityResult<()> {
        let mut set = self
            .contexts
            .get_mut(&context)
            .ok_or(CapabilityError::UnknownContext(context))?;
        let added = set.grant(capability.clone());
        drop(set);

        if added {
            self.emit(RuntimeEvent::CapabilityGranted {
                context,
                capability,
            });
        }
        Ok(())
    }

    /// Revoke a capability from a context. Revoking an absent capability is a
    /// no-op.
    pub fn revoke(&self, context: ContextId, capability: &Capability) -> CapabilityResult<()> {
        let mut set = self
            .contexts
            .get_mut(&context)
            .ok_or(CapabilityError::UnknownContext(context))?;
        let removed = set.revoke(capability);
        drop(set);

        if removed {
            self.emit(RuntimeEvent::CapabilityRevoked {
                context,
                capability: capability.clone(),
            });
        }
        Ok(())
    }

    /// A copy of the capabilities a context currently holds.
    pub fn current_capabilities(&self, context: ContextId) -> CapabilityResult<CapabilitySet> {
        self.contexts
            .get(&context)
            .map(|set| set.clone())
            .ok_or(CapabilityError::UnknownContext(context))
    }

    /// Authorize importing `module` from `context`.
    ///
    /// Succeeds iff the module's required capabilities are all held. Never
    /// grants anything.
    pub fn check_import(&self, module: &ModuleDescriptor, context: ContextId) -> CapabilityResult<()> {
        self.check(
            context,
            module.required_capabilities(),
            CheckTarget::Import {
                module: module.name().to_string(),
            },
        )
    }

    /// Authorize calling `function` from `context`, evaluated fresh each time.
    pub fn check_call(&self, function: &FunctionDescriptor, context: ContextId) -> CapabilityResult<()> {
        self.check(
            context,
            function.required_capabilities(),
            CheckTarget::Call {
                module: function.module().to_string(),
                function: function.name().to_string(),
            },
        )
    }

    fn check(
        &self,
        context: ContextId,
        required: &CapabilitySet,
        target: CheckTarget,
    ) -> CapabilityResult<()> {
        let result = {
            let held = self
                .contexts
                .get(&context)
                .ok_or(CapabilityError::UnknownContext(context))?;
            authorize(&held, required)
        };

        match &result {
            Ok(()) => debug!(context = %context, target = %target, "Authorized"),
            Err(err) => warn!(context = %context, target = %target, error = %err, "Denied"),
        }

        self.emit(RuntimeEvent::CapabilityChecked {
            context,
            target,
            permitted: result.is_ok(),
            missing: result
                .as_ref()
                .err()
                .and_then(CapabilityError::missing)
                .map(|missing| missing.iter().cloned().collect())
                .unwrap_or_default(),
        });

        result
    }

    /// Invoke `module.function` on behalf of `context`.
    pub fn invoke(
        &self,
        catalog: &dyn ModuleCatalog,
        module: &str,
        function: &str,
        context: ContextId,
        args: &[Value],
    ) -> InvokeResult<Value> {
        let descriptor = catalog
            .module(module)
            .ok_or_else(|| AttributeError::NoSuchModule(module.to_string()))?;
        self.invoke_resolved(catalog, &descriptor, function, context, args)
    }

    /// Invoke a function of an already-resolved module on behalf of `context`.
    ///
    /// The caller must satisfy both the module's import requirement and the
    /// function's own requirement. Arguments are checked against the
    /// signature before the implementation runs.
    pub fn invoke_resolved(
        &self,
        catalog: &dyn ModuleCatalog,
        module: &ModuleDescriptor,
        function: &str,
        context: ContextId,
        args: &[Value],
    ) -> InvokeResult<Value> {
        let descriptor = match module.member(function) {
            Some(Member::Function(f)) => f,
            Some(Member::Constant(_)) => {
                return Err(AttributeError::NotCallable {
                    module: module.name().to_string(),
                    member: function.to_string(),
                }
                .into());
            }
            None => {
                return Err(AttributeError::NoSuchMember {
                    module: module.name().to_string(),
                    member: function.to_string(),
                }
                .into());
            }
        };

        self.check_import(module, context)?;
        self.check_call(descriptor, context)?;
        descriptor.signature().check_args(descriptor.name(), args)?;

        let frame = CallFrame {
            catalog,
            gate: self,
            context,
            function: descriptor,
        };

        let started = Instant::now();
        let outcome = (descriptor.callable())(&frame, args);
        self.emit(RuntimeEvent::FunctionInvoked {
            module: module.name().to_string(),
            function: descriptor.name().to_string(),
            duration: started.elapsed(),
            success: outcome.is_ok(),
        });

        outcome.map_err(|err| match err {
            NativeError::Invoke(inner) => *inner,
            source => InvokeError::Call(CallError::Failed {
                module: module.name().to_string(),
                function: descriptor.name().to_string(),
                source,
            }),
        })
    }

    fn emit(&self, event: RuntimeEvent) {
        if let Some(events) = &self.events {
            events.emit(event);
        }
    }
}

impl std::fmt::Debug for CapabilityManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityManager")
            .field("contexts", &self.contexts.len())
            .finish()
    }
}

/// What a native implementation can see of the call it is serving.
///
/// Nested calls made through the frame run as the same context and pass
/// through the gate like any other call.
pub struct CallFrame<'a> {
    catalog: &'a dyn ModuleCatalog,
    gate: &'a CapabilityManager,
    context: ContextId,
    function: &'a FunctionDescriptor,
}

impl<'a> CallFrame<'a> {
    /// The calling context.
    pub fn context(&self) -> ContextId {
        self.context
    }

    /// The function being served.
    pub fn function(&self) -> &FunctionDescriptor {
        self.function
    }

    /// Metadata-only introspection over the visible modules.
    pub fn introspect(&self) -> Introspector<'a> {
        Introspector::new(self.catalog)
    }

    /// Make a nested, authorized call as the same context.
    pub fn invoke(&self, module: &str, function: &str, args: &[Value]) -> InvokeResult<Value> {
        self.gate
            .invoke(self.catalog, module, function, self.context, args)
    }
}

impl std::fmt::Debug for CallFrame<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallFrame")
            .field("context", &self.context)
            .field("function", &self.function.qualified_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declare::{FunctionDeclaration, ModuleDeclaration};
    use crate::registry::Registry;
    use warden_observe::CollectingSubscriber;

    fn cap(token: &'static str) -> Capability {
        Capability::parse(token).unwrap()
    }

    fn registry() -> Registry {
        let registry = Registry::new();
        registry
            .register(
                ModuleDeclaration::new("math")
                    .constant("pi", std::f64::consts::PI, "")
                    .function(
                        FunctionDeclaration::new("sqrt", |_, args| {
                            let x = args[0]
                                .as_number()
                                .ok_or_else(|| NativeError::msg("expected a number"))?;
                            if x < 0.0 {
                                return Err(NativeError::msg("math domain error"));
                            }
                            Ok(Value::Float(x.sqrt()))
                        })
                        .param("x", "number")
                        .returns("float")
                        .requires("execute:calculations"),
                    )
                    .build()
                    .unwrap(),
            )
            .unwrap();
        registry
            .register(
                ModuleDeclaration::new("clock")
                    .requires("system:clock")
                    .function(FunctionDeclaration::new("now", |_, _| Ok(Value::Int(0))).returns("int"))
                    .build()
                    .unwrap(),
            )
            .unwrap();
        registry
            .register(
                ModuleDeclaration::new("reflect")
                    .function(
                        FunctionDeclaration::new("call", |frame, args| {
                            let module = args[0].as_str().unwrap_or_default();
                            let function = args[1].as_str().unwrap_or_default();
                            Ok(frame.invoke(module, function, &args[2..])?)
                        })
                        .param("module", "str")
                        .param("function", "str")
                        .variadic("args", "any"),
                    )
                    .build()
                    .unwrap(),
            )
            .unwrap();
        registry.seal().unwrap();
        registry
    }

    #[test]
    fn test_scenario_sqrt_requires_capability() {
        let registry = registry();
        let gate = CapabilityManager::new();
        let ctx = gate.create_context();

        let err = gate
            .invoke(&registry, "math", "sqrt", ctx, &[Value::Int(16)])
            .unwrap_err();
        match err {
            InvokeError::Capability(CapabilityError::Missing { missing }) => {
                assert_eq!(missing.into_iter().collect::<Vec<_>>(), vec![cap("execute:calculations")]);
            }
            other => panic!("unexpected error: {other}"),
        }

        gate.grant(ctx, cap("execute:calculations")).unwrap();
        let result = gate
            .invoke(&registry, "math", "sqrt", ctx, &[Value::Int(16)])
            .unwrap();
        assert_eq!(result, Value::Float(4.0));
    }

    #[test]
    fn test_revocation_applies_to_next_call() {
        let registry = registry();
        let gate = CapabilityManager::new();
        let ctx = gate.create_context_with(CapabilitySet::from_tokens(["execute:calculations"]).unwrap());

        assert!(gate.invoke(&registry, "math", "sqrt", ctx, &[Value::Int(9)]).is_ok());

        gate.revoke(ctx, &cap("execute:calculations")).unwrap();
        assert!(matches!(
            gate.invoke(&registry, "math", "sqrt", ctx, &[Value::Int(9)]),
            Err(InvokeError::Capability(_))
        ));
    }

    #[test]
    fn test_check_import_never_grants() {
        let registry = registry();
        let gate = CapabilityManager::new();
        let ctx = gate.create_context();
        let clock = registry.lookup("clock").unwrap();

        assert!(gate.check_import(&clock, ctx).is_err());
        assert!(gate.current_capabilities(ctx).unwrap().is_empty());

        gate.grant(ctx, cap("system:clock")).unwrap();
        assert!(gate.check_import(&clock, ctx).is_ok());
        assert_eq!(gate.current_capabilities(ctx).unwrap().len(), 1);
    }

    #[test]
    fn test_invoke_requires_module_capability() {
        let registry = registry();
        let gate = CapabilityManager::new();
        let ctx = gate.create_context();

        let err = gate.invoke(&registry, "clock", "now", ctx, &[]).unwrap_err();
        assert!(matches!(err, InvokeError::Capability(_)));
    }

    #[test]
    fn test_grant_and_revoke_are_idempotent() {
        let gate = CapabilityManager::new();
        let ctx = gate.create_context();

        gate.grant(ctx, cap("a:b")).unwrap();
        gate.grant(ctx, cap("a:b")).unwrap();
        assert_eq!(gate.current_capabilities(ctx).unwrap().len(), 1);

        gate.revoke(ctx, &cap("a:b")).unwrap();
        gate.revoke(ctx, &cap("a:b")).unwrap();
        assert!(gate.current_capabilities(ctx).unwrap().is_empty());
    }

    #[test]
    fn test_contexts_are_isolated() {
        let gate = CapabilityManager::new();
        let a = gate.create_context();
        let b = gate.create_context();

        gate.grant(a, cap("execute:calculations")).unwrap();
        assert!(gate.current_capabilities(b).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_context() {
        let registry = registry();
        let gate = CapabilityManager::new();
        let ghost = ContextId::new();

        assert_eq!(
            gate.grant(ghost, cap("a:b")).unwrap_err(),
            CapabilityError::UnknownContext(ghost)
        );
        assert!(matches!(
            gate.invoke(&registry, "math", "sqrt", ghost, &[Value::Int(1)]),
            Err(InvokeError::Capability(CapabilityError::UnknownContext(_)))
        ));

        let ctx = gate.create_context();
        assert!(gate.drop_context(ctx));
        assert!(!gate.has_context(ctx));
    }

    #[test]
    fn test_attribute_errors() {
        let registry = registry();
        let gate = CapabilityManager::new();
        let ctx = gate.create_context();

        assert!(matches!(
            gate.invoke(&registry, "nope", "f", ctx, &[]),
            Err(InvokeError::Attribute(AttributeError::NoSuchModule(_)))
        ));
        assert!(matches!(
            gate.invoke(&registry, "math", "cbrt", ctx, &[]),
            Err(InvokeError::Attribute(AttributeError::NoSuchMember { .. }))
        ));
        assert!(matches!(
            gate.invoke(&registry, "math", "pi", ctx, &[]),
            Err(InvokeError::Attribute(AttributeError::NotCallable { .. }))
        ));
    }

    #[test]
    fn test_call_errors_are_distinct_from_denials() {
        let registry = registry();
        let gate = CapabilityManager::new();
        let ctx = gate.create_context_with(CapabilitySet::from_tokens(["execute:calculations"]).unwrap());

        assert!(matches!(
            gate.invoke(&registry, "math", "sqrt", ctx, &[Value::Int(-1)]),
            Err(InvokeError::Call(CallError::Failed { .. }))
        ));
        assert!(matches!(
            gate.invoke(&registry, "math", "sqrt", ctx, &[Value::from("16")]),
            Err(InvokeError::Call(CallError::ArgumentType { .. }))
        ));
        assert!(matches!(
            gate.invoke(&registry, "math", "sqrt", ctx, &[]),
            Err(InvokeError::Call(CallError::Arity { .. }))
        ));
    }

    #[test]
    fn test_nested_call_is_authorized() {
        let registry = registry();
        let gate = CapabilityManager::new();
        let ctx = gate.create_context();
        let args = [Value::from("math"), Value::from("sqrt"), Value::Int(16)];

        let err = gate.invoke(&registry, "reflect", "call", ctx, &args).unwrap_err();
        assert!(matches!(err, InvokeError::Capability(CapabilityError::Missing { .. })));

        gate.grant(ctx, cap("execute:calculations")).unwrap();
        assert_eq!(
            gate.invoke(&registry, "reflect", "call", ctx, &args).unwrap(),
            Value::Float(4.0)
        );
    }

    #[test]
    fn test_decisions_are_reported() {
        let registry = registry();
        let events = Arc::new(EventDispatcher::new());
        let collector = Arc::new(CollectingSubscriber::new(64));
        events.subscribe(collector.clone());

        let gate = CapabilityManager::with_events(events);
        let ctx = gate.create_context();
        let _ = gate.invoke(&registry, "math", "sqrt", ctx, &[Value::Int(4)]);

        let checks = collector.events_of("capability_checked");
        let denied = checks.iter().find(|e| {
            matches!(e, RuntimeEvent::CapabilityChecked { permitted: false, .. })
        });
        match denied {
            Some(RuntimeEvent::CapabilityChecked { missing, .. }) => {
                assert_eq!(missing, &vec![cap("execute:calculations")]);
            }
            _ => panic!("expected a denial event"),
        }
        assert!(collector.events_of("function_invoked").is_empty());
    }

    #[test]
    fn test_concurrent_contexts() {
        let registry = Arc::new(registry());
        let gate = Arc::new(CapabilityManager::new());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                let gate = Arc::clone(&gate);
                std::thread::spawn(move || {
                    let ctx = gate.create_context();
                    if i % 2 == 0 {
                        gate.grant(ctx, cap("execute:calculations")).unwrap();
                    }
                    let result = gate.invoke(registry.as_ref(), "math", "sqrt", ctx, &[Value::Int(25)]);
                    assert_eq!(result.is_ok(), i % 2 == 0);
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }
}
