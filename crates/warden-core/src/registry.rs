//! The module descriptor registry.
//!
//! The registry has two phases. While open, modules are added with
//! [`Registry::register`] or [`Registry::load`]. [`Registry::seal`]
//! publishes the table once through a `OnceLock`; from then on every
//! registration fails and lookups read the published table without taking
//! a lock.

use std::any::{TypeId, type_name};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use warden_observe::{EventDispatcher, RuntimeEvent};

use crate::declare::ModuleUnit;
use crate::descriptor::{MemberInfo, ModuleDescriptor};
use crate::error::{AttributeError, RegistrationError, RegistrationResult};

type ModuleTable = BTreeMap<String, Arc<ModuleDescriptor>>;

/// Read access to a set of modules by name.
///
/// Implemented by [`Registry`] and by anything that layers additional
/// module sources over it. Introspection and the call frame only ever see
/// modules through this trait.
pub trait ModuleCatalog: Send + Sync {
    /// Look up a module by name.
    fn module(&self, name: &str) -> Option<Arc<ModuleDescriptor>>;

    /// All module names, sorted.
    fn module_names(&self) -> Vec<String>;
}

#[derive(Default)]
struct OpenState {
    modules: ModuleTable,
    loaded_units: HashSet<TypeId>,
}

/// Process-wide table of module descriptors.
///
/// Module names are unique. A failed registration leaves the table
/// unchanged.
#[derive(Default)]
pub struct Registry {
    open: Mutex<OpenState>,
    sealed: OnceLock<Arc<ModuleTable>>,
    events: Option<Arc<EventDispatcher>>,
}

impl Registry {
    /// Create an empty, open registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty, open registry that reports to `events`.
    pub fn with_events(events: Arc<EventDispatcher>) -> Self {
        Self {
            events: Some(events),
            ..Self::default()
        }
    }

    /// Register a descriptor.
    ///
    /// # Errors
    ///
    /// Fails if the registry is sealed or the name is taken.
    pub fn register(&self, descriptor: ModuleDescriptor) -> RegistrationResult<Arc<ModuleDescriptor>> {
        let registered = {
            let mut state = self.open.lock();
            self.insert_locked(&mut state, descriptor)?
        };
        self.announce(&registered);
        Ok(registered)
    }

    /// Load a module unit, registering the module it declares.
    ///
    /// Each unit type may be loaded once per registry. Loading it again is
    /// an error, not a no-op.
    pub fn load<U: ModuleUnit>(&self) -> RegistrationResult<Arc<ModuleDescriptor>> {
        let unit = TypeId::of::<U>();
        let declaration = U::declare();

        let mut state = self.open.lock();
        if self.is_sealed() {
            warn!(module = declaration.name(), "Rejected load into sealed registry");
            return Err(RegistrationError::Sealed(declaration.name().to_string()));
        }
        if state.loaded_units.contains(&unit) {
            warn!(unit = type_name::<U>(), "Module unit loaded twice");
            return Err(RegistrationError::UnitAlreadyLoaded(type_name::<U>()));
        }

        let descriptor = declaration.build()?;
        let registered = self.insert_locked(&mut state, descriptor)?;
        state.loaded_units.insert(unit);
        drop(state);

        self.announce(&registered);
        Ok(registered)
    }

    fn insert_locked(
        &self,
        state: &mut OpenState,
        descriptor: ModuleDescriptor,
    ) -> RegistrationResult<Arc<ModuleDescriptor>> {
        let name = descriptor.name().to_string();

        if self.is_sealed() {
            warn!(module = %name, "Rejected registration into sealed registry");
            return Err(RegistrationError::Sealed(name));
        }
        if state.modules.contains_key(&name) {
            warn!(module = %name, "Duplicate module registration");
            return Err(RegistrationError::DuplicateModule(name));
        }

        let descriptor = Arc::new(descriptor);
        state.modules.insert(name, Arc::clone(&descriptor));
        Ok(descriptor)
    }

    fn announce(&self, descriptor: &ModuleDescriptor) {
        let members = descriptor.member_names().len();
        info!(
            module = descriptor.name(),
            version = descriptor.version(),
            members,
            "Module registered"
        );
        self.emit(RuntimeEvent::ModuleRegistered {
            name: descriptor.name().to_string(),
            version: descriptor.version().to_string(),
            members,
        });
    }

    /// Seal the registry. This happens exactly once.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::AlreadySealed`] on every call after the
    /// first.
    pub fn seal(&self) -> RegistrationResult<()> {
        let state = self.open.lock();
        let table = Arc::new(state.modules.clone());
        let modules = table.len();

        self.sealed
            .set(table)
            .map_err(|_| RegistrationError::AlreadySealed)?;
        drop(state);

        info!(modules, "Registry sealed");
        self.emit(RuntimeEvent::RegistrySealed { modules });
        Ok(())
    }

    /// Check whether the registry has been sealed.
    pub fn is_sealed(&self) -> bool {
        self.sealed.get().is_some()
    }

    /// Look up a module by name.
    pub fn lookup(&self, name: &str) -> Option<Arc<ModuleDescriptor>> {
        let found = match self.sealed.get() {
            Some(table) => table.get(name).cloned(),
            None => self.open.lock().modules.get(name).cloned(),
        };
        debug!(module = name, found = found.is_some(), "Registry lookup");
        found
    }

    /// Check whether a module is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// All module names, sorted.
    pub fn list_modules(&self) -> Vec<String> {
        match self.sealed.get() {
            Some(table) => table.keys().cloned().collect(),
            None => self.open.lock().modules.keys().cloned().collect(),
        }
    }

    /// Metadata for every member of a module, sorted by name.
    pub fn list_members(&self, module: &str) -> Result<Vec<MemberInfo>, AttributeError> {
        self.lookup(module)
            .map(|m| m.member_info())
            .ok_or_else(|| AttributeError::NoSuchModule(module.to_string()))
    }

    /// Number of registered modules.
    pub fn len(&self) -> usize {
        match self.sealed.get() {
            Some(table) => table.len(),
            None => self.open.lock().modules.len(),
        }
    }

    /// Check if no modules are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn emit(&self, event: RuntimeEvent) {
        if let Some(events) = &self.events {
            events.emit(event);
        }
    }
}

impl ModuleCatalog for Registry {
    fn module(&self, name: &str) -> Option<Arc<ModuleDescriptor>> {
        self.lookup(name)
    }

    fn module_names(&self) -> Vec<String> {
        self.list_modules()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("modules", &self.list_modules())
            .field("sealed", &self.is_sealed())
            .finish()
    }
}

/// The process-wide registry.
///
/// Hosts load their module units into it during start-up and then seal it.
pub fn global() -> &'static Arc<Registry> {
    static GLOBAL: OnceLock<Arc<Registry>> = OnceLock::new();
    GLOBAL.get_or_init(|| Arc::new(Registry::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declare::{FunctionDeclaration, ModuleDeclaration};
    use warden_observe::CollectingSubscriber;

    struct Util;

    impl ModuleUnit for Util {
        fn declare() -> ModuleDeclaration {
            ModuleDeclaration::new("util")
                .function(
                    FunctionDeclaration::new("identity", |_, args| Ok(args[0].clone()))
                        .param("x", "any"),
                )
        }
    }

    struct ShadowUtil;

    impl ModuleUnit for ShadowUtil {
        fn declare() -> ModuleDeclaration {
            ModuleDeclaration::new("util").constant("evil", true, "Shadows the trusted util.")
        }
    }

    fn module(name: &str) -> ModuleDescriptor {
        ModuleDeclaration::new(name).build().unwrap()
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = Registry::new();
        registry.register(module("math")).unwrap();

        assert!(registry.contains("math"));
        assert!(registry.lookup("nope").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_name_rejected_and_first_kept() {
        let registry = Registry::new();
        registry.load::<Util>().unwrap();

        let err = registry.load::<ShadowUtil>().unwrap_err();
        assert_eq!(err, RegistrationError::DuplicateModule("util".to_string()));

        let util = registry.lookup("util").unwrap();
        assert!(util.function("identity").is_some());
        assert!(util.member("evil").is_none());
    }

    #[test]
    fn test_same_unit_loaded_twice() {
        let registry = Registry::new();
        registry.load::<Util>().unwrap();

        let err = registry.load::<Util>().unwrap_err();
        assert!(matches!(err, RegistrationError::UnitAlreadyLoaded(_)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_seal_rejects_registration() {
        let registry = Registry::new();
        registry.load::<Util>().unwrap();
        registry.seal().unwrap();

        let before = registry.list_modules();
        let err = registry.register(module("late")).unwrap_err();
        assert_eq!(err, RegistrationError::Sealed("late".to_string()));
        assert!(err.to_string().starts_with("Registry sealed"));
        assert_eq!(registry.list_modules(), before);

        assert!(registry.lookup("util").is_some());
        assert!(registry.lookup("late").is_none());
    }

    #[test]
    fn test_seal_rejects_load() {
        let registry = Registry::new();
        registry.seal().unwrap();

        let err = registry.load::<Util>().unwrap_err();
        assert_eq!(err, RegistrationError::Sealed("util".to_string()));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_seal_happens_once() {
        let registry = Registry::new();
        assert!(!registry.is_sealed());
        registry.seal().unwrap();
        assert!(registry.is_sealed());
        assert_eq!(registry.seal().unwrap_err(), RegistrationError::AlreadySealed);
    }

    #[test]
    fn test_listings_are_sorted() {
        let registry = Registry::new();
        for name in ["zeta", "alpha", "mid"] {
            registry.register(module(name)).unwrap();
        }
        assert_eq!(registry.list_modules(), vec!["alpha", "mid", "zeta"]);

        registry.load::<Util>().unwrap();
        let members = registry.list_members("util").unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].name, "identity");
        assert!(matches!(
            registry.list_members("missing"),
            Err(AttributeError::NoSuchModule(_))
        ));
    }

    #[test]
    fn test_lookup_after_seal_shares_descriptor() {
        let registry = Registry::new();
        let registered = registry.register(module("math")).unwrap();
        registry.seal().unwrap();

        let looked_up = registry.lookup("math").unwrap();
        assert!(Arc::ptr_eq(&registered, &looked_up));
    }

    #[test]
    fn test_emits_events() {
        let events = Arc::new(EventDispatcher::new());
        let collector = Arc::new(CollectingSubscriber::new(16));
        events.subscribe(collector.clone());

        let registry = Registry::with_events(events);
        registry.register(module("math")).unwrap();
        registry.seal().unwrap();

        assert_eq!(collector.events_of("module_registered").len(), 1);
        assert_eq!(collector.events_of("registry_sealed").len(), 1);
    }

    #[test]
    fn test_concurrent_lookups_after_seal() {
        let registry = Arc::new(Registry::new());
        registry.load::<Util>().unwrap();
        registry.seal().unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        assert!(registry.lookup("util").is_some());
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn test_global_is_process_wide() {
        let first = global();
        let second = std::thread::spawn(|| Arc::clone(global())).join().unwrap();
        assert!(Arc::ptr_eq(first, &second));
    }
}
