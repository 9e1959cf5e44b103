//! Warden Core
//!
//! This crate provides the module system and the authorization gate of the
//! Warden scripting runtime.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    ModuleUnit::declare()                     │
//! │            ModuleDeclaration / FunctionDeclaration           │
//! └──────────────────────────────┬───────────────────────────────┘
//!                                │ load / register
//!                                ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                  Registry (open → sealed)                    │
//! │          name → Arc<ModuleDescriptor>, via ModuleCatalog     │
//! └───────────────┬──────────────────────────────┬───────────────┘
//!                 │ metadata                     │ descriptors
//!                 ▼                              ▼
//! ┌──────────────────────────────┐ ┌─────────────────────────────┐
//! │         Introspector         │ │      CapabilityManager      │
//! │  dir / info / has / get_attr │─▶│ check_import / check_call  │
//! │        call_dynamic ─────────┼─▶│ invoke → native callable   │
//! └──────────────────────────────┘ └─────────────────────────────┘
//! ```
//!
//! Native implementations are reachable only through
//! [`CapabilityManager::invoke`]; descriptors and introspection expose
//! metadata and function references, never callables.
//!
//! # Example
//!
//! ```
//! use warden_capability::Capability;
//! use warden_core::{CapabilityManager, FunctionDeclaration, ModuleDeclaration, Registry, Value};
//!
//! let registry = Registry::new();
//! registry
//!     .register(
//!         ModuleDeclaration::new("math")
//!             .function(
//!                 FunctionDeclaration::new("double", |_, args| {
//!                     Ok(Value::Int(args[0].as_int().unwrap_or_default() * 2))
//!                 })
//!                 .param("x", "int")
//!                 .returns("int")
//!                 .requires("execute:calculations"),
//!             )
//!             .build()
//!             .unwrap(),
//!     )
//!     .unwrap();
//! registry.seal().unwrap();
//!
//! let gate = CapabilityManager::new();
//! let ctx = gate.create_context();
//! assert!(gate.invoke(&registry, "math", "double", ctx, &[Value::Int(21)]).is_err());
//!
//! gate.grant(ctx, Capability::parse("execute:calculations").unwrap()).unwrap();
//! let result = gate.invoke(&registry, "math", "double", ctx, &[Value::Int(21)]).unwrap();
//! assert_eq!(result, Value::Int(42));
//! ```

pub mod declare;
pub mod descriptor;
pub mod error;
pub mod gate;
pub mod introspect;
pub mod manifest;
pub mod registry;
pub mod signature;
pub mod value;

// Re-export main types
pub use declare::{DEFAULT_VERSION, FunctionDeclaration, ModuleDeclaration, ModuleUnit};
pub use descriptor::{
    Constant, FunctionDescriptor, Member, MemberInfo, MemberKind, ModuleDescriptor, NativeFn,
};
pub use error::{
    AttributeError, CallError, InvokeError, InvokeResult, ManifestError, NativeError,
    NativeResult, RegistrationError, RegistrationResult,
};
pub use gate::{CallFrame, CapabilityManager};
pub use introspect::{Info, Introspector};
pub use manifest::{ConstantManifest, FunctionManifest, HostBindings, ModuleManifest, ParamManifest};
pub use registry::{ModuleCatalog, Registry, global};
pub use signature::{Param, Signature, TypeTag};
pub use value::{FunctionRef, Value};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::declare::{FunctionDeclaration, ModuleDeclaration, ModuleUnit};
    pub use crate::descriptor::ModuleDescriptor;
    pub use crate::error::{InvokeError, NativeError, NativeResult};
    pub use crate::gate::{CallFrame, CapabilityManager};
    pub use crate::introspect::Introspector;
    pub use crate::registry::{ModuleCatalog, Registry};
    pub use crate::value::Value;
}
