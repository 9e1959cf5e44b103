//! Declarative registration layer.
//!
//! Module authors describe a module once, as data, and the registry turns
//! that description into descriptors. A unit of host code becomes a module
//! by implementing [`ModuleUnit`]:
//!
//! ```
//! use warden_core::declare::{FunctionDeclaration, ModuleDeclaration, ModuleUnit};
//! use warden_core::{Registry, Value};
//!
//! struct Greeting;
//!
//! impl ModuleUnit for Greeting {
//!     fn declare() -> ModuleDeclaration {
//!         ModuleDeclaration::new("greeting")
//!             .version("0.2.0")
//!             .doc("Friendly words.")
//!             .constant("default_name", Value::from("world"), "Who to greet by default.")
//!             .function(
//!                 FunctionDeclaration::new("hello", |_, args| {
//!                     let name = args[0].as_str().unwrap_or_default();
//!                     Ok(Value::from(format!("hello, {name}")))
//!                 })
//!                 .param("name", "str")
//!                 .returns("str")
//!                 .doc("Greet someone."),
//!             )
//!     }
//! }
//!
//! let registry = Registry::new();
//! registry.load::<Greeting>().unwrap();
//! assert!(registry.load::<Greeting>().is_err());
//! ```

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::sync::Arc;

use warden_capability::{Capability, CapabilitySet};

use crate::descriptor::{Constant, FunctionDescriptor, Member, ModuleDescriptor, NativeFn};
use crate::error::{NativeResult, RegistrationError, RegistrationResult};
use crate::gate::CallFrame;
use crate::signature::{Param, Signature, TypeTag};
use crate::value::Value;

/// Version assigned when a declaration does not specify one.
pub const DEFAULT_VERSION: &str = "1.0.0";

/// A unit of host code that exposes one module.
///
/// The registry calls [`declare`](ModuleUnit::declare) exactly once, when
/// the unit is loaded with [`Registry::load`](crate::Registry::load).
pub trait ModuleUnit: 'static {
    /// Describe the module this unit exposes.
    fn declare() -> ModuleDeclaration;
}

/// Check that `s` is an identifier: `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Check that `s` is a dotted module name: identifiers joined by `.`.
pub fn is_module_name(s: &str) -> bool {
    s.split('.').all(is_identifier)
}

/// A declared constant.
#[derive(Debug, Clone)]
struct ConstantDeclaration {
    name: String,
    value: Value,
    doc: String,
}

enum MemberDeclaration {
    Function(FunctionDeclaration),
    Constant(ConstantDeclaration),
}

/// Declarative description of a module.
pub struct ModuleDeclaration {
    name: String,
    version: String,
    doc: String,
    requires: Vec<String>,
    members: Vec<MemberDeclaration>,
}

impl ModuleDeclaration {
    /// Start a declaration for the module `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: DEFAULT_VERSION.to_string(),
            doc: String::new(),
            requires: Vec::new(),
            members: Vec::new(),
        }
    }

    /// The declared module name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set the version.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Set the module documentation.
    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = doc.into();
        self
    }

    /// Require a capability to import the module.
    pub fn requires(mut self, capability: impl Into<String>) -> Self {
        self.requires.push(capability.into());
        self
    }

    /// Add a constant.
    pub fn constant(
        mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
        doc: impl Into<String>,
    ) -> Self {
        self.members.push(MemberDeclaration::Constant(ConstantDeclaration {
            name: name.into(),
            value: value.into(),
            doc: doc.into(),
        }));
        self
    }

    /// Add a function.
    pub fn function(mut self, function: FunctionDeclaration) -> Self {
        self.members.push(MemberDeclaration::Function(function));
        self
    }

    /// Validate the declaration and produce a descriptor.
    pub fn build(self) -> RegistrationResult<ModuleDescriptor> {
        let module = self.name;

        if !is_module_name(&module) {
            return Err(RegistrationError::InvalidName {
                kind: "module",
                name: module.clone(),
                module,
            });
        }
        if self.version.is_empty() || self.version.chars().any(char::is_whitespace) {
            return Err(RegistrationError::InvalidVersion {
                module,
                version: self.version,
            });
        }

        let required = parse_capabilities(&self.requires, &module)?;

        let mut members = BTreeMap::new();
        for declaration in self.members {
            let member = match declaration {
                MemberDeclaration::Constant(c) => {
                    check_member_name(&module, &c.name)?;
                    Member::Constant(Constant {
                        name: c.name,
                        value: c.value,
                        doc: c.doc,
                    })
                }
                MemberDeclaration::Function(f) => Member::Function(f.build(&module)?),
            };

            match members.entry(member.name().to_string()) {
                Entry::Occupied(entry) => {
                    return Err(RegistrationError::DuplicateMember {
                        module,
                        member: entry.key().clone(),
                    });
                }
                Entry::Vacant(entry) => {
                    entry.insert(member);
                }
            }
        }

        Ok(ModuleDescriptor::new(
            module,
            self.version,
            self.doc,
            required,
            members,
        ))
    }
}

impl std::fmt::Debug for ModuleDeclaration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleDeclaration")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("members", &self.members.len())
            .finish()
    }
}

/// Declarative description of one bridged function.
pub struct FunctionDeclaration {
    name: String,
    params: Vec<(String, String, bool)>,
    returns: String,
    requires: Vec<String>,
    doc: String,
    callable: NativeFn,
}

impl FunctionDeclaration {
    /// Declare a function backed by `implementation`.
    pub fn new<F>(name: impl Into<String>, implementation: F) -> Self
    where
        F: Fn(&CallFrame<'_>, &[Value]) -> NativeResult<Value> + Send + Sync + 'static,
    {
        Self::from_native(name, Arc::new(implementation))
    }

    /// Declare a function backed by an already-shared implementation.
    pub fn from_native(name: impl Into<String>, callable: NativeFn) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            returns: TypeTag::Any.as_str().to_string(),
            requires: Vec::new(),
            doc: String::new(),
            callable,
        }
    }

    /// Append a positional parameter of type `ty` (e.g. `"int"`, `"number"`).
    pub fn param(mut self, name: impl Into<String>, ty: impl Into<String>) -> Self {
        self.params.push((name.into(), ty.into(), false));
        self
    }

    /// Append a variadic parameter absorbing the remaining arguments.
    pub fn variadic(mut self, name: impl Into<String>, ty: impl Into<String>) -> Self {
        self.params.push((name.into(), ty.into(), true));
        self
    }

    /// Set the return type.
    pub fn returns(mut self, ty: impl Into<String>) -> Self {
        self.returns = ty.into();
        self
    }

    /// Require a capability to call the function.
    pub fn requires(mut self, capability: impl Into<String>) -> Self {
        self.requires.push(capability.into());
        self
    }

    /// Set the documentation.
    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = doc.into();
        self
    }

    fn build(self, module: &str) -> RegistrationResult<FunctionDescriptor> {
        check_member_name(module, &self.name)?;

        let invalid = |reason: String| RegistrationError::InvalidSignature {
            module: module.to_string(),
            function: self.name.clone(),
            reason,
        };

        let mut params = Vec::with_capacity(self.params.len());
        for (name, ty, variadic) in &self.params {
            if !is_identifier(name) {
                return Err(RegistrationError::InvalidName {
                    module: module.to_string(),
                    kind: "parameter",
                    name: name.clone(),
                });
            }
            let ty: TypeTag = ty
                .parse()
                .map_err(|e| invalid(format!("parameter '{}': {}", name, e)))?;
            params.push(Param {
                name: name.clone(),
                ty,
                variadic: *variadic,
            });
        }
        let returns: TypeTag = self
            .returns
            .parse()
            .map_err(|e| invalid(format!("return type: {}", e)))?;
        let signature = Signature::new(params, returns).map_err(invalid)?;

        let required = parse_capabilities(&self.requires, &format!("{}.{}", module, self.name))?;

        Ok(FunctionDescriptor::new(
            module.to_string(),
            self.name,
            required,
            signature,
            self.doc,
            self.callable,
        ))
    }
}

impl std::fmt::Debug for FunctionDeclaration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionDeclaration")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("returns", &self.returns)
            .field("requires", &self.requires)
            .finish()
    }
}

fn check_member_name(module: &str, name: &str) -> RegistrationResult<()> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(RegistrationError::InvalidName {
            module: module.to_string(),
            kind: "member",
            name: name.to_string(),
        })
    }
}

fn parse_capabilities(tokens: &[String], location: &str) -> RegistrationResult<CapabilitySet> {
    tokens
        .iter()
        .map(|token| {
            Capability::parse(token.clone()).map_err(|source| {
                RegistrationError::MalformedCapability {
                    location: location.to_string(),
                    source,
                }
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> FunctionDeclaration {
        FunctionDeclaration::new("noop", |_, _| Ok(Value::Nil))
    }

    #[test]
    fn test_identifiers() {
        assert!(is_identifier("sqrt"));
        assert!(is_identifier("_private2"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("2fast"));
        assert!(!is_identifier("a-b"));
        assert!(is_module_name("pkg.tools"));
        assert!(!is_module_name("pkg..tools"));
        assert!(!is_module_name("../etc"));
    }

    #[test]
    fn test_build_defaults() {
        let module = ModuleDeclaration::new("util").function(noop()).build().unwrap();

        assert_eq!(module.name(), "util");
        assert_eq!(module.version(), DEFAULT_VERSION);
        assert!(module.required_capabilities().is_empty());

        let noop = module.function("noop").unwrap();
        assert_eq!(noop.signature().render("noop"), "noop() -> any");
    }

    #[test]
    fn test_build_full() {
        let module = ModuleDeclaration::new("math")
            .version("2.1.0")
            .doc("Numbers.")
            .requires("execute:basic")
            .constant("pi", std::f64::consts::PI, "Ratio of circumference to diameter.")
            .function(
                FunctionDeclaration::new("sqrt", |_, _| Ok(Value::Nil))
                    .param("x", "number")
                    .returns("float")
                    .requires("execute:calculations")
                    .doc("Square root."),
            )
            .build()
            .unwrap();

        assert_eq!(module.member_names(), vec!["pi", "sqrt"]);
        let sqrt = module.function("sqrt").unwrap();
        assert_eq!(sqrt.doc(), "Square root.");
        assert_eq!(sqrt.qualified_name(), "math.sqrt");
        assert!(sqrt
            .required_capabilities()
            .has(&Capability::parse("execute:calculations").unwrap()));
        assert!(module.function("pi").is_none());
    }

    #[test]
    fn test_rejects_invalid_names() {
        let err = ModuleDeclaration::new("bad name").build().unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidName { kind: "module", .. }));

        let err = ModuleDeclaration::new("m")
            .function(FunctionDeclaration::new("not-valid", |_, _| Ok(Value::Nil)))
            .build()
            .unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidName { kind: "member", .. }));

        let err = ModuleDeclaration::new("m")
            .function(noop().param("x y", "int"))
            .build()
            .unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidName { kind: "parameter", .. }));
    }

    #[test]
    fn test_rejects_bad_version() {
        let err = ModuleDeclaration::new("m").version("").build().unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidVersion { .. }));
    }

    #[test]
    fn test_rejects_duplicate_members() {
        let err = ModuleDeclaration::new("m")
            .constant("noop", 1i64, "")
            .function(noop())
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            RegistrationError::DuplicateMember {
                module: "m".to_string(),
                member: "noop".to_string(),
            }
        );
    }

    #[test]
    fn test_rejects_unrepresentable_signature() {
        for declaration in [
            noop().param("x", "complex"),
            noop().returns("tuple"),
            noop().param("x", "int").param("x", "int"),
            noop().variadic("rest", "any").param("last", "int"),
        ] {
            let err = ModuleDeclaration::new("m")
                .function(declaration)
                .build()
                .unwrap_err();
            assert!(
                matches!(err, RegistrationError::InvalidSignature { .. }),
                "unexpected error: {err}"
            );
        }
    }

    #[test]
    fn test_rejects_malformed_capabilities() {
        for token in ["", "calculations", "execute:*"] {
            let err = ModuleDeclaration::new("m")
                .function(noop().requires(token))
                .build()
                .unwrap_err();
            match err {
                RegistrationError::MalformedCapability { location, .. } => {
                    assert_eq!(location, "m.noop")
                }
                other => panic!("unexpected error: {other}"),
            }
        }

        let err = ModuleDeclaration::new("m").requires("nope").build().unwrap_err();
        assert!(matches!(err, RegistrationError::MalformedCapability { .. }));
    }
}
