//! Introspection over registered module metadata.
//!
//! Everything here is read from [`ModuleDescriptor`] members. Introspection
//! never hands out a callable: [`Introspector::get_attr`] returns a
//! [`Value::Function`] reference, and [`Introspector::call_dynamic`] goes
//! through the gate like any other call.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use warden_capability::ContextId;

use crate::descriptor::{Member, MemberKind, ModuleDescriptor};
use crate::error::{AttributeError, InvokeResult};
use crate::gate::CapabilityManager;
use crate::registry::ModuleCatalog;
use crate::value::{FunctionRef, Value};

/// Documentation and signature for a module or one of its members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Info {
    /// Qualified name: `module` or `module.member`.
    pub name: String,
    /// `module`, `function` or `constant`.
    pub kind: String,
    /// Module version, for modules.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Rendered signature, for functions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    /// Documentation.
    pub doc: String,
    /// Capabilities needed to import the module or call the function.
    pub required_capabilities: Vec<String>,
}

impl Info {
    fn module(module: &ModuleDescriptor) -> Self {
        Self {
            name: module.name().to_string(),
            kind: "module".to_string(),
            version: Some(module.version().to_string()),
            signature: None,
            doc: module.doc().to_string(),
            required_capabilities: module
                .required_capabilities()
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }

    fn member(module: &ModuleDescriptor, member: &Member) -> Self {
        let info = member.info();
        Self {
            name: format!("{}.{}", module.name(), info.name),
            kind: info.kind.to_string(),
            version: None,
            signature: info.signature,
            doc: info.doc,
            required_capabilities: info.required_capabilities,
        }
    }
}

impl fmt::Display for Info {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.signature, &self.version) {
            (Some(signature), _) => write!(f, "{}", signature)?,
            (None, Some(version)) => write!(f, "{} {} ({})", self.kind, self.name, version)?,
            (None, None) => write!(f, "{} {}", self.kind, self.name)?,
        }
        if !self.required_capabilities.is_empty() {
            write!(f, "\n  requires: {}", self.required_capabilities.join(", "))?;
        }
        if !self.doc.is_empty() {
            write!(f, "\n  {}", self.doc)?;
        }
        Ok(())
    }
}

/// Metadata-only view over a module catalog.
#[derive(Clone, Copy)]
pub struct Introspector<'a> {
    catalog: &'a dyn ModuleCatalog,
}

impl<'a> Introspector<'a> {
    /// Create an introspector over `catalog`.
    pub fn new(catalog: &'a dyn ModuleCatalog) -> Self {
        Self { catalog }
    }

    fn module(&self, module: &str) -> Result<Arc<ModuleDescriptor>, AttributeError> {
        self.catalog
            .module(module)
            .ok_or_else(|| AttributeError::NoSuchModule(module.to_string()))
    }

    /// Sorted member names of a module.
    pub fn dir(&self, module: &str) -> Result<Vec<String>, AttributeError> {
        Ok(self.module(module)?.member_names())
    }

    /// Documentation for a module, or for one member when `member` is given.
    pub fn info(&self, module: &str, member: Option<&str>) -> Result<Info, AttributeError> {
        let descriptor = self.module(module)?;
        match member {
            None => Ok(Info::module(&descriptor)),
            Some(name) => descriptor
                .member(name)
                .map(|m| Info::member(&descriptor, m))
                .ok_or_else(|| AttributeError::NoSuchMember {
                    module: module.to_string(),
                    member: name.to_string(),
                }),
        }
    }

    /// Whether the module has a member named `member`.
    ///
    /// An unknown module is an error, not `false`.
    pub fn has_attr(&self, module: &str, member: &str) -> Result<bool, AttributeError> {
        Ok(self.module(module)?.member(member).is_some())
    }

    /// A constant's value, or a reference to a function.
    pub fn get_attr(&self, module: &str, member: &str) -> Result<Value, AttributeError> {
        let descriptor = self.module(module)?;
        match descriptor.member(member) {
            Some(Member::Constant(c)) => Ok(c.value.clone()),
            Some(Member::Function(f)) => Ok(Value::Function(FunctionRef::new(f.module(), f.name()))),
            None => Err(AttributeError::NoSuchMember {
                module: module.to_string(),
                member: member.to_string(),
            }),
        }
    }

    /// The kind of a member, if it exists.
    pub fn kind_of(&self, module: &str, member: &str) -> Result<MemberKind, AttributeError> {
        self.module(module)?
            .member(member)
            .map(Member::kind)
            .ok_or_else(|| AttributeError::NoSuchMember {
                module: module.to_string(),
                member: member.to_string(),
            })
    }

    /// Call a function by name. Authorized by `gate` exactly like a direct
    /// call.
    pub fn call_dynamic(
        &self,
        gate: &CapabilityManager,
        module: &str,
        function: &str,
        context: ContextId,
        args: &[Value],
    ) -> InvokeResult<Value> {
        gate.invoke(self.catalog, module, function, context, args)
    }
}

impl fmt::Debug for Introspector<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Introspector")
            .field("modules", &self.catalog.module_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declare::{FunctionDeclaration, ModuleDeclaration};
    use crate::error::InvokeError;
    use crate::registry::Registry;
    use warden_capability::{Capability, CapabilityError};

    fn registry() -> Registry {
        let registry = Registry::new();
        registry
            .register(
                ModuleDeclaration::new("math")
                    .version("2.0.0")
                    .doc("Numbers.")
                    .constant("pi", std::f64::consts::PI, "Circle constant.")
                    .function(
                        FunctionDeclaration::new("sqrt", |_, args| {
                            Ok(Value::Float(args[0].as_number().unwrap_or(f64::NAN).sqrt()))
                        })
                        .param("x", "number")
                        .returns("float")
                        .requires("execute:calculations")
                        .doc("Square root."),
                    )
                    .build()
                    .unwrap(),
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_dir_is_sorted() {
        let registry = registry();
        let introspect = Introspector::new(&registry);
        assert_eq!(introspect.dir("math").unwrap(), vec!["pi", "sqrt"]);
        assert!(matches!(
            introspect.dir("nope"),
            Err(AttributeError::NoSuchModule(_))
        ));
    }

    #[test]
    fn test_info() {
        let registry = registry();
        let introspect = Introspector::new(&registry);

        let module = introspect.info("math", None).unwrap();
        assert_eq!(module.kind, "module");
        assert_eq!(module.version.as_deref(), Some("2.0.0"));
        assert_eq!(module.doc, "Numbers.");

        let sqrt = introspect.info("math", Some("sqrt")).unwrap();
        assert_eq!(sqrt.name, "math.sqrt");
        assert_eq!(sqrt.signature.as_deref(), Some("sqrt(x: number) -> float"));
        assert_eq!(sqrt.required_capabilities, vec!["execute:calculations"]);
        assert!(sqrt.to_string().contains("Square root."));

        assert!(matches!(
            introspect.info("math", Some("cbrt")),
            Err(AttributeError::NoSuchMember { .. })
        ));
    }

    #[test]
    fn test_has_and_get_attr() {
        let registry = registry();
        let introspect = Introspector::new(&registry);

        assert!(introspect.has_attr("math", "pi").unwrap());
        assert!(!introspect.has_attr("math", "tau").unwrap());
        assert!(introspect.has_attr("nope", "pi").is_err());

        assert_eq!(
            introspect.get_attr("math", "pi").unwrap(),
            Value::Float(std::f64::consts::PI)
        );
        assert_eq!(
            introspect.get_attr("math", "sqrt").unwrap(),
            Value::Function(FunctionRef::new("math", "sqrt"))
        );
        assert_eq!(introspect.kind_of("math", "pi").unwrap(), MemberKind::Constant);
    }

    #[test]
    fn test_call_dynamic_is_authorized() {
        let registry = registry();
        let gate = CapabilityManager::new();
        let ctx = gate.create_context();
        let introspect = Introspector::new(&registry);

        let err = introspect
            .call_dynamic(&gate, "math", "sqrt", ctx, &[Value::Int(16)])
            .unwrap_err();
        assert!(matches!(
            err,
            InvokeError::Capability(CapabilityError::Missing { .. })
        ));

        gate.grant(ctx, Capability::parse("execute:calculations").unwrap())
            .unwrap();
        assert_eq!(
            introspect
                .call_dynamic(&gate, "math", "sqrt", ctx, &[Value::Int(16)])
                .unwrap(),
            Value::Float(4.0)
        );
    }
}
