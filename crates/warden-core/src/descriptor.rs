//! Module and function descriptors.
//!
//! Descriptors are created by the declarative registration layer and are
//! immutable afterwards. A [`FunctionDescriptor`]'s callable is private to
//! this crate: the only way to run it is through the authorization gate.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use warden_capability::CapabilitySet;

use crate::error::NativeResult;
use crate::gate::CallFrame;
use crate::signature::Signature;
use crate::value::Value;

/// A native implementation of a bridged function.
///
/// Arguments have already been checked against the function's signature
/// when the implementation runs.
pub type NativeFn = Arc<dyn Fn(&CallFrame<'_>, &[Value]) -> NativeResult<Value> + Send + Sync>;

/// Registered metadata for one exposed function.
#[derive(Clone)]
pub struct FunctionDescriptor {
    module: String,
    name: String,
    required: CapabilitySet,
    signature: Signature,
    doc: String,
    callable: NativeFn,
}

impl FunctionDescriptor {
    pub(crate) fn new(
        module: String,
        name: String,
        required: CapabilitySet,
        signature: Signature,
        doc: String,
        callable: NativeFn,
    ) -> Self {
        Self {
            module,
            name,
            required,
            signature,
            doc,
            callable,
        }
    }

    /// The owning module's name.
    pub fn module(&self) -> &str {
        &self.module
    }

    /// The exposed function name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `module.name`.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.module, self.name)
    }

    /// Capabilities a caller must hold to invoke this function.
    pub fn required_capabilities(&self) -> &CapabilitySet {
        &self.required
    }

    /// The parameter signature and return type.
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Documentation string supplied at registration.
    pub fn doc(&self) -> &str {
        &self.doc
    }

    pub(crate) fn callable(&self) -> &NativeFn {
        &self.callable
    }
}

impl fmt::Debug for FunctionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDescriptor")
            .field("module", &self.module)
            .field("name", &self.name)
            .field("required", &self.required)
            .field("signature", &self.signature.render(&self.name))
            .finish()
    }
}

/// A named constant exported by a module.
#[derive(Debug, Clone, PartialEq)]
pub struct Constant {
    /// Constant name.
    pub name: String,
    /// Its value.
    pub value: Value,
    /// Documentation.
    pub doc: String,
}

/// The kind of a module member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberKind {
    /// A bridged function.
    Function,
    /// A constant.
    Constant,
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberKind::Function => write!(f, "function"),
            MemberKind::Constant => write!(f, "constant"),
        }
    }
}

/// One member of a module.
#[derive(Debug, Clone)]
pub enum Member {
    /// A bridged function.
    Function(FunctionDescriptor),
    /// A constant.
    Constant(Constant),
}

impl Member {
    /// The member name.
    pub fn name(&self) -> &str {
        match self {
            Member::Function(f) => f.name(),
            Member::Constant(c) => &c.name,
        }
    }

    /// The member documentation.
    pub fn doc(&self) -> &str {
        match self {
            Member::Function(f) => f.doc(),
            Member::Constant(c) => &c.doc,
        }
    }

    /// Function or constant.
    pub fn kind(&self) -> MemberKind {
        match self {
            Member::Function(_) => MemberKind::Function,
            Member::Constant(_) => MemberKind::Constant,
        }
    }

    /// Get the function descriptor, if this is a function.
    pub fn as_function(&self) -> Option<&FunctionDescriptor> {
        match self {
            Member::Function(f) => Some(f),
            Member::Constant(_) => None,
        }
    }

    /// Metadata view of this member.
    pub fn info(&self) -> MemberInfo {
        let (signature, required_capabilities) = match self {
            Member::Function(f) => (
                Some(f.signature().render(f.name())),
                f.required_capabilities()
                    .iter()
                    .map(ToString::to_string)
                    .collect(),
            ),
            Member::Constant(_) => (None, Vec::new()),
        };
        MemberInfo {
            name: self.name().to_string(),
            kind: self.kind(),
            signature,
            doc: self.doc().to_string(),
            required_capabilities,
        }
    }
}

/// Serializable metadata for one member, as returned by listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberInfo {
    /// Member name.
    pub name: String,
    /// Function or constant.
    pub kind: MemberKind,
    /// Rendered signature for functions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    /// Documentation.
    pub doc: String,
    /// Required capabilities for functions.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub required_capabilities: Vec<String>,
}

/// Registered metadata for one module.
#[derive(Debug, Clone)]
pub struct ModuleDescriptor {
    name: String,
    version: String,
    doc: String,
    required: CapabilitySet,
    members: BTreeMap<String, Member>,
}

impl ModuleDescriptor {
    pub(crate) fn new(
        name: String,
        version: String,
        doc: String,
        required: CapabilitySet,
        members: BTreeMap<String, Member>,
    ) -> Self {
        Self {
            name,
            version,
            doc,
            required,
            members,
        }
    }

    /// The module name (its registry key).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The module version.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Module documentation.
    pub fn doc(&self) -> &str {
        &self.doc
    }

    /// Capabilities needed to import this module.
    pub fn required_capabilities(&self) -> &CapabilitySet {
        &self.required
    }

    /// Look up a member by name.
    pub fn member(&self, name: &str) -> Option<&Member> {
        self.members.get(name)
    }

    /// Look up a function member by name.
    pub fn function(&self, name: &str) -> Option<&FunctionDescriptor> {
        self.members.get(name).and_then(Member::as_function)
    }

    /// Iterate over members in name order.
    pub fn members(&self) -> impl Iterator<Item = &Member> {
        self.members.values()
    }

    /// Member names, sorted.
    pub fn member_names(&self) -> Vec<String> {
        self.members.keys().cloned().collect()
    }

    /// Metadata for every member, sorted by name.
    pub fn member_info(&self) -> Vec<MemberInfo> {
        self.members.values().map(Member::info).collect()
    }
}
