//! Core error types.
//!
//! The taxonomy separates "may not" from "failed": authorization failures
//! are [`CapabilityError`]s, lookups of absent members are
//! [`AttributeError`]s, and failures raised while a bridged function runs
//! (or while checking its arguments) are [`CallError`]s.

use thiserror::Error;

use warden_capability::CapabilityError;

use crate::signature::TypeTag;

/// Errors raised while registering a module.
///
/// A failed registration never modifies the registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    /// A module with this name is already registered.
    #[error("Module already registered: {0}")]
    DuplicateModule(String),

    /// The same module unit was loaded twice.
    #[error("Module unit already loaded: {0}")]
    UnitAlreadyLoaded(&'static str),

    /// Registration attempted after the registry was sealed.
    #[error("Registry sealed: cannot register module '{0}'")]
    Sealed(String),

    /// The registry was already sealed.
    #[error("Registry already sealed")]
    AlreadySealed,

    /// A module, member or parameter name is not a valid identifier.
    #[error("Invalid {kind} name '{name}' in module '{module}'")]
    InvalidName {
        /// Module being registered.
        module: String,
        /// What kind of name ("module", "member", "parameter").
        kind: &'static str,
        /// The offending name.
        name: String,
    },

    /// The version string is empty or contains whitespace.
    #[error("Invalid version '{version}' for module '{module}'")]
    InvalidVersion {
        /// Module being registered.
        module: String,
        /// The offending version.
        version: String,
    },

    /// A member name was declared twice.
    #[error("Duplicate member '{member}' in module '{module}'")]
    DuplicateMember {
        /// Module being registered.
        module: String,
        /// The repeated member name.
        member: String,
    },

    /// A function signature cannot be represented.
    #[error("Invalid signature for '{module}.{function}': {reason}")]
    InvalidSignature {
        /// Module being registered.
        module: String,
        /// The function.
        function: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A required-capability token is malformed.
    #[error("Malformed capability in '{location}': {source}")]
    MalformedCapability {
        /// `module` or `module.member`.
        location: String,
        /// The underlying token error.
        #[source]
        source: CapabilityError,
    },
}

/// Errors from introspection against absent modules or members.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttributeError {
    /// No module with this name.
    #[error("No such module: '{0}'")]
    NoSuchModule(String),

    /// The module has no member with this name.
    #[error("Module '{module}' has no attribute '{member}'")]
    NoSuchMember {
        /// Module name.
        module: String,
        /// Member name.
        member: String,
    },

    /// The member exists but is a constant, not a function.
    #[error("'{module}.{member}' is not callable")]
    NotCallable {
        /// Module name.
        module: String,
        /// Member name.
        member: String,
    },
}

/// An error raised by a native implementation.
#[derive(Debug, Error)]
pub enum NativeError {
    /// The implementation failed with a message.
    #[error("{0}")]
    Message(String),

    /// A nested bridged call made through the call frame failed.
    ///
    /// The gate re-raises the inner error unchanged, so a denial inside a
    /// dynamic call is still reported as a capability error.
    #[error(transparent)]
    Invoke(Box<InvokeError>),
}

impl NativeError {
    /// Create an error from a message.
    pub fn msg(message: impl Into<String>) -> Self {
        NativeError::Message(message.into())
    }
}

impl From<InvokeError> for NativeError {
    fn from(err: InvokeError) -> Self {
        NativeError::Invoke(Box::new(err))
    }
}

impl From<AttributeError> for NativeError {
    fn from(err: AttributeError) -> Self {
        NativeError::Invoke(Box::new(InvokeError::Attribute(err)))
    }
}

/// Errors raised while running a bridged function.
#[derive(Debug, Error)]
pub enum CallError {
    /// The implementation itself failed.
    #[error("{module}.{function} failed: {source}")]
    Failed {
        /// Module name.
        module: String,
        /// Function name.
        function: String,
        /// The implementation's error.
        #[source]
        source: NativeError,
    },

    /// Wrong number of arguments.
    #[error("{function}() takes {expected} argument(s), got {actual}")]
    Arity {
        /// Function name.
        function: String,
        /// Human-readable expected count.
        expected: String,
        /// Number supplied.
        actual: usize,
    },

    /// An argument has the wrong type.
    #[error("{function}() parameter '{parameter}' expects {expected}, got {actual}")]
    ArgumentType {
        /// Function name.
        function: String,
        /// Parameter name.
        parameter: String,
        /// Declared type.
        expected: TypeTag,
        /// Type supplied.
        actual: String,
    },
}

/// Everything an invocation can fail with.
#[derive(Debug, Error)]
pub enum InvokeError {
    /// The caller is not allowed to make this call.
    #[error(transparent)]
    Capability(#[from] CapabilityError),

    /// The target module or function does not exist.
    #[error(transparent)]
    Attribute(#[from] AttributeError),

    /// The call was allowed but failed.
    #[error(transparent)]
    Call(#[from] CallError),
}

/// Errors reading or writing module manifests.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The manifest could not be parsed.
    #[error("Failed to parse manifest: {0}")]
    Parse(String),

    /// The manifest could not be serialized.
    #[error("Failed to serialize manifest: {0}")]
    Serialize(String),

    /// A function names a host symbol that has no binding.
    #[error("Function '{function}' is bound to unknown host symbol '{symbol}'")]
    UnboundSymbol {
        /// Function name.
        function: String,
        /// The missing symbol.
        symbol: String,
    },

    /// A constant has no guest representation.
    #[error("Constant '{0}' has no guest representation")]
    InvalidConstant(String),

    /// The declared content is not registrable.
    #[error(transparent)]
    Registration(#[from] RegistrationError),
}

/// Result type for registration operations.
pub type RegistrationResult<T> = std::result::Result<T, RegistrationError>;

/// Result type for invocations.
pub type InvokeResult<T> = std::result::Result<T, InvokeError>;

/// Result type for native implementations.
pub type NativeResult<T> = std::result::Result<T, NativeError>;
