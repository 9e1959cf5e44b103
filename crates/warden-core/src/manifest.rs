//! Module manifests.
//!
//! A [`ModuleManifest`] is the stable, serializable form of a
//! [`ModuleDescriptor`]. Manifests are exported as JSON or TOML for
//! inspection, and TOML manifests on disk are how user modules are
//! declared. A manifest carries no code: every function names a host
//! symbol, and [`HostBindings`] maps those symbols to native
//! implementations supplied by the embedding host.
//!
//! ```toml
//! name = "geometry"
//! version = "0.3.0"
//! requires = ["execute:calculations"]
//!
//! [[constants]]
//! name = "unit"
//! value = 1.0
//!
//! [[functions]]
//! name = "area"
//! symbol = "host.rect_area"
//! returns = "float"
//! params = [{ name = "w", type = "number" }, { name = "h", type = "number" }]
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::declare::{DEFAULT_VERSION, FunctionDeclaration, ModuleDeclaration};
use crate::descriptor::{FunctionDescriptor, Member, ModuleDescriptor, NativeFn};
use crate::error::{ManifestError, NativeResult};
use crate::gate::CallFrame;
use crate::signature::TypeTag;
use crate::value::Value;

fn default_version() -> String {
    DEFAULT_VERSION.to_string()
}

fn default_returns() -> String {
    TypeTag::Any.as_str().to_string()
}

/// Serializable description of a module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleManifest {
    /// Module name.
    pub name: String,
    /// Module version.
    #[serde(default = "default_version")]
    pub version: String,
    /// Module documentation.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub doc: String,
    /// Capabilities needed to import the module.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<String>,
    /// Constants.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constants: Vec<ConstantManifest>,
    /// Functions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub functions: Vec<FunctionManifest>,
}

/// Serializable description of a constant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConstantManifest {
    /// Constant name.
    pub name: String,
    /// Documentation.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub doc: String,
    /// The value, in its JSON form.
    pub value: serde_json::Value,
}

/// Serializable description of a function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FunctionManifest {
    /// Function name.
    pub name: String,
    /// Host symbol implementing the function. Defaults to `module.name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    /// Documentation.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub doc: String,
    /// Capabilities needed to call the function.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<String>,
    /// Return type tag.
    #[serde(default = "default_returns")]
    pub returns: String,
    /// Parameters in order.
    #[serde(default)]
    pub params: Vec<ParamManifest>,
}

/// Serializable description of a parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParamManifest {
    /// Parameter name.
    pub name: String,
    /// Type tag.
    #[serde(rename = "type")]
    pub ty: String,
    /// Whether the parameter absorbs remaining arguments.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub variadic: bool,
}

impl ModuleManifest {
    /// Parse a TOML manifest.
    pub fn from_toml_str(s: &str) -> Result<Self, ManifestError> {
        toml::from_str(s).map_err(|e| ManifestError::Parse(e.to_string()))
    }

    /// Parse a JSON manifest.
    pub fn from_json_str(s: &str) -> Result<Self, ManifestError> {
        serde_json::from_str(s).map_err(|e| ManifestError::Parse(e.to_string()))
    }

    /// Read and parse a TOML manifest file.
    pub fn from_file(path: &Path) -> Result<Self, ManifestError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ManifestError::Parse(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&contents)
    }

    /// Render as pretty JSON.
    pub fn to_json(&self) -> Result<String, ManifestError> {
        serde_json::to_string_pretty(self).map_err(|e| ManifestError::Serialize(e.to_string()))
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> Result<String, ManifestError> {
        toml::to_string(self).map_err(|e| ManifestError::Serialize(e.to_string()))
    }

    /// Turn the manifest into a declaration, binding every function to its
    /// host symbol.
    pub fn into_declaration(self, bindings: &HostBindings) -> Result<ModuleDeclaration, ManifestError> {
        let mut declaration = ModuleDeclaration::new(self.name.clone())
            .version(self.version)
            .doc(self.doc);
        for token in self.requires {
            declaration = declaration.requires(token);
        }

        for constant in self.constants {
            declaration =
                declaration.constant(constant.name, Value::from_json(constant.value), constant.doc);
        }

        for function in self.functions {
            let symbol = function
                .symbol
                .unwrap_or_else(|| format!("{}.{}", self.name, function.name));
            let callable = bindings
                .get(&symbol)
                .cloned()
                .ok_or_else(|| ManifestError::UnboundSymbol {
                    function: function.name.clone(),
                    symbol,
                })?;

            let mut decl = FunctionDeclaration::from_native(function.name, callable)
                .returns(function.returns)
                .doc(function.doc);
            for param in function.params {
                decl = if param.variadic {
                    decl.variadic(param.name, param.ty)
                } else {
                    decl.param(param.name, param.ty)
                };
            }
            for token in function.requires {
                decl = decl.requires(token);
            }
            declaration = declaration.function(decl);
        }

        Ok(declaration)
    }

    /// Turn the manifest into a validated descriptor.
    pub fn into_descriptor(self, bindings: &HostBindings) -> Result<ModuleDescriptor, ManifestError> {
        Ok(self.into_declaration(bindings)?.build()?)
    }
}

impl FunctionDescriptor {
    /// Manifest form of this function.
    pub fn manifest(&self) -> FunctionManifest {
        FunctionManifest {
            name: self.name().to_string(),
            symbol: Some(self.qualified_name()),
            doc: self.doc().to_string(),
            requires: self
                .required_capabilities()
                .iter()
                .map(ToString::to_string)
                .collect(),
            returns: self.signature().returns().as_str().to_string(),
            params: self
                .signature()
                .params()
                .iter()
                .map(|p| ParamManifest {
                    name: p.name.clone(),
                    ty: p.ty.as_str().to_string(),
                    variadic: p.variadic,
                })
                .collect(),
        }
    }
}

impl ModuleDescriptor {
    /// Manifest form of this module.
    ///
    /// # Errors
    ///
    /// Fails if a constant has no JSON form.
    pub fn manifest(&self) -> Result<ModuleManifest, ManifestError> {
        let mut constants = Vec::new();
        let mut functions = Vec::new();
        for member in self.members() {
            match member {
                Member::Constant(c) => constants.push(ConstantManifest {
                    name: c.name.clone(),
                    doc: c.doc.clone(),
                    value: c
                        .value
                        .to_json()
                        .ok_or_else(|| ManifestError::InvalidConstant(c.name.clone()))?,
                }),
                Member::Function(f) => functions.push(f.manifest()),
            }
        }

        Ok(ModuleManifest {
            name: self.name().to_string(),
            version: self.version().to_string(),
            doc: self.doc().to_string(),
            requires: self
                .required_capabilities()
                .iter()
                .map(ToString::to_string)
                .collect(),
            constants,
            functions,
        })
    }
}

/// Host symbols available to manifest-declared functions.
#[derive(Clone, Default)]
pub struct HostBindings {
    bindings: BTreeMap<String, NativeFn>,
}

impl HostBindings {
    /// Create an empty set of bindings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `symbol` to an implementation, replacing any previous binding.
    pub fn bind<F>(mut self, symbol: impl Into<String>, implementation: F) -> Self
    where
        F: Fn(&CallFrame<'_>, &[Value]) -> NativeResult<Value> + Send + Sync + 'static,
    {
        self.insert(symbol, Arc::new(implementation));
        self
    }

    /// Bind `symbol` to a shared implementation.
    pub fn insert(&mut self, symbol: impl Into<String>, callable: NativeFn) {
        self.bindings.insert(symbol.into(), callable);
    }

    /// Look up a symbol.
    pub fn get(&self, symbol: &str) -> Option<&NativeFn> {
        self.bindings.get(symbol)
    }

    /// Check whether a symbol is bound.
    pub fn contains(&self, symbol: &str) -> bool {
        self.bindings.contains_key(symbol)
    }

    /// Bound symbols, sorted.
    pub fn symbols(&self) -> Vec<&str> {
        self.bindings.keys().map(String::as_str).collect()
    }

    /// Number of bound symbols.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Check if nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl std::fmt::Debug for HostBindings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostBindings")
            .field("symbols", &self.symbols())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RegistrationError;

    const GEOMETRY: &str = r#"
name = "geometry"
version = "0.3.0"
doc = "Shapes."
requires = ["execute:calculations"]

[[constants]]
name = "unit"
value = 1.0

[[functions]]
name = "area"
symbol = "host.rect_area"
returns = "float"
params = [{ name = "w", type = "number" }, { name = "h", type = "number" }]
"#;

    fn bindings() -> HostBindings {
        HostBindings::new().bind("host.rect_area", |_, args| {
            let w = args[0].as_number().unwrap_or_default();
            let h = args[1].as_number().unwrap_or_default();
            Ok(Value::Float(w * h))
        })
    }

    #[test]
    fn test_parse_toml() {
        let manifest = ModuleManifest::from_toml_str(GEOMETRY).unwrap();
        assert_eq!(manifest.name, "geometry");
        assert_eq!(manifest.constants[0].value, serde_json::json!(1.0));
        assert_eq!(manifest.functions[0].params.len(), 2);
        assert!(!manifest.functions[0].params[0].variadic);
    }

    #[test]
    fn test_defaults() {
        let manifest = ModuleManifest::from_toml_str(
            "name = \"bare\"\n[[functions]]\nname = \"f\"\n",
        )
        .unwrap();
        assert_eq!(manifest.version, DEFAULT_VERSION);
        assert_eq!(manifest.functions[0].returns, "any");
        assert_eq!(manifest.functions[0].symbol, None);
    }

    #[test]
    fn test_rejects_unknown_fields() {
        let err = ModuleManifest::from_toml_str("name = \"m\"\nsneaky = true\n").unwrap_err();
        assert!(matches!(err, ManifestError::Parse(_)));
    }

    #[test]
    fn test_into_descriptor() {
        let descriptor = ModuleManifest::from_toml_str(GEOMETRY)
            .unwrap()
            .into_descriptor(&bindings())
            .unwrap();

        assert_eq!(descriptor.version(), "0.3.0");
        assert_eq!(descriptor.member_names(), vec!["area", "unit"]);
        assert_eq!(
            descriptor.function("area").unwrap().signature().render("area"),
            "area(w: number, h: number) -> float"
        );
        assert_eq!(descriptor.required_capabilities().len(), 1);
    }

    #[test]
    fn test_unbound_symbol() {
        let err = ModuleManifest::from_toml_str(GEOMETRY)
            .unwrap()
            .into_descriptor(&HostBindings::new())
            .unwrap_err();
        match err {
            ManifestError::UnboundSymbol { function, symbol } => {
                assert_eq!(function, "area");
                assert_eq!(symbol, "host.rect_area");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_default_symbol_is_qualified_name() {
        let manifest = ModuleManifest::from_toml_str(
            "name = \"tools\"\n[[functions]]\nname = \"ping\"\n",
        )
        .unwrap();
        let bindings = HostBindings::new().bind("tools.ping", |_, _| Ok(Value::from("pong")));
        assert!(manifest.into_descriptor(&bindings).is_ok());
    }

    #[test]
    fn test_invalid_signature_is_registration_error() {
        let manifest = ModuleManifest::from_toml_str(
            "name = \"m\"\n[[functions]]\nname = \"f\"\nsymbol = \"host.rect_area\"\nreturns = \"tuple\"\n",
        )
        .unwrap();
        let err = manifest.into_descriptor(&bindings()).unwrap_err();
        assert!(matches!(
            err,
            ManifestError::Registration(RegistrationError::InvalidSignature { .. })
        ));
    }

    #[test]
    fn test_export_manifest() {
        let descriptor = ModuleManifest::from_toml_str(GEOMETRY)
            .unwrap()
            .into_descriptor(&bindings())
            .unwrap();
        let manifest = descriptor.manifest().unwrap();

        assert_eq!(manifest.functions[0].symbol.as_deref(), Some("geometry.area"));
        assert_eq!(manifest.requires, vec!["execute:calculations"]);

        let json = manifest.to_json().unwrap();
        assert!(json.contains("\"name\": \"geometry\""));
        let toml = manifest.to_toml().unwrap();
        assert!(toml.contains("[[functions]]"));
    }

    #[test]
    fn test_export_rejects_reference_constant() {
        let descriptor = ModuleDeclaration::new("m")
            .constant("self_ref", Value::Module("m".to_string()), "")
            .build()
            .unwrap();
        assert!(matches!(
            descriptor.manifest(),
            Err(ManifestError::InvalidConstant(_))
        ));
    }
}
