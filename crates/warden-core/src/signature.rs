//! Parameter signatures and semantic type tags.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CallError;
use crate::value::Value;

/// A semantic type tag used in signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeTag {
    /// Any value.
    Any,
    /// `nil`.
    Nil,
    /// `bool`.
    Bool,
    /// `int`.
    Int,
    /// `float`.
    Float,
    /// `int` or `float`.
    Number,
    /// `str`.
    Str,
    /// `list`.
    List,
    /// `map`.
    Map,
    /// A function reference.
    Function,
    /// A module reference.
    Module,
}

impl TypeTag {
    /// The tag's textual name.
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeTag::Any => "any",
            TypeTag::Nil => "nil",
            TypeTag::Bool => "bool",
            TypeTag::Int => "int",
            TypeTag::Float => "float",
            TypeTag::Number => "number",
            TypeTag::Str => "str",
            TypeTag::List => "list",
            TypeTag::Map => "map",
            TypeTag::Function => "function",
            TypeTag::Module => "module",
        }
    }

    /// Check whether a value inhabits this type.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (TypeTag::Any, _) => true,
            (TypeTag::Number, Value::Int(_) | Value::Float(_)) => true,
            (tag, value) => tag.as_str() == value.type_name(),
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TypeTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "any" => TypeTag::Any,
            "nil" => TypeTag::Nil,
            "bool" => TypeTag::Bool,
            "int" => TypeTag::Int,
            "float" => TypeTag::Float,
            "number" => TypeTag::Number,
            "str" => TypeTag::Str,
            "list" => TypeTag::List,
            "map" => TypeTag::Map,
            "function" => TypeTag::Function,
            "module" => TypeTag::Module,
            other => return Err(format!("unknown type '{}'", other)),
        })
    }
}

/// One parameter in a signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    /// Parameter name.
    pub name: String,
    /// Accepted type.
    pub ty: TypeTag,
    /// Whether this parameter absorbs all remaining arguments.
    pub variadic: bool,
}

/// An ordered parameter list plus return type.
///
/// At most one parameter may be variadic and it must be last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    params: Vec<Param>,
    returns: TypeTag,
}

impl Signature {
    /// Build a signature, rejecting shapes the model cannot represent.
    pub fn new(params: Vec<Param>, returns: TypeTag) -> Result<Self, String> {
        let mut seen = HashSet::new();
        for (i, param) in params.iter().enumerate() {
            if !seen.insert(param.name.as_str()) {
                return Err(format!("duplicate parameter '{}'", param.name));
            }
            if param.variadic && i + 1 != params.len() {
                return Err(format!("variadic parameter '{}' must be last", param.name));
            }
        }
        Ok(Self { params, returns })
    }

    /// The parameters in order.
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// The return type.
    pub fn returns(&self) -> TypeTag {
        self.returns
    }

    /// Minimum number of arguments.
    pub fn min_arity(&self) -> usize {
        self.params.iter().filter(|p| !p.variadic).count()
    }

    /// Maximum number of arguments, or `None` when variadic.
    pub fn max_arity(&self) -> Option<usize> {
        match self.params.last() {
            Some(p) if p.variadic => None,
            _ => Some(self.params.len()),
        }
    }

    /// Check call arguments against this signature.
    pub fn check_args(&self, function: &str, args: &[Value]) -> Result<(), CallError> {
        let min = self.min_arity();
        let max = self.max_arity();
        if args.len() < min || max.is_some_and(|max| args.len() > max) {
            return Err(CallError::Arity {
                function: function.to_string(),
                expected: self.arity_text(),
                actual: args.len(),
            });
        }

        for (i, arg) in args.iter().enumerate() {
            let param = self
                .params
                .get(i)
                .or_else(|| self.params.last().filter(|p| p.variadic));
            if let Some(param) = param {
                if !param.ty.accepts(arg) {
                    return Err(CallError::ArgumentType {
                        function: function.to_string(),
                        parameter: param.name.clone(),
                        expected: param.ty,
                        actual: arg.type_name().to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    fn arity_text(&self) -> String {
        match self.max_arity() {
            None => format!("at least {}", self.min_arity()),
            Some(n) => n.to_string(),
        }
    }

    /// Render as `name(a: int, *rest: any) -> float`.
    pub fn render(&self, name: &str) -> String {
        let params = self
            .params
            .iter()
            .map(|p| {
                let star = if p.variadic { "*" } else { "" };
                format!("{}{}: {}", star, p.name, p.ty)
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}({}) -> {}", name, params, self.returns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(name: &str, ty: TypeTag) -> Param {
        Param {
            name: name.to_string(),
            ty,
            variadic: false,
        }
    }

    fn rest(name: &str, ty: TypeTag) -> Param {
        Param {
            variadic: true,
            ..param(name, ty)
        }
    }

    #[test]
    fn test_type_tag_parse() {
        assert_eq!("number".parse::<TypeTag>().unwrap(), TypeTag::Number);
        assert!("complex".parse::<TypeTag>().is_err());
    }

    #[test]
    fn test_type_tag_accepts() {
        assert!(TypeTag::Number.accepts(&Value::Int(1)));
        assert!(TypeTag::Number.accepts(&Value::Float(1.0)));
        assert!(!TypeTag::Int.accepts(&Value::Float(1.0)));
        assert!(TypeTag::Any.accepts(&Value::Nil));
        assert!(TypeTag::Str.accepts(&Value::from("s")));
    }

    #[test]
    fn test_signature_rejects_bad_shapes() {
        assert!(Signature::new(vec![param("x", TypeTag::Int), param("x", TypeTag::Int)], TypeTag::Nil).is_err());
        assert!(Signature::new(vec![rest("xs", TypeTag::Any), param("y", TypeTag::Int)], TypeTag::Nil).is_err());
        assert!(Signature::new(vec![param("x", TypeTag::Int), rest("xs", TypeTag::Any)], TypeTag::Nil).is_ok());
    }

    #[test]
    fn test_check_args_arity() {
        let sig = Signature::new(vec![param("x", TypeTag::Number)], TypeTag::Float).unwrap();
        assert!(sig.check_args("sqrt", &[Value::Int(16)]).is_ok());
        assert!(matches!(
            sig.check_args("sqrt", &[]),
            Err(CallError::Arity { actual: 0, .. })
        ));
        assert!(matches!(
            sig.check_args("sqrt", &[Value::Int(1), Value::Int(2)]),
            Err(CallError::Arity { actual: 2, .. })
        ));
    }

    #[test]
    fn test_check_args_variadic_types() {
        let sig = Signature::new(
            vec![param("first", TypeTag::Number), rest("rest", TypeTag::Number)],
            TypeTag::Number,
        )
        .unwrap();

        assert_eq!(sig.min_arity(), 1);
        assert_eq!(sig.max_arity(), None);
        assert!(sig.check_args("max", &[Value::Int(1), Value::Float(2.0), Value::Int(3)]).is_ok());

        let err = sig
            .check_args("max", &[Value::Int(1), Value::from("two")])
            .unwrap_err();
        match err {
            CallError::ArgumentType { parameter, .. } => assert_eq!(parameter, "rest"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_render() {
        let sig = Signature::new(
            vec![param("sep", TypeTag::Str), rest("parts", TypeTag::Any)],
            TypeTag::Str,
        )
        .unwrap();
        assert_eq!(sig.render("join"), "join(sep: str, *parts: any) -> str");
    }
}
