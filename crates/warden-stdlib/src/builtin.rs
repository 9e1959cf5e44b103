//! The `builtin` module.
//!
//! Language-level primitives: type queries, conversions and the
//! introspection entry points. It is declared like every other module and
//! requires no capabilities. The introspection functions reach other
//! modules only through the [`CallFrame`], so `call` is authorized exactly
//! like a direct call.

use tracing::debug;

use warden_core::{
    CallFrame, FunctionDeclaration, FunctionRef, ModuleDeclaration, ModuleUnit, NativeError,
    NativeResult, Value,
};

use crate::args::{any_arg, module_arg, str_arg};

/// Language primitives.
pub struct Builtin;

impl ModuleUnit for Builtin {
    fn declare() -> ModuleDeclaration {
        ModuleDeclaration::new("builtin")
            .doc("Language-level primitives and introspection.")
            .function(
                FunctionDeclaration::new("type", |_, args| Ok(any_arg(args, 0)?.type_name().into()))
                    .param("value", "any")
                    .returns("str")
                    .doc("The type name of value."),
            )
            .function(
                FunctionDeclaration::new("len", |_, args| len(any_arg(args, 0)?))
                    .param("value", "any")
                    .returns("int")
                    .doc("Length of a str (in characters), list or map."),
            )
            .function(
                FunctionDeclaration::new("str", |_, args| Ok(any_arg(args, 0)?.to_string().into()))
                    .param("value", "any")
                    .returns("str")
                    .doc("Display form of value."),
            )
            .function(
                FunctionDeclaration::new("int", |_, args| to_int(any_arg(args, 0)?))
                    .param("value", "any")
                    .returns("int")
                    .doc("Convert a number, bool or numeric string to int. Floats truncate."),
            )
            .function(
                FunctionDeclaration::new("float", |_, args| to_float(any_arg(args, 0)?))
                    .param("value", "any")
                    .returns("float")
                    .doc("Convert a number, bool or numeric string to float."),
            )
            .function(
                FunctionDeclaration::new("bool", |_, args| Ok(any_arg(args, 0)?.is_truthy().into()))
                    .param("value", "any")
                    .returns("bool")
                    .doc("Truthiness of value."),
            )
            .function(
                FunctionDeclaration::new("dir", |frame, args| dir(frame, module_arg(args, 0)?))
                    .param("module", "any")
                    .returns("list")
                    .doc("Sorted member names of a module."),
            )
            .function(
                FunctionDeclaration::new("info", info)
                    .param("module", "any")
                    .variadic("member", "str")
                    .returns("str")
                    .doc("Documentation and signature of a module or one of its members."),
            )
            .function(
                FunctionDeclaration::new("hasattr", |frame, args| {
                    let found = frame
                        .introspect()
                        .has_attr(module_arg(args, 0)?, str_arg(args, 1)?)?;
                    Ok(found.into())
                })
                .param("module", "any")
                .param("name", "str")
                .returns("bool")
                .doc("Whether a module has a member named name."),
            )
            .function(
                FunctionDeclaration::new("getattr", |frame, args| {
                    Ok(frame
                        .introspect()
                        .get_attr(module_arg(args, 0)?, str_arg(args, 1)?)?)
                })
                .param("module", "any")
                .param("name", "str")
                .returns("any")
                .doc("A constant's value, or a reference to a function."),
            )
            .function(
                FunctionDeclaration::new("call", call)
                    .param("function", "any")
                    .variadic("args", "any")
                    .returns("any")
                    .doc("Call a function reference (or a \"module.function\" string) with args."),
            )
    }
}

fn len(value: &Value) -> NativeResult<Value> {
    let n = match value {
        Value::Str(s) => s.chars().count(),
        Value::List(items) => items.len(),
        Value::Map(map) => map.len(),
        other => {
            return Err(NativeError::msg(format!(
                "object of type '{}' has no len()",
                other.type_name()
            )));
        }
    };
    i64::try_from(n)
        .map(Value::Int)
        .map_err(|_| NativeError::msg("length overflows int"))
}

fn to_int(value: &Value) -> NativeResult<Value> {
    let converted = match value {
        Value::Int(i) => Some(*i),
        Value::Bool(b) => Some(i64::from(*b)),
        Value::Float(f) if f.is_finite() && f.trunc() >= i64::MIN as f64 && f.trunc() < i64::MAX as f64 => {
            Some(f.trunc() as i64)
        }
        Value::Str(s) => s.trim().parse().ok(),
        _ => None,
    };
    converted
        .map(Value::Int)
        .ok_or_else(|| NativeError::msg(format!("cannot convert {} to int", value.repr())))
}

fn to_float(value: &Value) -> NativeResult<Value> {
    let converted = match value {
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Str(s) => s.trim().parse().ok(),
        _ => None,
    };
    converted
        .map(Value::Float)
        .ok_or_else(|| NativeError::msg(format!("cannot convert {} to float", value.repr())))
}

fn dir(frame: &CallFrame<'_>, module: &str) -> NativeResult<Value> {
    let names = frame.introspect().dir(module)?;
    Ok(Value::List(names.into_iter().map(Value::Str).collect()))
}

fn info(frame: &CallFrame<'_>, args: &[Value]) -> NativeResult<Value> {
    let module = module_arg(args, 0)?;
    let member = match args.len() {
        1 => None,
        2 => Some(str_arg(args, 1)?),
        n => {
            return Err(NativeError::msg(format!(
                "info() takes at most 2 arguments, got {}",
                n
            )));
        }
    };
    Ok(frame.introspect().info(module, member)?.to_string().into())
}

fn call(frame: &CallFrame<'_>, args: &[Value]) -> NativeResult<Value> {
    let target = match any_arg(args, 0)? {
        Value::Function(function) => function.clone(),
        Value::Str(qualified) => match qualified.rsplit_once('.') {
            Some((module, function)) => FunctionRef::new(module, function),
            None => {
                return Err(NativeError::msg(format!(
                    "'{}' is not a qualified function name",
                    qualified
                )));
            }
        },
        other => {
            return Err(NativeError::msg(format!(
                "'{}' object is not callable",
                other.type_name()
            )));
        }
    };

    debug!(context = %frame.context(), target = %target, "Dynamic call");
    Ok(frame.invoke(&target.module, &target.function, &args[1..])?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_len() {
        assert_eq!(len(&Value::from("héllo")).unwrap(), Value::Int(5));
        assert_eq!(len(&Value::List(vec![Value::Nil; 3])).unwrap(), Value::Int(3));
        assert!(len(&Value::Int(3)).is_err());
    }

    #[test]
    fn test_conversions() {
        assert_eq!(to_int(&Value::Float(-2.9)).unwrap(), Value::Int(-2));
        assert_eq!(to_int(&Value::from(" 42 ")).unwrap(), Value::Int(42));
        assert_eq!(to_int(&Value::Bool(true)).unwrap(), Value::Int(1));
        assert!(to_int(&Value::from("4.2")).is_err());
        assert!(to_int(&Value::Float(f64::INFINITY)).is_err());

        assert_eq!(to_float(&Value::Int(3)).unwrap(), Value::Float(3.0));
        assert_eq!(to_float(&Value::from("2.5")).unwrap(), Value::Float(2.5));
        assert!(to_float(&Value::Nil).is_err());
    }
}
