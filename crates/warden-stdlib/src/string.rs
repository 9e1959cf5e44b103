//! The `string` module.

use warden_core::{FunctionDeclaration, ModuleDeclaration, ModuleUnit, NativeError, NativeResult, Value};

use crate::args::{list_arg, str_arg};

/// Pure string functions. No capabilities required.
pub struct Strings;

impl ModuleUnit for Strings {
    fn declare() -> ModuleDeclaration {
        ModuleDeclaration::new("string")
            .doc("String manipulation.")
            .function(
                FunctionDeclaration::new("upper", |_, args| Ok(str_arg(args, 0)?.to_uppercase().into()))
                    .param("s", "str")
                    .returns("str")
                    .doc("s with all letters uppercased."),
            )
            .function(
                FunctionDeclaration::new("lower", |_, args| Ok(str_arg(args, 0)?.to_lowercase().into()))
                    .param("s", "str")
                    .returns("str")
                    .doc("s with all letters lowercased."),
            )
            .function(
                FunctionDeclaration::new("trim", |_, args| Ok(str_arg(args, 0)?.trim().into()))
                    .param("s", "str")
                    .returns("str")
                    .doc("s without leading and trailing whitespace."),
            )
            .function(
                FunctionDeclaration::new("split", |_, args| split(args))
                    .param("s", "str")
                    .variadic("sep", "str")
                    .returns("list")
                    .doc("Split s on sep, or on runs of whitespace when sep is omitted."),
            )
            .function(
                FunctionDeclaration::new("join", |_, args| join(str_arg(args, 0)?, list_arg(args, 1)?))
                    .param("sep", "str")
                    .param("parts", "list")
                    .returns("str")
                    .doc("Concatenate the strings in parts, separated by sep."),
            )
            .function(
                FunctionDeclaration::new("replace", |_, args| {
                    let s = str_arg(args, 0)?;
                    let old = str_arg(args, 1)?;
                    if old.is_empty() {
                        return Err(NativeError::msg("empty pattern"));
                    }
                    Ok(s.replace(old, str_arg(args, 2)?).into())
                })
                .param("s", "str")
                .param("old", "str")
                .param("new", "str")
                .returns("str")
                .doc("s with every occurrence of old replaced by new."),
            )
            .function(
                FunctionDeclaration::new("contains", |_, args| {
                    Ok(str_arg(args, 0)?.contains(str_arg(args, 1)?).into())
                })
                .param("s", "str")
                .param("sub", "str")
                .returns("bool")
                .doc("Whether sub occurs in s."),
            )
    }
}

fn split(args: &[Value]) -> NativeResult<Value> {
    let s = str_arg(args, 0)?;
    let parts: Vec<Value> = match args.len() {
        1 => s.split_whitespace().map(Value::from).collect(),
        2 => {
            let sep = str_arg(args, 1)?;
            if sep.is_empty() {
                return Err(NativeError::msg("empty separator"));
            }
            s.split(sep).map(Value::from).collect()
        }
        n => {
            return Err(NativeError::msg(format!(
                "split() takes at most 2 arguments, got {}",
                n
            )));
        }
    };
    Ok(Value::List(parts))
}

fn join(sep: &str, parts: &[Value]) -> NativeResult<Value> {
    let strings = parts
        .iter()
        .map(|part| {
            part.as_str().ok_or_else(|| {
                NativeError::msg(format!("join() expects str items, got {}", part.type_name()))
            })
        })
        .collect::<NativeResult<Vec<_>>>()?;
    Ok(strings.join(sep).into())
}
