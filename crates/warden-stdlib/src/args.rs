//! Argument accessors for native implementations.
//!
//! The gate checks arguments against the declared signature before an
//! implementation runs, so these only fail if a declaration and its
//! implementation disagree.

use warden_core::{NativeError, NativeResult, Value};

fn arg(args: &[Value], index: usize) -> NativeResult<&Value> {
    args.get(index)
        .ok_or_else(|| NativeError::msg(format!("missing argument {}", index + 1)))
}

pub(crate) fn str_arg(args: &[Value], index: usize) -> NativeResult<&str> {
    let value = arg(args, index)?;
    value
        .as_str()
        .ok_or_else(|| NativeError::msg(format!("expected str, got {}", value.type_name())))
}

pub(crate) fn number_arg(args: &[Value], index: usize) -> NativeResult<f64> {
    let value = arg(args, index)?;
    value
        .as_number()
        .ok_or_else(|| NativeError::msg(format!("expected number, got {}", value.type_name())))
}

pub(crate) fn list_arg(args: &[Value], index: usize) -> NativeResult<&[Value]> {
    let value = arg(args, index)?;
    value
        .as_list()
        .ok_or_else(|| NativeError::msg(format!("expected list, got {}", value.type_name())))
}

pub(crate) fn any_arg(args: &[Value], index: usize) -> NativeResult<&Value> {
    arg(args, index)
}

/// A module named by a string or a module reference.
pub(crate) fn module_arg(args: &[Value], index: usize) -> NativeResult<&str> {
    match arg(args, index)? {
        Value::Str(name) | Value::Module(name) => Ok(name),
        other => Err(NativeError::msg(format!(
            "expected module or str, got {}",
            other.type_name()
        ))),
    }
}
