//! The `math` module.

use warden_capability::standard;
use warden_core::{FunctionDeclaration, ModuleDeclaration, ModuleUnit, NativeError, NativeResult, Value};

use crate::args::{any_arg, number_arg};

/// Numeric functions. Importing is unrestricted; `sqrt` and `pow` require
/// `execute:calculations`.
pub struct Math;

impl ModuleUnit for Math {
    fn declare() -> ModuleDeclaration {
        ModuleDeclaration::new("math")
            .doc("Mathematical constants and functions.")
            .constant("pi", std::f64::consts::PI, "Ratio of a circle's circumference to its diameter.")
            .constant("e", std::f64::consts::E, "Euler's number.")
            .function(
                FunctionDeclaration::new("sqrt", |_, args| sqrt(number_arg(args, 0)?))
                    .param("x", "number")
                    .returns("float")
                    .requires(standard::EXECUTE_CALCULATIONS)
                    .doc("Square root of x."),
            )
            .function(
                FunctionDeclaration::new("pow", |_, args| pow(any_arg(args, 0)?, any_arg(args, 1)?))
                    .param("base", "number")
                    .param("exp", "number")
                    .returns("number")
                    .requires(standard::EXECUTE_CALCULATIONS)
                    .doc("base raised to exp. Integer inputs with a non-negative exponent give an int."),
            )
            .function(
                FunctionDeclaration::new("abs", |_, args| abs(any_arg(args, 0)?))
                    .param("x", "number")
                    .returns("number")
                    .doc("Absolute value of x."),
            )
            .function(
                FunctionDeclaration::new("floor", |_, args| to_int(any_arg(args, 0)?, f64::floor))
                    .param("x", "number")
                    .returns("int")
                    .doc("Largest integer not greater than x."),
            )
            .function(
                FunctionDeclaration::new("ceil", |_, args| to_int(any_arg(args, 0)?, f64::ceil))
                    .param("x", "number")
                    .returns("int")
                    .doc("Smallest integer not less than x."),
            )
            .function(
                FunctionDeclaration::new("min", |_, args| extreme(args, |a, b| a < b))
                    .param("first", "number")
                    .variadic("rest", "number")
                    .returns("number")
                    .doc("Smallest argument."),
            )
            .function(
                FunctionDeclaration::new("max", |_, args| extreme(args, |a, b| a > b))
                    .param("first", "number")
                    .variadic("rest", "number")
                    .returns("number")
                    .doc("Largest argument."),
            )
    }
}

fn sqrt(x: f64) -> NativeResult<Value> {
    if x < 0.0 {
        return Err(NativeError::msg("math domain error"));
    }
    Ok(Value::Float(x.sqrt()))
}

fn pow(base: &Value, exp: &Value) -> NativeResult<Value> {
    if let (Value::Int(b), Value::Int(e)) = (base, exp) {
        if let Ok(e) = u32::try_from(*e) {
            return b
                .checked_pow(e)
                .map(Value::Int)
                .ok_or_else(|| NativeError::msg("integer overflow"));
        }
    }
    let b = number(base)?;
    let e = number(exp)?;
    Ok(Value::Float(b.powf(e)))
}

fn abs(x: &Value) -> NativeResult<Value> {
    match x {
        Value::Int(i) => i
            .checked_abs()
            .map(Value::Int)
            .ok_or_else(|| NativeError::msg("integer overflow")),
        other => Ok(Value::Float(number(other)?.abs())),
    }
}

fn to_int(x: &Value, round: fn(f64) -> f64) -> NativeResult<Value> {
    match x {
        Value::Int(i) => Ok(Value::Int(*i)),
        other => {
            let rounded = round(number(other)?);
            if !rounded.is_finite() || rounded < i64::MIN as f64 || rounded >= i64::MAX as f64 {
                return Err(NativeError::msg(format!("cannot convert {} to int", rounded)));
            }
            Ok(Value::Int(rounded as i64))
        }
    }
}

fn extreme(args: &[Value], better: fn(f64, f64) -> bool) -> NativeResult<Value> {
    let mut best = args
        .first()
        .ok_or_else(|| NativeError::msg("expected at least one argument"))?;
    let mut best_value = number(best)?;
    for candidate in args.iter().skip(1) {
        let value = number(candidate)?;
        if better(value, best_value) {
            best = candidate;
            best_value = value;
        }
    }
    Ok(best.clone())
}

fn number(value: &Value) -> NativeResult<f64> {
    number_arg(std::slice::from_ref(value), 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqrt() {
        assert_eq!(sqrt(16.0).unwrap(), Value::Float(4.0));
        assert!(sqrt(-1.0).is_err());
    }

    #[test]
    fn test_pow() {
        assert_eq!(pow(&Value::Int(2), &Value::Int(10)).unwrap(), Value::Int(1024));
        assert_eq!(pow(&Value::Int(2), &Value::Int(-1)).unwrap(), Value::Float(0.5));
        assert_eq!(pow(&Value::Float(9.0), &Value::Float(0.5)).unwrap(), Value::Float(3.0));
        assert!(pow(&Value::Int(i64::MAX), &Value::Int(2)).is_err());
    }

    #[test]
    fn test_abs_and_rounding() {
        assert_eq!(abs(&Value::Int(-3)).unwrap(), Value::Int(3));
        assert_eq!(abs(&Value::Float(-2.5)).unwrap(), Value::Float(2.5));
        assert!(abs(&Value::Int(i64::MIN)).is_err());

        assert_eq!(to_int(&Value::Float(2.7), f64::floor).unwrap(), Value::Int(2));
        assert_eq!(to_int(&Value::Float(-2.1), f64::ceil).unwrap(), Value::Int(-2));
        assert!(to_int(&Value::Float(f64::NAN), f64::floor).is_err());
    }

    #[test]
    fn test_min_max_keep_argument_type() {
        let args = [Value::Int(3), Value::Float(1.5), Value::Int(7)];
        assert_eq!(extreme(&args, |a, b| a < b).unwrap(), Value::Float(1.5));
        assert_eq!(extreme(&args, |a, b| a > b).unwrap(), Value::Int(7));
    }
}
