//! The `json` module.

use warden_capability::standard;
use warden_core::{FunctionDeclaration, ModuleDeclaration, ModuleUnit, NativeError, NativeResult, Value};

use crate::args::{any_arg, str_arg};

/// JSON encoding and decoding. `stringify` requires `data:serialize`.
pub struct Json;

impl ModuleUnit for Json {
    fn declare() -> ModuleDeclaration {
        ModuleDeclaration::new("json")
            .doc("JSON encoding and decoding.")
            .function(
                FunctionDeclaration::new("parse", |_, args| parse(str_arg(args, 0)?))
                    .param("text", "str")
                    .returns("any")
                    .doc("Decode a JSON document."),
            )
            .function(
                FunctionDeclaration::new("stringify", |_, args| stringify(any_arg(args, 0)?))
                    .param("value", "any")
                    .returns("str")
                    .requires(standard::DATA_SERIALIZE)
                    .doc("Encode a value as compact JSON."),
            )
    }
}

fn parse(text: &str) -> NativeResult<Value> {
    serde_json::from_str(text)
        .map(Value::from_json)
        .map_err(|e| NativeError::msg(format!("invalid JSON: {}", e)))
}

fn stringify(value: &Value) -> NativeResult<Value> {
    let json = value.to_json().ok_or_else(|| {
        NativeError::msg(format!("{} has no JSON representation", value.type_name()))
    })?;
    serde_json::to_string(&json)
        .map(Value::Str)
        .map_err(|e| NativeError::msg(e.to_string()))
}
