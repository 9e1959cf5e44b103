//! Warden Standard Library
//!
//! The host-provided modules of the Warden scripting runtime. Each module
//! is a [`ModuleUnit`](warden_core::ModuleUnit) registered through the same
//! declarative layer a third-party module would use:
//!
//! | Module    | Import requires | Notes                                         |
//! |-----------|-----------------|-----------------------------------------------|
//! | `builtin` | nothing         | type queries, conversions, introspection      |
//! | `math`    | nothing         | `sqrt` and `pow` require `execute:calculations` |
//! | `string`  | nothing         | pure string functions                         |
//! | `json`    | nothing         | `stringify` requires `data:serialize`         |
//! | `time`    | `system:clock`  | wall clock                                    |

use std::sync::Arc;

use tracing::info;

use warden_core::{ModuleDescriptor, Registry, RegistrationResult};

mod args;
pub mod builtin;
pub mod json;
pub mod math;
pub mod string;
pub mod time;

pub use builtin::Builtin;
pub use json::Json;
pub use math::Math;
pub use string::Strings;
pub use time::Time;

/// Names of the modules [`load_all`] registers, sorted.
pub const MODULES: [&str; 5] = ["builtin", "json", "math", "string", "time"];

/// Register every standard-library module into `registry`.
///
/// Fails on the first module that cannot be registered; modules loaded
/// before it stay registered.
pub fn load_all(registry: &Registry) -> RegistrationResult<Vec<Arc<ModuleDescriptor>>> {
    let loaded = vec![
        registry.load::<Builtin>()?,
        registry.load::<Json>()?,
        registry.load::<Math>()?,
        registry.load::<Strings>()?,
        registry.load::<Time>()?,
    ];
    info!(modules = loaded.len(), "Standard library loaded");
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_capability::{Capability, CapabilityError, standard};
    use warden_core::{CallError, CapabilityManager, FunctionRef, InvokeError, RegistrationError, Value};

    fn setup() -> (Registry, CapabilityManager) {
        let registry = Registry::new();
        load_all(&registry).unwrap();
        registry.seal().unwrap();
        (registry, CapabilityManager::new())
    }

    fn strs(items: &[&str]) -> Value {
        Value::List(items.iter().copied().map(Value::from).collect())
    }

    #[test]
    fn test_load_all() {
        let registry = Registry::new();
        let loaded = load_all(&registry).unwrap();
        assert_eq!(loaded.len(), MODULES.len());
        assert_eq!(registry.list_modules(), MODULES);

        assert!(matches!(
            load_all(&registry),
            Err(RegistrationError::UnitAlreadyLoaded(_))
        ));
    }

    #[test]
    fn test_capability_requirements() {
        let (registry, _) = setup();
        let time = registry.lookup("time").unwrap();
        assert!(time.required_capabilities().has(&standard::SYSTEM_CLOCK));

        let math = registry.lookup("math").unwrap();
        assert!(math.required_capabilities().is_empty());
        assert!(math
            .function("sqrt")
            .unwrap()
            .required_capabilities()
            .has(&standard::EXECUTE_CALCULATIONS));
        assert!(math.function("abs").unwrap().required_capabilities().is_empty());

        let builtin = registry.lookup("builtin").unwrap();
        assert!(builtin.required_capabilities().is_empty());
        assert!(builtin
            .members()
            .filter_map(|m| m.as_function())
            .all(|f| f.required_capabilities().is_empty()));
    }

    #[test]
    fn test_math_sqrt_scenario() {
        let (registry, gate) = setup();
        let ctx = gate.create_context();

        match gate.invoke(&registry, "math", "sqrt", ctx, &[Value::Int(16)]) {
            Err(InvokeError::Capability(CapabilityError::Missing { missing })) => {
                assert!(missing.contains(&standard::EXECUTE_CALCULATIONS));
                assert_eq!(missing.len(), 1);
            }
            other => panic!("unexpected result: {other:?}"),
        }

        gate.grant(ctx, standard::EXECUTE_CALCULATIONS).unwrap();
        assert_eq!(
            gate.invoke(&registry, "math", "sqrt", ctx, &[Value::Int(16)]).unwrap(),
            Value::Float(4.0)
        );
        assert!(matches!(
            gate.invoke(&registry, "math", "sqrt", ctx, &[Value::Int(-4)]),
            Err(InvokeError::Call(CallError::Failed { .. }))
        ));
    }

    #[test]
    fn test_builtin_introspection() {
        let (registry, gate) = setup();
        let ctx = gate.create_context();
        let builtin = |name: &str, args: &[Value]| gate.invoke(&registry, "builtin", name, ctx, args);

        assert_eq!(
            builtin("dir", &[Value::from("json")]).unwrap(),
            strs(&["parse", "stringify"])
        );
        assert_eq!(
            builtin("hasattr", &[Value::from("math"), Value::from("pi")]).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            builtin("getattr", &[Value::from("math"), Value::from("sqrt")]).unwrap(),
            Value::Function(FunctionRef::new("math", "sqrt"))
        );
        assert!(builtin("info", &[Value::from("math"), Value::from("sqrt")])
            .unwrap()
            .to_string()
            .contains("sqrt(x: number) -> float"));
        assert_eq!(
            builtin("type", &[Value::Module("math".to_string())]).unwrap(),
            Value::from("module")
        );

        assert!(matches!(
            builtin("getattr", &[Value::from("math"), Value::from("tau")]),
            Err(InvokeError::Attribute(_))
        ));
        assert!(matches!(
            builtin("dir", &[Value::from("nope")]),
            Err(InvokeError::Attribute(_))
        ));
    }

    #[test]
    fn test_builtin_call_is_not_a_bypass() {
        let (registry, gate) = setup();
        let ctx = gate.create_context();
        let sqrt = Value::Function(FunctionRef::new("math", "sqrt"));

        let err = gate
            .invoke(&registry, "builtin", "call", ctx, &[sqrt.clone(), Value::Int(16)])
            .unwrap_err();
        assert!(matches!(err, InvokeError::Capability(CapabilityError::Missing { .. })));

        let err = gate
            .invoke(&registry, "builtin", "call", ctx, &[Value::from("time.now")])
            .unwrap_err();
        assert!(matches!(err, InvokeError::Capability(_)));

        gate.grant(ctx, Capability::parse("execute:calculations").unwrap())
            .unwrap();
        assert_eq!(
            gate.invoke(&registry, "builtin", "call", ctx, &[sqrt, Value::Int(16)])
                .unwrap(),
            Value::Float(4.0)
        );
    }

    #[test]
    fn test_string_and_json() {
        let (registry, gate) = setup();
        let ctx = gate.create_context();

        assert_eq!(
            gate.invoke(&registry, "string", "upper", ctx, &[Value::from("abc")]).unwrap(),
            Value::from("ABC")
        );
        assert_eq!(
            gate.invoke(
                &registry,
                "string",
                "join",
                ctx,
                &[Value::from(", "), strs(&["a", "b"])]
            )
            .unwrap(),
            Value::from("a, b")
        );

        let parsed = gate
            .invoke(&registry, "json", "parse", ctx, &[Value::from("[1, 2]")])
            .unwrap();
        assert_eq!(parsed, Value::List(vec![Value::Int(1), Value::Int(2)]));

        assert!(matches!(
            gate.invoke(&registry, "json", "stringify", ctx, &[parsed.clone()]),
            Err(InvokeError::Capability(_))
        ));
        gate.grant(ctx, standard::DATA_SERIALIZE).unwrap();
        assert_eq!(
            gate.invoke(&registry, "json", "stringify", ctx, &[parsed]).unwrap(),
            Value::from("[1,2]")
        );
    }

    #[test]
    fn test_time_requires_clock() {
        let (registry, gate) = setup();
        let ctx = gate.create_context();
        assert!(gate.invoke(&registry, "time", "now", ctx, &[]).is_err());

        gate.grant(ctx, standard::SYSTEM_CLOCK).unwrap();
        assert!(matches!(
            gate.invoke(&registry, "time", "now", ctx, &[]).unwrap(),
            Value::Float(_)
        ));
    }
}
