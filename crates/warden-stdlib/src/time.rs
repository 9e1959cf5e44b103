//! The `time` module.

use std::time::{SystemTime, UNIX_EPOCH};

use warden_capability::standard;
use warden_core::{FunctionDeclaration, ModuleDeclaration, ModuleUnit, NativeError, NativeResult, Value};

/// Wall-clock access. Importing requires `system:clock`.
pub struct Time;

impl ModuleUnit for Time {
    fn declare() -> ModuleDeclaration {
        ModuleDeclaration::new("time")
            .doc("Wall-clock time.")
            .requires(standard::SYSTEM_CLOCK)
            .function(
                FunctionDeclaration::new("now", |_, _| now())
                    .returns("float")
                    .doc("Seconds since the Unix epoch."),
            )
    }
}

fn now() -> NativeResult<Value> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| Value::Float(elapsed.as_secs_f64()))
        .map_err(|e| NativeError::msg(format!("clock is before the epoch: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_is_after_2020() {
        let Value::Float(seconds) = now().unwrap() else {
            panic!("expected float");
        };
        assert!(seconds > 1_577_836_800.0);
    }
}
