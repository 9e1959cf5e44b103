//! Call command - Invoke a module function under a fresh context.

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use warden_capability::{Capability, CapabilitySet};
use warden_core::Value;

use crate::OutputFormat;

/// Arguments for the call command.
#[derive(Args)]
pub struct CallArgs {
    /// Module name
    #[arg(required = true)]
    pub module: String,

    /// Function name
    #[arg(required = true)]
    pub function: String,

    /// Grant a capability to the calling context (repeatable)
    #[arg(long = "grant")]
    pub grants: Vec<String>,

    /// Arguments to pass to the function (as JSON values)
    #[arg(last = true)]
    pub args: Vec<String>,
}

#[derive(Debug, Serialize)]
struct CallResult {
    module: String,
    function: String,
    granted: Vec<String>,
    result: serde_json::Value,
    duration_us: u128,
}

/// Execute the call command.
pub fn execute(
    args: CallArgs,
    config: Option<&Path>,
    format: OutputFormat,
    quiet: bool,
) -> Result<()> {
    let config = super::load_config(config)?;
    let runtime = super::build_runtime(&config)?;

    let mut capabilities: CapabilitySet = runtime.policy_grants().clone();
    for token in &args.grants {
        let capability = Capability::parse(token.clone())
            .with_context(|| format!("Invalid --grant '{}'", token))?;
        capabilities.grant(capability);
    }

    let call_args = args
        .args
        .iter()
        .map(|raw| {
            serde_json::from_str(raw)
                .map(Value::from_json)
                .with_context(|| format!("Argument is not valid JSON: {}", raw))
        })
        .collect::<Result<Vec<_>>>()?;

    let ctx = runtime.create_context_with(capabilities.clone());
    let module = runtime
        .import(&args.module, ctx, &runtime.resolution_context())
        .with_context(|| format!("Failed to import '{}'", args.module))?;

    let start = Instant::now();
    let value = runtime
        .call(&module, &args.function, ctx, &call_args)
        .with_context(|| format!("{}.{} failed", args.module, args.function))?;
    let duration = start.elapsed();
    runtime.drop_context(ctx);

    match format {
        OutputFormat::Human => {
            println!("{}", value.repr());
            if !quiet {
                eprintln!(
                    "\n{}.{} completed in {:?}",
                    args.module, args.function, duration
                );
            }
        }
        _ => {
            let result = CallResult {
                module: args.module,
                function: args.function,
                granted: capabilities.iter().map(|c| c.to_string()).collect(),
                result: value
                    .to_json()
                    .unwrap_or_else(|| serde_json::Value::String(value.to_string())),
                duration_us: duration.as_micros(),
            };
            super::print_json(&result, format)?;
        }
    }

    Ok(())
}
