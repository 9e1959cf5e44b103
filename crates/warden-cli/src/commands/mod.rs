//! Subcommands.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::debug;

use warden::{Warden, WardenConfig, WardenRuntime};

use crate::OutputFormat;

pub mod call;
pub mod inspect;
pub mod manifest;
pub mod modules;
pub mod resolve;

/// Load the configuration file, if one was given.
pub fn load_config(path: Option<&Path>) -> Result<WardenConfig> {
    match path {
        Some(path) => WardenConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(WardenConfig::default()),
    }
}

/// Build a runtime with the standard library and `config` applied.
pub fn build_runtime(config: &WardenConfig) -> Result<WardenRuntime> {
    debug!(
        roots = config.resolver.search_roots.len(),
        grants = config.policy.grants.len(),
        "Building runtime"
    );
    Warden::builder()
        .with_config(config)
        .context("Invalid policy")?
        .build()
        .context("Failed to create runtime")
}

/// Print `value` as JSON in the requested style.
pub fn print_json<T: Serialize>(value: &T, format: OutputFormat) -> Result<()> {
    let rendered = match format {
        OutputFormat::JsonCompact => serde_json::to_string(value)?,
        _ => serde_json::to_string_pretty(value)?,
    };
    println!("{}", rendered);
    Ok(())
}
