//! Manifest command - Print a module manifest.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;

/// Arguments for the manifest command.
#[derive(Args)]
pub struct ManifestArgs {
    /// Module name
    #[arg(required = true)]
    pub module: String,

    /// Print TOML instead of JSON
    #[arg(long)]
    pub toml: bool,
}

/// Execute the manifest command.
pub fn execute(args: ManifestArgs, config: Option<&Path>) -> Result<()> {
    let runtime = super::build_runtime(&super::load_config(config)?)?;
    let manifest = runtime
        .manifest(&args.module)
        .with_context(|| format!("Failed to export '{}'", args.module))?;

    let rendered = if args.toml {
        manifest.to_toml()?
    } else {
        manifest.to_json()?
    };
    println!("{}", rendered.trim_end());

    Ok(())
}
