//! Resolve command - Show where an import resolves.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use crate::OutputFormat;

/// Arguments for the resolve command.
#[derive(Args)]
pub struct ResolveArgs {
    /// Dotted import path, e.g. `pkg.tools`
    #[arg(required = true)]
    pub path: String,

    /// Additional search root (repeatable, searched after configured roots)
    #[arg(long = "root")]
    pub roots: Vec<PathBuf>,

    /// Fall back to the current directory
    #[arg(long)]
    pub allow_cwd: bool,
}

#[derive(Debug, Serialize)]
struct ResolutionDisplay {
    path: String,
    module: String,
    version: String,
    source: String,
    requires: Vec<String>,
}

/// Execute the resolve command.
pub fn execute(args: ResolveArgs, config: Option<&Path>, format: OutputFormat) -> Result<()> {
    let runtime = super::build_runtime(&super::load_config(config)?)?;

    let mut context = runtime
        .resolution_context()
        .with_current_dir_fallback(args.allow_cwd || runtime.resolver().config().allow_current_dir);
    for root in args.roots {
        context = context.with_search_root(root);
    }

    let resolved = runtime
        .resolver()
        .resolve(&args.path, &context)
        .with_context(|| format!("Failed to resolve '{}'", args.path))?;

    let result = ResolutionDisplay {
        path: args.path,
        module: resolved.name().to_string(),
        version: resolved.descriptor.version().to_string(),
        source: resolved.source.to_string(),
        requires: resolved
            .descriptor
            .required_capabilities()
            .iter()
            .map(|c| c.to_string())
            .collect(),
    };

    match format {
        OutputFormat::Human => {
            println!("{} -> {} {} ({})", result.path, result.module, result.version, result.source);
            if !result.requires.is_empty() {
                println!("  import requires: {}", result.requires.join(", "));
            }
        }
        _ => super::print_json(&result, format)?,
    }

    Ok(())
}
