//! Inspect command - Show a module's members or documentation.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use warden_core::Info;

use crate::OutputFormat;

/// Arguments for the inspect command.
#[derive(Args)]
pub struct InspectArgs {
    /// Module name
    #[arg(required = true)]
    pub module: String,

    /// Show one member instead of the whole module
    #[arg(short, long)]
    pub member: Option<String>,
}

/// Inspection result.
#[derive(Debug, Serialize)]
struct InspectionResult {
    #[serde(flatten)]
    info: Info,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    members: Vec<Info>,
}

/// Execute the inspect command.
pub fn execute(args: InspectArgs, config: Option<&Path>, format: OutputFormat) -> Result<()> {
    let runtime = super::build_runtime(&super::load_config(config)?)?;
    let introspect = runtime.introspect();

    let info = introspect
        .info(&args.module, args.member.as_deref())
        .context("Failed to inspect module")?;

    let members = match args.member {
        Some(_) => Vec::new(),
        None => introspect
            .dir(&args.module)?
            .iter()
            .map(|name| introspect.info(&args.module, Some(name)))
            .collect::<Result<Vec<_>, _>>()?,
    };

    let result = InspectionResult { info, members };

    match format {
        OutputFormat::Human => {
            println!("{}", result.info);
            if !result.members.is_empty() {
                println!();
                println!("Members ({}):", result.members.len());
                for member in &result.members {
                    let label = member.signature.as_deref().unwrap_or(&member.name);
                    println!("  {} [{}]", label, member.kind);
                    if !member.doc.is_empty() {
                        println!("      {}", member.doc);
                    }
                }
            }
        }
        _ => super::print_json(&result, format)?,
    }

    Ok(())
}
