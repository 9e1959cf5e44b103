//! Modules command - List registered modules.

use std::path::Path;

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use crate::OutputFormat;

/// Arguments for the modules command.
#[derive(Args)]
pub struct ModulesArgs {
    /// Also list each module's members
    #[arg(long)]
    pub members: bool,
}

#[derive(Debug, Serialize)]
struct ModuleDisplay {
    name: String,
    version: String,
    requires: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    members: Option<Vec<String>>,
}

/// Execute the modules command.
pub fn execute(args: ModulesArgs, config: Option<&Path>, format: OutputFormat) -> Result<()> {
    let runtime = super::build_runtime(&super::load_config(config)?)?;

    let modules: Vec<ModuleDisplay> = runtime
        .list_modules()
        .into_iter()
        .filter_map(|name| runtime.registry().lookup(&name))
        .map(|module| ModuleDisplay {
            name: module.name().to_string(),
            version: module.version().to_string(),
            requires: module
                .required_capabilities()
                .iter()
                .map(|c| c.to_string())
                .collect(),
            members: args.members.then(|| module.member_names()),
        })
        .collect();

    match format {
        OutputFormat::Human => {
            println!("Modules ({}):", modules.len());
            for module in &modules {
                if module.requires.is_empty() {
                    println!("  {} {}", module.name, module.version);
                } else {
                    println!(
                        "  {} {} (requires {})",
                        module.name,
                        module.version,
                        module.requires.join(", ")
                    );
                }
                if let Some(members) = &module.members {
                    println!("    {}", members.join(", "));
                }
            }
        }
        _ => super::print_json(&modules, format)?,
    }

    Ok(())
}
