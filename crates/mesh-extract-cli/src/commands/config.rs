//! `config` command: print or write the default extraction config.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use mesh_extract::ExtractConfig;

use crate::output;
use crate::OutputFormat;

#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Write to this file (.toml or .json) instead of printing
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn run(args: &ConfigArgs, format: OutputFormat, quiet: bool) -> Result<()> {
    let config = ExtractConfig::default();

    let Some(path) = &args.output else {
        match format {
            OutputFormat::Text => println!("{}", config.to_toml()?),
            OutputFormat::Json => output::print(&config, format, quiet),
        }
        return Ok(());
    };

    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    let text = if is_json {
        config.to_json()?
    } else {
        config.to_toml()?
    };

    std::fs::write(path, text).with_context(|| format!("writing config {:?}", path))?;
    output::success(&format!("Wrote default config to {}", path.display()), format, quiet);
    Ok(())
}
