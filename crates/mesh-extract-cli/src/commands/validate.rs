//! `validate` command: check a saved asset.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use mesh_extract::{validate::log_validation, ExtractedAsset};

use crate::output;
use crate::OutputFormat;

#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// Asset file (native JSON)
    pub asset: PathBuf,
}

pub fn run(args: &ValidateArgs, format: OutputFormat, quiet: bool) -> Result<()> {
    let asset = ExtractedAsset::load(&args.asset)
        .with_context(|| format!("loading asset {:?}", args.asset))?;
    let report = asset.validate();
    log_validation(&report);

    if format == OutputFormat::Text {
        output::info(&report.to_string(), format, quiet);
    }
    output::print(&report, format, quiet);

    if !report.is_valid() {
        bail!("asset '{}' failed validation", report.name);
    }
    if !report.is_compact() {
        output::warning(
            &format!(
                "{} vertices are not used by any triangle",
                report.unreferenced_vertices
            ),
            format,
            quiet,
        );
    }

    output::success("Asset is valid", format, quiet);
    Ok(())
}
