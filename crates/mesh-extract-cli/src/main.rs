//! mesh-extract - rebuild meshes from triangle selections
//!
//! Reads a scene and a triangle selection (JSON), extracts the selected triangles into
//! new meshes and writes them as native JSON assets or Wavefront OBJ.

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{config, extract, info, validate};

/// How results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "mesh-extract")]
#[command(about = "Extract, merge and combine meshes from selected triangles")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format for results
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    format: OutputFormat,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only print errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract selected triangles into new assets
    Extract(extract::ExtractArgs),

    /// Summarize the objects, meshes and bones of a scene
    Info(info::InfoArgs),

    /// Validate a saved asset
    Validate(validate::ValidateArgs),

    /// Print or write the default extraction config
    Config(config::ConfigArgs),
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Extract(args) => extract::run(&args, cli.format, cli.quiet),
        Commands::Info(args) => info::run(&args, cli.format, cli.quiet),
        Commands::Validate(args) => validate::run(&args, cli.format, cli.quiet),
        Commands::Config(args) => config::run(&args, cli.format, cli.quiet),
    }
}
