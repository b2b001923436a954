//! Output formatting utilities for the CLI.

use colored::Colorize;
use mesh_extract::{Notice, Severity};
use serde::Serialize;

use crate::OutputFormat;

/// Print a serializable result. Text output is handled by the caller.
pub fn print<T: Serialize>(value: &T, format: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }

    if format == OutputFormat::Json {
        match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("{} failed to encode output: {}", "✗".red().bold(), e),
        }
    }
}

/// Print a success message.
pub fn success(msg: &str, format: OutputFormat, quiet: bool) {
    if quiet || format == OutputFormat::Json {
        return;
    }
    println!("{} {}", "✓".green().bold(), msg);
}

/// Print an info message.
pub fn info(msg: &str, format: OutputFormat, quiet: bool) {
    if quiet || format == OutputFormat::Json {
        return;
    }
    println!("{}", msg);
}

/// Print a warning message.
pub fn warning(msg: &str, format: OutputFormat, quiet: bool) {
    if quiet || format == OutputFormat::Json {
        return;
    }
    eprintln!("{} {}", "⚠".yellow().bold(), msg);
}

/// Print a pipeline notice at its severity.
pub fn notice(notice: &Notice, format: OutputFormat, quiet: bool) {
    match notice.severity() {
        Severity::Warning => warning(&notice.to_string(), format, quiet),
        Severity::Info => {
            if quiet || format == OutputFormat::Json {
                return;
            }
            println!("{} {}", "ℹ".blue().bold(), notice);
        }
    }
}

/// A notice as it appears in JSON output.
#[derive(Debug, Serialize)]
pub struct NoticeOutput {
    pub severity: String,
    pub message: String,
}

impl From<&Notice> for NoticeOutput {
    fn from(notice: &Notice) -> Self {
        Self {
            severity: notice.severity().to_string(),
            message: notice.to_string(),
        }
    }
}
