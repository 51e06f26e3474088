//! CLI module for staticpage
//!
//! This module provides the command-line interface for staticpage,
//! including argument parsing, configuration loading, and subcommand handling.

pub mod commands;
pub mod diff;
pub mod output;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// staticpage - Public static websites on object storage
///
/// Declares a bucket configured for website hosting, uploads HTML pages
/// into it, and opens it to anonymous reads.
#[derive(Parser, Debug, Clone)]
#[command(name = "staticpage")]
#[command(author = "staticpage Contributors")]
#[command(version)]
#[command(about = "Provision a public static website on object storage", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Output format
    #[arg(long, global = true, default_value = "human")]
    pub output: OutputFormat,

    /// Path to configuration file
    #[arg(short = 'c', long, global = true, env = "STATICPAGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Region buckets are created in (overrides configuration)
    #[arg(long, global = true)]
    pub region: Option<String>,

    /// Number of resources realized concurrently (overrides configuration)
    #[arg(long, global = true)]
    pub parallelism: Option<usize>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

/// Output format for CLI
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output with colors
    #[default]
    Human,
    /// JSON output for scripting
    Json,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Show the resources a site would create, and what changed
    Preview(commands::preview::PreviewArgs),

    /// Create the site and print its public URL
    Up(commands::up::UpArgs),

    /// Print the resource dependency graph
    Graph(commands::graph::GraphArgs),

    /// Write the desired-state snapshot as JSON
    Export(commands::export::ExportArgs),

    /// Check a site manifest without creating anything
    Validate(commands::validate::ValidateArgs),
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Get the effective verbosity level (0-3)
    pub fn verbosity(&self) -> u8 {
        self.verbose.min(3)
    }

    /// Check if JSON output is requested
    pub fn is_json(&self) -> bool {
        matches!(self.output, OutputFormat::Json)
    }
}
