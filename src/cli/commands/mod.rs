//! Subcommands module for staticpage CLI
//!
//! This module contains all the subcommand implementations.

pub mod export;
pub mod graph;
pub mod preview;
pub mod up;
pub mod validate;

use crate::cli::output::OutputFormatter;
use anyhow::{Context, Result};
use staticpage::components::StaticPage;
use staticpage::config::Config;
use staticpage::site::SiteManifest;
use staticpage::state::Stack;
use std::path::Path;

/// Common context shared between commands
pub struct CommandContext {
    /// Configuration
    pub config: Config,
    /// Output formatter
    pub output: OutputFormatter,
    /// Verbosity level
    pub verbosity: u8,
    /// Region buckets are created in
    pub region: String,
    /// Number of resources realized concurrently
    pub parallelism: usize,
}

impl CommandContext {
    /// Create a new command context from CLI arguments
    pub fn new(cli: &crate::cli::Cli, config: Config) -> Self {
        let use_color = !cli.no_color && config.colors.enabled;
        let output = OutputFormatter::new(use_color, cli.is_json(), cli.verbosity());
        let region = cli
            .region
            .clone()
            .unwrap_or_else(|| config.defaults.region.clone());
        let parallelism = cli.parallelism.unwrap_or(config.defaults.parallelism);

        Self {
            config,
            output,
            verbosity: cli.verbosity(),
            region,
            parallelism,
        }
    }

    /// Load a site manifest and declare it in a fresh stack.
    pub fn declare_site(&self, manifest_path: &Path) -> Result<(Stack, StaticPage)> {
        let manifest = SiteManifest::load(manifest_path)
            .with_context(|| format!("Failed to load site manifest: {}", manifest_path.display()))?;

        let mut stack = Stack::new(
            self.config.defaults.project.clone(),
            self.config.defaults.stack.clone(),
        );
        let page = manifest
            .declare(&mut stack)
            .with_context(|| format!("Invalid site '{}'", manifest.name))?;

        self.output.debug(&format!(
            "Declared {} resources for site '{}'",
            stack.len(),
            manifest.name
        ));
        Ok((stack, page))
    }
}
