//! Export command
//!
//! Writes the desired-state snapshot of a site as JSON, for later use with
//! `preview --previous`.

use super::CommandContext;
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

/// Arguments for the export command
#[derive(Parser, Debug, Clone)]
pub struct ExportArgs {
    /// Site manifest (TOML, YAML, or JSON)
    pub site: PathBuf,

    /// Write to this file instead of stdout
    #[arg(short = 'o', long = "out")]
    pub out: Option<PathBuf>,
}

impl ExportArgs {
    /// Execute the export command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let (stack, _) = ctx.declare_site(&self.site)?;
        let snapshot = stack.snapshot();

        match &self.out {
            Some(path) => {
                snapshot
                    .save(path)
                    .with_context(|| format!("Failed to write snapshot: {}", path.display()))?;
                ctx.output.info(&format!(
                    "Wrote {} resources to {}",
                    snapshot.resources.len(),
                    path.display()
                ));
            }
            None => println!("{}", snapshot.to_json()?),
        }
        Ok(0)
    }
}
