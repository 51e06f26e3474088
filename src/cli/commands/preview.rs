//! Preview command
//!
//! Declares a site and prints the resources `up` would create, diffed
//! against an earlier snapshot when one is given. Nothing is created.

use super::CommandContext;
use anyhow::{Context, Result};
use clap::Parser;
use staticpage::engine::{Engine, SimulatedProvider};
use staticpage::state::StateSnapshot;
use std::path::PathBuf;
use std::sync::Arc;

/// Arguments for the preview command
#[derive(Parser, Debug, Clone)]
pub struct PreviewArgs {
    /// Site manifest (TOML, YAML, or JSON)
    pub site: PathBuf,

    /// Snapshot written by `export` to diff against
    #[arg(long)]
    pub previous: Option<PathBuf>,
}

impl PreviewArgs {
    /// Execute the preview command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let (stack, page) = ctx.declare_site(&self.site)?;

        let previous = match &self.previous {
            Some(path) => Some(
                StateSnapshot::load(path)
                    .with_context(|| format!("Failed to load snapshot: {}", path.display()))?,
            ),
            None => None,
        };

        let engine = Engine::new(Arc::new(SimulatedProvider::new(ctx.region.clone())))
            .with_parallelism(ctx.parallelism);
        let plan = engine.preview(&stack, previous.as_ref())?;

        if ctx.output.is_json() {
            ctx.output.json(&plan)?;
            return Ok(0);
        }

        ctx.output.banner(&format!("PREVIEW [{}]", page.urn().name()));
        if plan.diff.summary.create > 0 {
            ctx.output.public_exposure(page.urn().name());
        }
        ctx.output.plan(&plan);
        Ok(0)
    }
}
