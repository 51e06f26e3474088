//! Graph command
//!
//! Prints the dependency graph of a declared site.

use super::CommandContext;
use anyhow::Result;
use clap::{Parser, ValueEnum};
use serde_json::json;
use std::path::PathBuf;

/// Graph rendering
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum GraphFormat {
    /// Graphviz DOT
    #[default]
    Dot,
    /// Mermaid flowchart
    Mermaid,
}

/// Arguments for the graph command
#[derive(Parser, Debug, Clone)]
pub struct GraphArgs {
    /// Site manifest (TOML, YAML, or JSON)
    pub site: PathBuf,

    /// Graph format
    #[arg(long, default_value = "dot")]
    pub format: GraphFormat,
}

impl GraphArgs {
    /// Execute the graph command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let (stack, _) = ctx.declare_site(&self.site)?;
        let graph = stack.graph();

        if ctx.output.is_json() {
            let nodes: Vec<String> = graph.nodes().iter().map(|n| n.urn.to_string()).collect();
            let edges: Vec<_> = graph.edges().collect();
            let waves = graph.execution_waves()?;
            ctx.output.json(&json!({
                "nodes": nodes,
                "edges": edges,
                "waves": waves,
            }))?;
            return Ok(0);
        }

        let rendered = match self.format {
            GraphFormat::Dot => graph.to_dot(),
            GraphFormat::Mermaid => graph.to_mermaid(),
        };
        print!("{}", rendered);
        Ok(0)
    }
}
