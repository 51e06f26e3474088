//! Validate command
//!
//! Loads a site manifest and declares it, reporting the first problem.

use super::CommandContext;
use anyhow::Result;
use clap::Parser;
use serde_json::json;
use std::path::PathBuf;

/// Arguments for the validate command
#[derive(Parser, Debug, Clone)]
pub struct ValidateArgs {
    /// Site manifest (TOML, YAML, or JSON)
    pub site: PathBuf,
}

impl ValidateArgs {
    /// Execute the validate command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        ctx.output.banner("SITE VALIDATION");
        ctx.output
            .info(&format!("Validating: {}", self.site.display()));

        match ctx.declare_site(&self.site) {
            Ok((stack, page)) => {
                let pages = page.objects().len();
                if ctx.output.is_json() {
                    ctx.output.json(&json!({
                        "valid": true,
                        "site": page.urn().name(),
                        "pages": pages,
                        "resources": stack.len(),
                    }))?;
                } else {
                    ctx.output.plain(&format!(
                        "Site '{}' is valid: {} page(s), {} resources.",
                        page.urn().name(),
                        pages,
                        stack.len()
                    ));
                }
                Ok(0)
            }
            Err(err) => {
                let message = format!("{:#}", err);
                if ctx.output.is_json() {
                    ctx.output.json(&json!({ "valid": false, "error": message }))?;
                } else {
                    ctx.output.error(&message);
                }
                Ok(1)
            }
        }
    }
}
