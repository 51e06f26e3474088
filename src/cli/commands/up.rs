//! Up command
//!
//! Declares a site, realizes it against a provider, and prints the public
//! endpoint.

use super::CommandContext;
use anyhow::Result;
use clap::{Parser, ValueEnum};
use staticpage::engine::{Engine, Provider, SimulatedProvider};
use staticpage::site::URL_EXPORT;
use std::path::PathBuf;
use std::sync::Arc;

/// Provider resources are realized against
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ProviderKind {
    /// In-memory simulation; nothing leaves the process
    #[default]
    Simulated,
    /// Real AWS S3 (requires the `aws` feature)
    Aws,
}

/// Arguments for the up command
#[derive(Parser, Debug, Clone)]
pub struct UpArgs {
    /// Site manifest (TOML, YAML, or JSON)
    pub site: PathBuf,

    /// Provider to realize resources with
    #[arg(long, default_value = "simulated")]
    pub provider: ProviderKind,

    /// Delete every created resource again after printing the endpoint
    #[arg(long)]
    pub destroy: bool,
}

impl UpArgs {
    /// Execute the up command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let (stack, page) = ctx.declare_site(&self.site)?;
        let site = page.urn().name().to_string();

        ctx.output.banner(&format!("UP [{}]", site));
        ctx.output.public_exposure(&site);

        let simulated = Arc::new(SimulatedProvider::new(ctx.region.clone()));
        let provider: Arc<dyn Provider> = match self.provider {
            ProviderKind::Simulated => simulated.clone(),
            ProviderKind::Aws => match aws_provider(ctx).await? {
                Some(provider) => provider,
                None => return Ok(2),
            },
        };

        let engine = Engine::new(provider).with_parallelism(ctx.parallelism);
        ctx.output.info(&format!(
            "Realizing {} resources with provider '{}' (parallelism {})",
            stack.len(),
            engine.provider().name(),
            engine.parallelism()
        ));

        let deployment = engine.execute(stack).await;

        if ctx.output.is_json() {
            ctx.output.json(&deployment)?;
        } else {
            ctx.output.deployment(&deployment);
        }

        if let Some(err) = deployment.failure() {
            ctx.output.error(&err.to_string());
            if err.is_provider() {
                ctx.output
                    .hint("Resources created before the failure were left in place.");
            }
            return Ok(1);
        }

        if let Some(endpoint) = deployment.outputs.get(URL_EXPORT).and_then(|v| v.as_str()) {
            ctx.output.endpoint(endpoint);
            if self.provider == ProviderKind::Simulated {
                match simulated.fetch(endpoint) {
                    Some(body) => ctx
                        .output
                        .info(&format!("Anonymous GET returned {} bytes", body.len())),
                    None => ctx.output.warning("Site is not publicly readable"),
                }
            }
        }

        if self.destroy {
            let deleted = engine.destroy(&deployment).await?;
            ctx.output
                .plain(&format!("Destroyed {} resources", deleted.len()));
        }

        Ok(0)
    }
}

#[cfg(feature = "aws")]
async fn aws_provider(ctx: &CommandContext) -> Result<Option<Arc<dyn Provider>>> {
    let provider = staticpage::engine::AwsProvider::new(Some(&ctx.region)).await?;
    Ok(Some(Arc::new(provider)))
}

#[cfg(not(feature = "aws"))]
async fn aws_provider(ctx: &CommandContext) -> Result<Option<Arc<dyn Provider>>> {
    ctx.output
        .error("The aws provider is not available in this build");
    ctx.output
        .hint("Rebuild with `--features aws` to provision real buckets.");
    Ok(None)
}
