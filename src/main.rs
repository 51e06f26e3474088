//! staticpage - Public static websites on object storage
//!
//! This is the main entry point for the staticpage CLI.

mod cli;

use anyhow::Result;
use cli::commands::CommandContext;
use cli::{Cli, Commands};
use staticpage::config::Config;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Application authors
const AUTHORS: &str = env!("CARGO_PKG_AUTHORS");

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Load configuration
    let mut config_warning = None;
    let config = Config::load(cli.config.as_ref()).unwrap_or_else(|e| {
        config_warning = Some(format!("Failed to load config: {:#}", e));
        Config::default()
    });

    // Initialize logging based on verbosity and configuration
    let json_logs = cli.is_json() || config.logging.format == "json";
    init_logging(cli.verbosity(), &config.logging.level, json_logs);

    // Display version if verbose
    if cli.verbosity() >= 2 {
        eprintln!("{} by {}", staticpage::version_info(), AUTHORS);
    }

    // Create command context
    let mut ctx = CommandContext::new(&cli, config);
    if let Some(warning) = config_warning {
        ctx.output.warning(&warning);
    }

    // Execute the appropriate command
    let result = match &cli.command {
        Commands::Preview(args) => args.execute(&mut ctx).await,
        Commands::Up(args) => args.execute(&mut ctx).await,
        Commands::Graph(args) => args.execute(&mut ctx).await,
        Commands::Export(args) => args.execute(&mut ctx).await,
        Commands::Validate(args) => args.execute(&mut ctx).await,
    };

    let exit_code = match result {
        Ok(code) => code,
        Err(e) => {
            ctx.output.error(&format!("{:#}", e));
            1
        }
    };

    std::process::exit(exit_code);
}

/// Initialize logging based on verbosity level
fn init_logging(verbosity: u8, configured_level: &str, json: bool) {
    let filter = match verbosity {
        0 => configured_level,
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(verbosity >= 3)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!AUTHORS.is_empty());
        assert_eq!(staticpage::version(), env!("CARGO_PKG_VERSION"));
    }
}
