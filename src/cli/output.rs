//! Output formatting module for staticpage
//!
//! Provides colored human output and a JSON mode for scripting.

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use staticpage::engine::{Deployment, Plan, ResourceStatus};
use staticpage::resource::ResourceUrn;
use staticpage::state::{ChangeType, ResourceChange};
use std::time::Duration;

use super::diff::PropertyDiff;

/// Printed before anything is created.
pub const PUBLIC_EXPOSURE_WARNING: &str = "Every page of this site will be readable by anyone on the internet, \
     and the bucket is billed to the deploying account.";

/// Output formatter for different output modes
pub struct OutputFormatter {
    /// Use colored output
    use_color: bool,
    /// JSON output mode
    json_mode: bool,
    /// Verbosity level
    verbosity: u8,
}

impl OutputFormatter {
    /// Create a new output formatter
    pub fn new(use_color: bool, json_mode: bool, verbosity: u8) -> Self {
        // Respect NO_COLOR environment variable
        let use_color = use_color && std::env::var("NO_COLOR").is_err();
        colored::control::set_override(use_color);

        Self {
            use_color,
            json_mode,
            verbosity,
        }
    }

    /// Whether JSON output is active
    pub fn is_json(&self) -> bool {
        self.json_mode
    }

    /// Print a banner/header
    pub fn banner(&self, title: &str) {
        if self.json_mode {
            return;
        }

        let line = "=".repeat(title.len() + 4);
        if self.use_color {
            println!("\n{}", line.bright_blue());
            println!("{}", format!("  {}  ", title).bright_blue().bold());
            println!("{}\n", line.bright_blue());
        } else {
            println!("\n{}", line);
            println!("  {}  ", title);
            println!("{}\n", line);
        }
    }

    /// Print a section header
    pub fn section(&self, title: &str) {
        if self.json_mode {
            return;
        }

        if self.use_color {
            println!("\n{}", title.cyan().bold());
            println!("{}", "-".repeat(title.len()).cyan());
        } else {
            println!("\n{}", title);
            println!("{}", "-".repeat(title.len()));
        }
    }

    /// Warn that the site is world-readable. Goes to stderr in every mode.
    pub fn public_exposure(&self, site: &str) {
        let message = format!("Site '{}' is PUBLIC. {}", site, PUBLIC_EXPOSURE_WARNING);
        if self.json_mode {
            self.emit_stderr("warning", &message);
            return;
        }

        let line = "!".repeat(72);
        if self.use_color {
            eprintln!("{}", line.yellow().bold());
            eprintln!("{} {}", "PUBLIC:".yellow().bold(), message);
            eprintln!("{}", line.yellow().bold());
        } else {
            eprintln!("{}", line);
            eprintln!("PUBLIC: {}", message);
            eprintln!("{}", line);
        }
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        if self.json_mode {
            self.emit_stderr("error", message);
            return;
        }

        if self.use_color {
            eprintln!("{} {}", "ERROR:".red().bold(), message);
        } else {
            eprintln!("ERROR: {}", message);
        }
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.json_mode {
            self.emit_stderr("warning", message);
            return;
        }

        if self.use_color {
            eprintln!("{} {}", "WARNING:".yellow().bold(), message);
        } else {
            eprintln!("WARNING: {}", message);
        }
    }

    /// Print a hint message
    pub fn hint(&self, message: &str) {
        if self.json_mode {
            return;
        }

        if self.use_color {
            eprintln!("{} {}", "HINT:".cyan().bold(), message);
        } else {
            eprintln!("HINT: {}", message);
        }
    }

    /// Print an info message (respects verbosity)
    pub fn info(&self, message: &str) {
        if self.verbosity < 1 || self.json_mode {
            return;
        }

        if self.use_color {
            println!("{} {}", "INFO:".blue(), message);
        } else {
            println!("INFO: {}", message);
        }
    }

    /// Print a debug message (requires higher verbosity)
    pub fn debug(&self, message: &str) {
        if self.verbosity < 2 || self.json_mode {
            return;
        }

        if self.use_color {
            println!("{} {}", "DEBUG:".magenta(), message);
        } else {
            println!("DEBUG: {}", message);
        }
    }

    /// Print a line of plain output (always shown in human mode)
    pub fn plain(&self, message: &str) {
        if !self.json_mode {
            println!("{}", message);
        }
    }

    /// Print a value as pretty JSON on stdout
    pub fn json<T: Serialize>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    fn emit_stderr(&self, kind: &str, message: &str) {
        let event = serde_json::json!({
            "type": kind,
            "message": message
        });
        eprintln!("{}", event);
    }

    /// Print a plan: one line per changed resource, with property diffs.
    pub fn plan(&self, plan: &Plan) {
        if self.json_mode {
            return;
        }

        self.section("Plan");
        if plan.diff.is_empty() {
            self.plain("No changes. Infrastructure matches the declaration.");
        }

        let diff = PropertyDiff::new(self.use_color);
        for change in &plan.diff.changes {
            println!("  {}", self.change_line(change));
            if matches!(change.change, ChangeType::Update | ChangeType::Replace) {
                for property in &change.properties {
                    print!("{}", diff.render(property, 6));
                }
            }
        }

        if self.verbosity >= 1 {
            self.section("Execution order");
            for (i, wave) in plan.waves.iter().enumerate() {
                let names: Vec<&str> = wave.iter().map(ResourceUrn::name).collect();
                println!("  {}. {}", i + 1, names.join(", "));
            }
        }

        let summary = format!("\nPlan: {}", plan.diff.summary);
        if self.use_color {
            println!("{}", summary.bold());
        } else {
            println!("{}", summary);
        }
    }

    fn change_line(&self, change: &ResourceChange) -> String {
        let name = change
            .urn
            .parse::<ResourceUrn>()
            .map(|urn| urn.name().to_string())
            .unwrap_or_else(|_| change.urn.clone());
        let line = format!(
            "{:<2} {:<30} {}",
            change.change.symbol(),
            change.kind.short_name(),
            name
        );
        if !self.use_color {
            return line;
        }
        match change.change {
            ChangeType::Create => line.green().to_string(),
            ChangeType::Update => line.yellow().to_string(),
            ChangeType::Replace => line.magenta().to_string(),
            ChangeType::Delete => line.red().to_string(),
        }
    }

    /// Print the outcome of a deployment.
    pub fn deployment(&self, deployment: &Deployment) {
        if self.json_mode {
            return;
        }

        self.section("Resources");
        for record in deployment.resources.values() {
            let status = match (record.status, self.use_color) {
                (ResourceStatus::Created, true) => "created".green().to_string(),
                (ResourceStatus::Skipped, true) => "skipped".cyan().to_string(),
                (ResourceStatus::Failed, true) => "failed".red().bold().to_string(),
                (ResourceStatus::Created, false) => "created".to_string(),
                (ResourceStatus::Skipped, false) => "skipped".to_string(),
                (ResourceStatus::Failed, false) => "failed".to_string(),
            };
            print!(
                "  {:<8} {:<30} {}",
                status,
                record.kind.short_name(),
                record.urn.name()
            );
            if let Some(error) = &record.error {
                print!(" => {}", error);
            }
            println!();
        }

        let summary = deployment.summary();
        let duration = deployment
            .duration()
            .to_std()
            .map(format_duration)
            .unwrap_or_default();
        let line = format!(
            "\n{} created, {} skipped, {} failed in {}",
            summary.created, summary.skipped, summary.failed, duration
        );
        if !self.use_color {
            println!("{}", line);
        } else if deployment.is_success() {
            println!("{}", line.green().bold());
        } else {
            println!("{}", line.red().bold());
        }
    }

    /// Print the public URL of a site.
    pub fn endpoint(&self, endpoint: &str) {
        if self.json_mode {
            return;
        }

        if self.use_color {
            println!("\n{} {}", "Endpoint:".bright_white().bold(), endpoint.underline());
        } else {
            println!("\nEndpoint: {}", endpoint);
        }
    }
}

/// Format a duration for display
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let millis = duration.subsec_millis();

    if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs > 0 {
        format!("{}.{:03}s", secs, millis)
    } else {
        format!("{}ms", millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.500s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
    }

    #[test]
    fn test_json_mode() {
        let formatter = OutputFormatter::new(false, true, 0);
        assert!(formatter.is_json());
    }
}
