//! Config command - view and validate gdup configuration
//!
//! Provides the `gdup config` CLI command which:
//! 1. Shows the effective configuration (YAML or JSON)
//! 2. Validates the configuration file and reports errors
//! 3. Prints the path of the configuration file in use

use anyhow::{Context, Result};
use clap::Subcommand;
use gdup_core::config::{Config, WORKERS_RANGE};
use tracing::info;

use super::ConfigSource;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the effective configuration
    Show,
    /// Validate the configuration file
    Validate,
    /// Print the configuration file path
    Path,
}

impl ConfigCommand {
    pub async fn execute(&self, source: &ConfigSource, format: OutputFormat) -> Result<()> {
        match self {
            ConfigCommand::Show => execute_show(source, format),
            ConfigCommand::Validate => execute_validate(source, format),
            ConfigCommand::Path => execute_path(source, format),
        }
    }
}

/// Copy of the config that is safe to print
fn redacted(config: &Config) -> Config {
    let mut shown = config.clone();
    if shown.drive.access_token.is_some() {
        shown.drive.access_token = Some("<redacted>".to_string());
    }
    shown
}

fn execute_show(source: &ConfigSource, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    let config = redacted(&source.load()?);
    info!(config_path = %source.path().display(), "Showing configuration");

    if format.is_json() {
        let json = serde_json::to_value(&config).context("Failed to serialize configuration to JSON")?;
        formatter.print_json(&json);
    } else {
        formatter.success(&format!("Configuration ({})", source.path().display()));
        formatter.info("");
        let yaml = serde_yaml::to_string(&config).context("Failed to serialize configuration to YAML")?;
        for line in yaml.lines() {
            formatter.info(line);
        }
    }
    Ok(())
}

fn execute_validate(source: &ConfigSource, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    let path = source.path();

    if !path.exists() {
        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "valid": false,
                "config_path": path.display().to_string(),
                "errors": ["Configuration file not found. Using defaults."],
            }));
        } else {
            formatter.info(&format!("Configuration file not found at {}", path.display()));
            formatter.info("Using default configuration.");
        }
        return Ok(());
    }

    let config = match Config::load(path) {
        Ok(config) => config,
        Err(e) => {
            if format.is_json() {
                formatter.print_json(&serde_json::json!({
                    "valid": false,
                    "config_path": path.display().to_string(),
                    "errors": [format!("Failed to parse configuration: {e}")],
                }));
            } else {
                formatter.error(&format!("Failed to parse configuration: {e}"));
                formatter.info(&format!("File: {}", path.display()));
            }
            return Ok(());
        }
    };

    info!(config_path = %path.display(), "Validating configuration");
    let errors = config.validate();
    let mut warnings = Vec::new();
    if !config.workers_in_range() {
        warnings.push(format!(
            "workers = {} is outside {}..={}; a single worker will be used",
            config.workers,
            WORKERS_RANGE.start(),
            WORKERS_RANGE.end()
        ));
    }
    if config.drive.resolve_access_token().is_none() {
        warnings.push("no Drive access token configured".to_string());
    }

    if format.is_json() {
        let error_strings: Vec<String> = errors.iter().map(ToString::to_string).collect();
        formatter.print_json(&serde_json::json!({
            "valid": errors.is_empty(),
            "config_path": path.display().to_string(),
            "errors": error_strings,
            "warnings": warnings,
        }));
        return Ok(());
    }

    if errors.is_empty() {
        formatter.success("Configuration is valid");
    } else {
        formatter.error(&format!(
            "Configuration has {} error{}:",
            errors.len(),
            if errors.len() == 1 { "" } else { "s" }
        ));
    }
    formatter.info(&format!("File: {}", path.display()));
    for error in &errors {
        formatter.info(&format!("  {} - {}", error.field, error.message));
    }
    for warning in &warnings {
        formatter.warn(warning);
    }
    Ok(())
}

fn execute_path(source: &ConfigSource, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    if format.is_json() {
        formatter.print_json(&serde_json::json!({
            "config_path": source.path().display().to_string(),
            "exists": source.path().exists(),
        }));
    } else {
        formatter.line(&source.path().display().to_string());
    }
    Ok(())
}
