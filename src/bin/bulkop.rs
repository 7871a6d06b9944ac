//! Bulkop CLI Binary
//!
//! Command-line interface for batched record operations.

use anyhow::Context;
use bulkop::cli::{map_error, Cli, RunContext};
use bulkop::config::ConfigLoader;
use bulkop::error::ApiError;
use bulkop::logging::{init_logging, LoggingConfig};
use clap::Parser;
use std::process;
use tracing::{error, info};

fn main() {
    let cli = Cli::parse();

    // Build logging config from CLI args, env vars, and config file
    let logging_config = build_logging_config(&cli);

    if let Err(e) = init_logging(Some(&logging_config)) {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    info!("Bulkop CLI starting");

    if let Err(e) = run(&cli) {
        error!("Command failed: {:#}", e);
        let api_error = e.downcast_ref::<ApiError>();
        match api_error {
            Some(api_error) => eprintln!("{}", map_error(api_error)),
            None => eprintln!("{:#}", e),
        }
        let code = match api_error {
            Some(ApiError::Cancelled) => 130,
            _ => 1,
        };
        process::exit(code);
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let context = RunContext::new(
        cli.workspace.clone(),
        cli.config.clone(),
        cli.endpoint.clone(),
        cli.verbose,
    )
    .context("Failed to initialize configuration")?;
    info!("CLI context initialized");

    let output = context.execute(&cli.command)?;
    info!("Command completed successfully");
    if !output.is_empty() {
        println!("{}", output);
    }
    Ok(())
}

/// Build logging configuration from CLI args, environment, and config file.
/// Precedence: CLI flags override config file override defaults.
fn build_logging_config(cli: &Cli) -> LoggingConfig {
    let mut config = if let Some(ref config_path) = cli.config {
        ConfigLoader::load_from_file(config_path)
            .ok()
            .map(|c| c.logging)
            .unwrap_or_default()
    } else {
        ConfigLoader::load(&cli.workspace)
            .ok()
            .map(|c| c.logging)
            .unwrap_or_default()
    };

    if cli.quiet {
        config.enabled = false;
    }
    if cli.verbose {
        config.level = "debug".to_string();
        // Verbose diagnostics go to stderr; keep logs visible there too.
        if config.output == "file" {
            config.output = "file+stderr".to_string();
        }
    }
    if let Some(ref level) = cli.log_level {
        config.level = level.clone();
    }
    if let Some(ref format) = cli.log_format {
        config.format = format.clone();
    }
    if let Some(ref output) = cli.log_output {
        config.output = output.clone();
    }
    if let Some(ref file) = cli.log_file {
        config.file = Some(file.clone());
    }

    config
}
