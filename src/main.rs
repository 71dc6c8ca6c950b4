use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use branch_shell::ShellError;
use branch_shell::cli::{Cli, apply_overrides, run_shell};
use branch_shell::config::{OutputFormat, default_config_path, load_config};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr; stdout and the terminal belong to the client
    let default_level = if cli.debug { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let json = cli.format == Some(OutputFormat::Json);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let code = e.downcast_ref::<ShellError>().map_or(1, ShellError::exit_code);
            report(&e, code, json);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);

    info!(config = %config_path.display(), "Loading configuration");

    let mut config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    apply_overrides(&mut config, &cli)?;

    run_shell(&config, &cli.database, cli.branch.as_deref(), cli.debug).await?;
    Ok(())
}

fn report(error: &anyhow::Error, code: i32, json: bool) {
    // The operator interrupted; the client has already reported what it needs to
    if matches!(error.downcast_ref::<ShellError>(), Some(ShellError::Cancelled)) {
        return;
    }

    if json {
        let body = serde_json::json!({
            "error": format!("{error:#}"),
            "exit_code": code,
        });
        println!("{body}");
    } else {
        eprintln!("Error: {error:#}");
    }
}
