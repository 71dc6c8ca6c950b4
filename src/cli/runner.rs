//! CLI runner
//!
//! Builds the real adapters from configuration and runs one session under
//! a cancellation token tied to SIGINT and SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::Cli;
use super::prompt::TerminalPicker;
use crate::api::HttpApiClient;
use crate::config::{ClientConfig, Config, validate_local_addr};
use crate::domain::{
    LinkageInspector, ShellRequest, ShellServices, ShellSession, ShellSettings, TunnelOptions,
};
use crate::error::{Result, ShellError};
use crate::ssh::SshGatewayDialer;

const CLIENT_BINARY: &str = "mysql";

/// Apply command-line overrides on top of the loaded configuration
///
/// # Errors
///
/// Returns `ConfigInvalid` if the local address is unparsable or no
/// organization is set.
pub fn apply_overrides(config: &mut Config, cli: &Cli) -> Result<()> {
    if let Some(org) = &cli.org {
        config.organization.clone_from(org);
    }
    if let Some(addr) = &cli.local_addr {
        validate_local_addr(addr)?;
        config.tunnel.local_addr.clone_from(addr);
    }
    if let Some(addr) = &cli.remote_addr {
        config.tunnel.remote_addr = Some(addr.clone());
    }
    if let Some(format) = cli.format {
        config.output = format;
    }

    if config.organization.trim().is_empty() {
        return Err(ShellError::ConfigInvalid {
            field: "organization".to_string(),
            reason: "no organization configured; pass --org".to_string(),
        });
    }
    Ok(())
}

/// Locate the interactive client: the configured path, or `mysql` on `PATH`
///
/// # Errors
///
/// Returns `Launch` if the client cannot be found.
pub fn resolve_client(client: &ClientConfig) -> Result<PathBuf> {
    match &client.path {
        Some(path) => {
            let path = PathBuf::from(shellexpand::tilde(path).as_ref());
            if path.is_file() {
                Ok(path)
            } else {
                Err(ShellError::Launch {
                    program: path.display().to_string(),
                    reason: "configured client does not exist".to_string(),
                })
            }
        }
        None => which::which(CLIENT_BINARY).map_err(|e| ShellError::Launch {
            program: CLIENT_BINARY.to_string(),
            reason: format!("{e}; install the MySQL client or set client.path"),
        }),
    }
}

/// Session settings derived from configuration
#[must_use]
pub fn session_settings(config: &Config, client_program: PathBuf, verbose: bool) -> ShellSettings {
    ShellSettings {
        client_program,
        history_dir: PathBuf::from(shellexpand::tilde(&config.client.history_dir).as_ref()),
        credential_dir: None,
        linkage_inspector: LinkageInspector::from_setting(config.client.linkage_inspector),
        defaults_file_arg: config.client.defaults_file_arg,
        termination_grace: Duration::from_secs(config.client.termination_grace_seconds),
        tunnel: TunnelOptions {
            local_addr: config.tunnel.local_addr.clone(),
            remote_addr: config.tunnel.remote_addr.clone(),
        },
        verbose,
    }
}

/// Run an interactive session for `database` and optional `branch`
///
/// # Errors
///
/// Any session error; see [`ShellSession::run`].
pub async fn run_shell(
    config: &Config,
    database: &str,
    branch: Option<&str>,
    verbose: bool,
) -> Result<()> {
    let client_program = resolve_client(&config.client)?;
    debug!(client = %client_program.display(), "Using client");

    let api = Arc::new(HttpApiClient::new(&config.api)?);
    let services = ShellServices {
        api: api.clone(),
        certs: api,
        dialer: Arc::new(SshGatewayDialer::new(&config.tunnel)),
        picker: Arc::new(TerminalPicker::new(config.output)),
    };

    let cancel = CancellationToken::new();
    let signals = tokio::spawn(cancel_on_signal(cancel.clone()));

    let request = ShellRequest {
        organization: config.organization.clone(),
        database: database.to_string(),
        branch: branch.filter(|b| !b.is_empty()).map(str::to_string),
    };

    let result = ShellSession::new(services, session_settings(config, client_program, verbose))
        .run(&request, &cancel)
        .await;
    signals.abort();

    let target = result?;
    info!(target = %target, "Session ended");
    Ok(())
}

/// Cancel `token` on Ctrl+C or SIGTERM
async fn cancel_on_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C signal"),
        () = terminate => info!("Received SIGTERM signal"),
    }
    token.cancel();
}
