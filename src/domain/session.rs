//! Shell Session Use Case
//!
//! Orchestrates one interactive session:
//! 1. Resolve the target branch
//! 2. Validate it and fetch ephemeral credentials
//! 3. Start the tunnel
//! 4. Write the credential file and prepare the history file
//! 5. Detect client capabilities and launch the client
//!
//! The tunnel and the credential file outlive the client and are torn down
//! on every exit path.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::branch::{fetch_credentials, validate_branch};
use super::capability::{LinkageInspector, detect};
use super::credentials::SessionCredentialFile;
use super::history::history_file_path;
use super::launcher::{ClientInvocation, launch};
use super::target::{Target, TargetResolver};
use super::tunnel::{TunnelHandle, TunnelManager, TunnelOptions};
use crate::error::{Result, ShellError};
use crate::ports::{BranchApi, BranchCredentials, BranchPicker, CertSource, TunnelDialer};

/// What the operator asked to connect to
#[derive(Debug, Clone)]
pub struct ShellRequest {
    pub organization: String,
    pub database: String,
    pub branch: Option<String>,
}

/// Local environment of a session
#[derive(Debug, Clone)]
pub struct ShellSettings {
    /// Resolved path of the interactive client
    pub client_program: PathBuf,
    pub history_dir: PathBuf,
    /// Directory for the credential file; the system temp dir when `None`
    pub credential_dir: Option<PathBuf>,
    pub linkage_inspector: LinkageInspector,
    /// Also pass `--defaults-extra-file` to the client
    pub defaults_file_arg: bool,
    pub termination_grace: Duration,
    pub tunnel: TunnelOptions,
    /// Report capability detection problems
    pub verbose: bool,
}

/// Adapters the session talks to
#[derive(Clone)]
pub struct ShellServices {
    pub api: Arc<dyn BranchApi>,
    pub certs: Arc<dyn CertSource>,
    pub dialer: Arc<dyn TunnelDialer>,
    pub picker: Arc<dyn BranchPicker>,
}

pub struct ShellSession {
    services: ShellServices,
    settings: ShellSettings,
}

impl ShellSession {
    #[must_use]
    pub const fn new(services: ShellServices, settings: ShellSettings) -> Self {
        Self { services, settings }
    }

    /// Run a full session. The client's outcome is the session's outcome;
    /// a background tunnel failure is logged but never replaces it.
    ///
    /// # Errors
    ///
    /// Any resolution, validation, credential, tunnel or launch error, the
    /// client's unsuccessful exit, or `Cancelled`.
    pub async fn run(&self, request: &ShellRequest, cancel: &CancellationToken) -> Result<Target> {
        let api = self.services.api.as_ref();

        let target = TargetResolver::new(api, self.services.picker.as_ref())
            .resolve(
                &request.organization,
                &request.database,
                request.branch.as_deref(),
            )
            .await?;

        validate_branch(api, &target).await?;
        let credentials = fetch_credentials(api, &target).await?;

        if cancel.is_cancelled() {
            return Err(ShellError::Cancelled);
        }

        let tunnel = TunnelManager::new(
            Arc::clone(&self.services.certs),
            Arc::clone(&self.services.dialer),
        )
        .start(&target, &self.settings.tunnel, cancel)
        .await?;

        let result = self
            .run_client(&target, &credentials, &tunnel, cancel)
            .await;

        if let Some(e) = tunnel.stop().await {
            warn!(target = %target, error = %e, "Tunnel reported an error");
        }

        result.map(|()| target)
    }

    /// Everything that needs the tunnel; the credential file is removed
    /// when this returns.
    async fn run_client(
        &self,
        target: &Target,
        credentials: &BranchCredentials,
        tunnel: &TunnelHandle,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let credential_file = match &self.settings.credential_dir {
            Some(dir) => SessionCredentialFile::create_in(dir, credentials)?,
            None => SessionCredentialFile::create(credentials)?,
        };

        let history_file = history_file_path(&self.settings.history_dir, target)?;

        let capability = detect(
            self.settings.linkage_inspector,
            &self.settings.client_program,
            self.settings.verbose,
        )
        .await;

        if cancel.is_cancelled() {
            return Err(ShellError::Cancelled);
        }

        let invocation =
            ClientInvocation::new(&self.settings.client_program, tunnel.local_address())
                .credential_file(credential_file.path(), self.settings.defaults_file_arg)
                .history_file(&history_file)
                .prompt(target, capability);

        info!(
            target = %target,
            local = %tunnel.local_address(),
            "Connecting to branch"
        );

        launch(
            &invocation,
            target,
            cancel,
            self.settings.termination_grace,
        )
        .await
    }
}
