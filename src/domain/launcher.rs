//! Session Launcher
//!
//! Runs the interactive `mysql` client against the local tunnel endpoint
//! with the terminal attached. Credentials reach the client through the
//! session credential file only; they never appear in its arguments.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use crossterm::style::Stylize;
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::capability::ClientCapability;
use super::target::Target;
use crate::error::{Result, ShellError};

/// Environment variable carrying the credential file path
pub const DEFAULTS_FILE_ENV: &str = "BRANCH_SHELL_DEFAULTS_FILE";
pub const HISTFILE_ENV: &str = "MYSQL_HISTFILE";
pub const PS1_ENV: &str = "MYSQL_PS1";

const PRODUCTION_BRANCH: &str = "main";

/// Fully prepared client command line and environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInvocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl ClientInvocation {
    /// Base invocation: silent mode, table output, tunnel host and port
    #[must_use]
    pub fn new(program: impl Into<PathBuf>, local_addr: SocketAddr) -> Self {
        Self {
            program: program.into(),
            args: vec![
                "-s".to_string(),
                "-t".to_string(),
                "-h".to_string(),
                local_addr.ip().to_string(),
                "-P".to_string(),
                local_addr.port().to_string(),
            ],
            env: Vec::new(),
        }
    }

    /// Point the client at the credential file.
    ///
    /// With `as_argument`, `--defaults-extra-file` is passed as well; the
    /// stock client only honours it as the first argument. The path is
    /// always exported in the environment.
    #[must_use]
    pub fn credential_file(mut self, path: &Path, as_argument: bool) -> Self {
        let path = path.display().to_string();
        if as_argument {
            self.args.insert(0, format!("--defaults-extra-file={path}"));
        }
        self.env.push((DEFAULTS_FILE_ENV.to_string(), path));
        self
    }

    #[must_use]
    pub fn history_file(mut self, path: &Path) -> Self {
        self.env
            .push((HISTFILE_ENV.to_string(), path.display().to_string()));
        self
    }

    /// Add the styled prompt when the client can render it
    #[must_use]
    pub fn prompt(mut self, target: &Target, capability: ClientCapability) -> Self {
        if capability.supports_prompt_customization {
            self.env.push((PS1_ENV.to_string(), format_prompt(target)));
        }
        self
    }

    #[must_use]
    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// `<database>/<branch>> `, the branch bold blue, or bold red for `main`
#[must_use]
pub fn format_prompt(target: &Target) -> String {
    let branch = if target.branch == PRODUCTION_BRANCH {
        target.branch.as_str().bold().red()
    } else {
        target.branch.as_str().bold().blue()
    };
    format!("{}/{branch}> ", target.database.as_str().bold())
}

/// Run the client to completion, or terminate it on cancellation.
///
/// # Errors
///
/// - `Launch` if the client cannot be spawned or waited on
/// - `ClientExit` if it exits unsuccessfully
/// - `Cancelled` if `cancel` fires first; the client is sent SIGTERM and
///   killed once `grace` has elapsed
pub async fn launch(
    invocation: &ClientInvocation,
    target: &Target,
    cancel: &CancellationToken,
    grace: Duration,
) -> Result<()> {
    let program = invocation.program.display().to_string();
    let launch_err = |e: std::io::Error| ShellError::Launch {
        program: program.clone(),
        reason: e.to_string(),
    };

    let mut child = Command::new(&invocation.program)
        .args(&invocation.args)
        .envs(invocation.env.iter().map(|(k, v)| (k, v)))
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(launch_err)?;

    info!(target = %target, pid = ?child.id(), "Client started");

    let status = tokio::select! {
        status = child.wait() => status.map_err(launch_err)?,
        () = cancel.cancelled() => {
            terminate(&mut child, grace).await;
            return Err(ShellError::Cancelled);
        }
    };

    debug!(target = %target, %status, "Client exited");

    if status.success() {
        Ok(())
    } else {
        Err(ShellError::ClientExit {
            code: status.code(),
            organization: target.organization.clone(),
            database: target.database.clone(),
            branch: target.branch.clone(),
        })
    }
}

async fn terminate(child: &mut Child, grace: Duration) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        send_sigterm(pid);
        match tokio::time::timeout(grace, child.wait()).await {
            Ok(Ok(status)) => {
                debug!(%status, "Client terminated");
                return;
            }
            Ok(Err(e)) => warn!(error = %e, "Failed to wait for client"),
            Err(_) => warn!(grace_secs = grace.as_secs(), "Client ignored SIGTERM, killing"),
        }
    }

    if let Err(e) = child.kill().await {
        warn!(error = %e, "Failed to kill client");
    }
}

#[cfg(unix)]
#[allow(unsafe_code)]
fn send_sigterm(pid: u32) {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return;
    };
    // SAFETY: kill(2) has no memory-safety preconditions; pid is our unreaped child
    if unsafe { libc::kill(pid, libc::SIGTERM) } != 0 {
        warn!(pid, error = %std::io::Error::last_os_error(), "Failed to send SIGTERM");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(branch: &str) -> Target {
        Target::new("acme", "shop", branch)
    }

    fn addr() -> SocketAddr {
        "127.0.0.1:43306".parse().unwrap()
    }

    fn supported() -> ClientCapability {
        ClientCapability {
            supports_prompt_customization: true,
        }
    }

    // ============== Invocation ==============

    #[test]
    fn test_base_arguments() {
        let inv = ClientInvocation::new("mysql", addr());
        assert_eq!(inv.args, ["-s", "-t", "-h", "127.0.0.1", "-P", "43306"]);
        assert!(inv.env.is_empty());
    }

    #[test]
    fn test_credentials_passed_by_path_only() {
        let inv = ClientInvocation::new("mysql", addr())
            .credential_file(Path::new("/tmp/branch-shell-abc"), false);

        assert_eq!(inv.env_value(DEFAULTS_FILE_ENV), Some("/tmp/branch-shell-abc"));
        assert!(!inv.args.iter().any(|a| a.contains("branch-shell-abc")));
    }

    #[test]
    fn test_defaults_extra_file_argument_comes_first() {
        let inv = ClientInvocation::new("mysql", addr())
            .credential_file(Path::new("/tmp/branch-shell-abc"), true);

        assert_eq!(inv.args[0], "--defaults-extra-file=/tmp/branch-shell-abc");
        assert_eq!(inv.args[1], "-s");
    }

    #[test]
    fn test_history_env() {
        let inv = ClientInvocation::new("mysql", addr())
            .history_file(Path::new("/home/u/.branch-shell/history/acme.shop.main"));
        assert_eq!(
            inv.env_value(HISTFILE_ENV),
            Some("/home/u/.branch-shell/history/acme.shop.main")
        );
    }

    #[test]
    fn test_prompt_only_when_supported() {
        let plain = ClientInvocation::new("mysql", addr())
            .prompt(&target("dev"), ClientCapability::default());
        assert_eq!(plain.env_value(PS1_ENV), None);

        let styled = ClientInvocation::new("mysql", addr()).prompt(&target("dev"), supported());
        assert!(styled.env_value(PS1_ENV).is_some());
    }

    #[test]
    fn test_prompt_content() {
        let prompt = format_prompt(&target("dev"));
        assert!(prompt.contains("shop"));
        assert!(prompt.contains("dev"));
        assert!(prompt.ends_with("> "));
    }

    #[test]
    fn test_main_branch_prompt_is_red() {
        if std::env::var_os("NO_COLOR").is_some() {
            return;
        }
        let red = format!("{}", "main".bold().red());
        let blue = format!("{}", "dev".bold().blue());
        assert!(format_prompt(&target("main")).contains(&red));
        assert!(format_prompt(&target("dev")).contains(&blue));
    }

    // ============== Launch ==============

    /// Run `script` through `sh -c`, keeping the built arguments as `$@`
    #[cfg(unix)]
    fn shell(script: &str) -> ClientInvocation {
        let mut inv = ClientInvocation::new("/bin/sh", addr());
        inv.args
            .splice(0..0, ["-c".to_string(), script.to_string(), "client".to_string()]);
        inv
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_clean_exit() {
        let result = launch(
            &shell("exit 0"),
            &target("main"),
            &CancellationToken::new(),
            Duration::from_secs(1),
        )
        .await;
        assert!(result.is_ok());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_carries_code_and_target() {
        let err = launch(
            &shell("exit 3"),
            &target("main"),
            &CancellationToken::new(),
            Duration::from_secs(1),
        )
        .await
        .unwrap_err();

        assert_eq!(err.exit_code(), 3);
        match err {
            ShellError::ClientExit {
                code,
                organization,
                database,
                branch,
            } => {
                assert_eq!(code, Some(3));
                assert_eq!(organization, "acme");
                assert_eq!(database, "shop");
                assert_eq!(branch, "main");
            }
            other => panic!("Expected ClientExit, got: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_arguments_and_environment_reach_client() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("seen");
        let script = format!(
            "printf '%s|%s|%s' \"$*\" \"${DEFAULTS_FILE_ENV}\" \"${HISTFILE_ENV}\" > '{}'",
            out.display()
        );
        let inv = shell(&script)
            .credential_file(Path::new("/tmp/creds"), false)
            .history_file(Path::new("/tmp/hist"));

        launch(
            &inv,
            &target("dev"),
            &CancellationToken::new(),
            Duration::from_secs(1),
        )
        .await
        .unwrap();

        let seen = std::fs::read_to_string(out).unwrap();
        assert_eq!(seen, "-s -t -h 127.0.0.1 -P 43306|/tmp/creds|/tmp/hist");
    }

    #[tokio::test]
    async fn test_missing_client_is_launch_error() {
        let inv = ClientInvocation::new("/nonexistent/bin/mysql", addr());
        let err = launch(
            &inv,
            &target("main"),
            &CancellationToken::new(),
            Duration::from_secs(1),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ShellError::Launch { ref program, .. } if program == "/nonexistent/bin/mysql"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancellation_terminates_client() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let result = launch(
            &shell("exec sleep 30"),
            &target("main"),
            &cancel,
            Duration::from_secs(5),
        )
        .await;

        assert!(matches!(result, Err(ShellError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_client_ignoring_sigterm_is_killed_after_grace() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let started = std::time::Instant::now();
        let result = launch(
            &shell("trap '' TERM; while :; do sleep 1; done"),
            &target("main"),
            &cancel,
            Duration::from_millis(200),
        )
        .await;

        assert!(matches!(result, Err(ShellError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
