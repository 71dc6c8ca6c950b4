use super::types::Config;
use crate::error::{ShellError, Result};
use std::net::SocketAddr;
use std::path::Path;
use tracing::{debug, warn};
use zeroize::Zeroizing;

/// Environment variable that overrides `api.token`
pub const TOKEN_ENV: &str = "BRANCH_SHELL_TOKEN";

/// Load configuration from a YAML file, honoring the token override from
/// [`TOKEN_ENV`].
///
/// # Errors
///
/// Returns an error if:
/// - The configuration file does not exist
/// - The file cannot be read
/// - The YAML content is invalid or cannot be parsed
/// - The configuration fails validation (e.g. no API token, bad local address)
pub fn load_config(path: &Path) -> Result<Config> {
    load_config_with_token(path, std::env::var(TOKEN_ENV).ok())
}

/// Load configuration from a YAML file with an explicit token override.
///
/// # Errors
///
/// Same conditions as [`load_config`].
pub fn load_config_with_token(path: &Path, token_override: Option<String>) -> Result<Config> {
    if !path.exists() {
        return Err(ShellError::ConfigNotFound {
            path: path.display().to_string(),
        });
    }

    // Warn if config file has overly permissive permissions (holds the API token)
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        if let Ok(metadata) = std::fs::metadata(path) {
            let mode = metadata.mode() & 0o777;
            if mode & 0o037 != 0 {
                warn!(
                    config_path = %path.display(),
                    permissions = format!("{mode:04o}"),
                    "Config file holds an API token and has permissive permissions. \
                     Consider: chmod 600 {}",
                    path.display()
                );
            }
        }
    }

    let content = std::fs::read_to_string(path)?;
    let mut config: Config = serde_saphyr::from_str(&content)?;

    if let Some(token) = token_override.filter(|t| !t.is_empty()) {
        debug!(env = TOKEN_ENV, "Using API token from environment");
        config.api.token = Zeroizing::new(token);
    }

    validate_config(&config)?;

    Ok(config)
}

/// Validate the configuration
fn validate_config(config: &Config) -> Result<()> {
    if config.api.base_url.trim().is_empty() {
        return Err(ShellError::ConfigInvalid {
            field: "api.base_url".to_string(),
            reason: "Base URL cannot be empty".to_string(),
        });
    }

    if !config.api.base_url.starts_with("http://") && !config.api.base_url.starts_with("https://")
    {
        return Err(ShellError::ConfigInvalid {
            field: "api.base_url".to_string(),
            reason: format!("'{}' is not an http(s) URL", config.api.base_url),
        });
    }

    if config.api.token.is_empty() {
        return Err(ShellError::ConfigInvalid {
            field: "api.token".to_string(),
            reason: "API token cannot be empty (set it in the config or via BRANCH_SHELL_TOKEN)"
                .to_string(),
        });
    }

    validate_local_addr(&config.tunnel.local_addr)?;

    if config.tunnel.connect_timeout_seconds == 0 {
        return Err(ShellError::ConfigInvalid {
            field: "tunnel.connect_timeout_seconds".to_string(),
            reason: "Connect timeout must be greater than zero".to_string(),
        });
    }

    Ok(())
}

/// Check that a local bind address parses as `ip:port`.
///
/// # Errors
///
/// Returns `ConfigInvalid` when the address cannot be parsed.
pub fn validate_local_addr(addr: &str) -> Result<()> {
    addr.parse::<SocketAddr>()
        .map(|_| ())
        .map_err(|e| ShellError::ConfigInvalid {
            field: "tunnel.local_addr".to_string(),
            reason: format!("'{addr}' is not a valid ip:port address: {e}"),
        })
}

/// Get the default configuration file path
#[must_use]
pub fn default_config_path() -> std::path::PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("branch-shell")
        .join("config.yaml")
}
