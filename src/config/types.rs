use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Organization used when `--org` is not given
    #[serde(default)]
    pub organization: String,

    #[serde(default)]
    pub output: OutputFormat,

    pub api: ApiConfig,

    #[serde(default)]
    pub client: ClientConfig,

    #[serde(default)]
    pub tunnel: TunnelConfig,
}

/// Output mode of the surrounding CLI.
///
/// Interactive branch selection is only offered in `Human` mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum OutputFormat {
    #[default]
    Human,
    Json,
}

/// Remote API access.
///
/// The token is wrapped in [`Zeroizing`] so it is erased from memory when
/// the config is dropped.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    pub base_url: String,

    #[serde(default)]
    pub token: Zeroizing<String>,

    #[serde(default = "default_api_timeout")]
    pub timeout_seconds: u64,
}

const fn default_api_timeout() -> u64 {
    30
}

/// How library linkage of the client binary is inspected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkageInspectorSetting {
    /// Pick the inspector for the current platform
    #[default]
    Auto,
    /// `otool -L` (macOS)
    Otool,
    /// `ldd` (glibc/musl systems)
    Ldd,
    /// Never customize the prompt
    None,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    /// Path to the `mysql` binary. Looked up in `PATH` when unset.
    #[serde(default)]
    pub path: Option<String>,

    #[serde(default = "default_history_dir")]
    pub history_dir: String,

    #[serde(default)]
    pub linkage_inspector: LinkageInspectorSetting,

    /// Pass `--defaults-extra-file=<path>` as the first client argument.
    /// Only the path is exposed. When disabled, the path is only exported
    /// in the environment for wrapper scripts.
    #[serde(default = "default_defaults_file_arg")]
    pub defaults_file_arg: bool,

    /// Time given to the client to exit after SIGTERM before it is killed
    #[serde(default = "default_termination_grace")]
    pub termination_grace_seconds: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            path: None,
            history_dir: default_history_dir(),
            linkage_inspector: LinkageInspectorSetting::default(),
            defaults_file_arg: default_defaults_file_arg(),
            termination_grace_seconds: default_termination_grace(),
        }
    }
}

fn default_history_dir() -> String {
    "~/.branch-shell/history".to_string()
}

const fn default_defaults_file_arg() -> bool {
    true
}

const fn default_termination_grace() -> u64 {
    5
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TunnelConfig {
    /// Local listen address; port 0 picks a free port
    #[serde(default = "default_local_addr")]
    pub local_addr: String,

    /// Gateway address override (`host:port`). Provided by the API when unset.
    #[serde(default)]
    pub remote_addr: Option<String>,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,

    #[serde(default = "default_keepalive")]
    pub keepalive_interval_seconds: u64,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            local_addr: default_local_addr(),
            remote_addr: None,
            connect_timeout_seconds: default_connect_timeout(),
            keepalive_interval_seconds: default_keepalive(),
        }
    }
}

/// Loopback with an ephemeral port
pub const DEFAULT_LOCAL_ADDR: &str = "127.0.0.1:0";

fn default_local_addr() -> String {
    DEFAULT_LOCAL_ADDR.to_string()
}

const fn default_connect_timeout() -> u64 {
    10
}

const fn default_keepalive() -> u64 {
    30
}
