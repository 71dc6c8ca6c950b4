//! CLI module
//!
//! Argument parsing, the terminal branch picker and the runner that wires
//! the real adapters into a [`crate::domain::ShellSession`].

mod prompt;
mod runner;

use std::path::PathBuf;

use clap::Parser;

use crate::config::OutputFormat;

pub use prompt::TerminalPicker;
pub use runner::{apply_overrides, run_shell};

/// Branch Shell - interactive MySQL sessions on database branches
#[derive(Parser, Debug)]
#[command(name = "branch-shell")]
#[command(about = "Open an interactive MySQL shell to a database branch over a secure tunnel")]
#[command(version)]
#[command(after_help = "EXAMPLES:
    # Open a shell to the main branch of the shop database
    branch-shell shop main

    # Pick the branch interactively (auto-selected when there is only one)
    branch-shell shop

    # Use another organization
    branch-shell --org acme shop dev

    # Listen on a fixed local port
    branch-shell --local-addr 127.0.0.1:3307 shop main

    # Verbose logging to stderr
    branch-shell --debug shop main")]
pub struct Cli {
    /// Database name
    pub database: String,

    /// Branch name; selected interactively when omitted
    pub branch: Option<String>,

    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Organization (overrides the configured one)
    #[arg(long)]
    pub org: Option<String>,

    /// Local address for the tunnel listener
    #[arg(long)]
    pub local_addr: Option<String>,

    /// Gateway address (overrides the one issued with the tunnel identity)
    #[arg(long)]
    pub remote_addr: Option<String>,

    /// Output format
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}
