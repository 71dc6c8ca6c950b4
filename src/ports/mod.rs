//! Ports module - Trait definitions for hexagonal architecture
//!
//! This module contains the trait definitions (ports) that define
//! the boundaries between the shell session logic and external adapters:
//! the remote API, the tunnel transport and the terminal.

mod api;
mod prompt;
mod tunnel;

pub use api::{ApiError, Branch, BranchApi, BranchCredentials, BranchStatus};
pub use prompt::BranchPicker;
pub use tunnel::{AsyncStream, CertSource, TunnelDialer, TunnelIdentity, TunnelStream};
