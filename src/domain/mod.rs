//! Domain module - Core session logic
//!
//! Resolution, validation and credential brokering, the tunnel
//! lifecycle and the interactive client launcher, tied together by
//! [`ShellSession`].

pub mod branch;
pub mod capability;
pub mod credentials;
pub mod history;
pub mod launcher;
pub mod session;
pub mod target;
pub mod tunnel;

pub use branch::{fetch_credentials, validate_branch};
pub use capability::{ClientCapability, LinkageInspector};
pub use credentials::SessionCredentialFile;
pub use history::history_file_path;
pub use launcher::{ClientInvocation, launch};
pub use session::{ShellRequest, ShellServices, ShellSession, ShellSettings};
pub use target::{Target, TargetResolver};
pub use tunnel::{TunnelHandle, TunnelManager, TunnelOptions};
