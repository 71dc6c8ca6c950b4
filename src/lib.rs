//! Interactive MySQL sessions on managed database branches.
//!
//! A session resolves the target branch, obtains ephemeral credentials,
//! starts a locally bound tunnel through the branch's SSH gateway and runs
//! the `mysql` client against it. See [`domain::ShellSession`].

pub mod api;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod ports;
pub mod ssh;

pub use config::Config;
pub use domain::{ShellRequest, ShellServices, ShellSession, ShellSettings, Target};
pub use error::{Result, ShellError};
