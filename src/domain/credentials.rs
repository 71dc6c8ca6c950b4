//! Session Credential File
//!
//! Holds the branch credentials in a client option file so they never
//! appear on a command line. The file lives exactly as long as its
//! [`SessionCredentialFile`] value.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{Result, ShellError};
use crate::ports::BranchCredentials;

const FILE_PREFIX: &str = "branch-shell-";

/// A restricted-permission temporary file with a `[client]` stanza.
///
/// Removed when dropped; removal failures are logged, never raised.
#[derive(Debug)]
pub struct SessionCredentialFile {
    path: PathBuf,
}

impl SessionCredentialFile {
    /// Create the file in the system temporary directory.
    ///
    /// # Errors
    ///
    /// Returns `CredentialFilePersist` if the file cannot be created or written.
    pub fn create(credentials: &BranchCredentials) -> Result<Self> {
        Self::create_in(&std::env::temp_dir(), credentials)
    }

    /// Create the file in `dir`.
    ///
    /// # Errors
    ///
    /// Returns `CredentialFilePersist` if the file cannot be created or written.
    pub fn create_in(dir: &Path, credentials: &BranchCredentials) -> Result<Self> {
        let persist_err = |e: std::io::Error| ShellError::CredentialFilePersist {
            reason: e.to_string(),
        };

        // NamedTempFile is created with mode 0600 on unix
        let mut file = tempfile::Builder::new()
            .prefix(FILE_PREFIX)
            .tempfile_in(dir)
            .map_err(persist_err)?;

        write!(
            file,
            "[client]\nuser={}\npassword={}\n",
            credentials.user,
            credentials.password.as_str()
        )
        .and_then(|()| file.flush())
        .map_err(persist_err)?;

        let path = file
            .into_temp_path()
            .keep()
            .map_err(|e| ShellError::CredentialFilePersist {
                reason: e.to_string(),
            })?;

        debug!(path = %path.display(), "Credential file created");
        Ok(Self { path })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SessionCredentialFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Credential file removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to remove credential file"
            ),
        }
    }
}
