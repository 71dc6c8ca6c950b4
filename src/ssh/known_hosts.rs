//! Gateway host key verification
//!
//! The API pins the gateway's key with a SHA256 fingerprint when it can;
//! otherwise the operator's `known_hosts` is consulted. Unknown gateways are
//! rejected, never learned.

use russh::keys::known_hosts::check_known_hosts;
use russh::keys::{Error as KeyError, HashAlg, PublicKey};
use tracing::{debug, warn};

#[cfg(unix)]
use std::os::unix::fs::MetadataExt;

use crate::error::{Result, ShellError};

/// Result of looking a key up in `known_hosts`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyResult {
    Match,
    /// Key differs from the entry on this line
    Mismatch { line: usize },
    Unknown,
}

/// Look a host key up in `known_hosts`
///
/// # Errors
///
/// Returns an error if the `known_hosts` file cannot be read or parsed.
pub fn verify(hostname: &str, port: u16, key: &PublicKey) -> Result<VerifyResult> {
    match check_known_hosts(hostname, port, key) {
        Ok(true) => {
            debug!(hostname = %hostname, port = %port, "Gateway key verified");
            Ok(VerifyResult::Match)
        }
        Ok(false) => Ok(VerifyResult::Unknown),
        Err(KeyError::KeyChanged { line }) => {
            warn!(
                hostname = %hostname,
                port = %port,
                line = %line,
                "Gateway key mismatch detected"
            );
            Ok(VerifyResult::Mismatch { line })
        }
        Err(e) => Err(ShellError::Tunnel {
            reason: format!("Failed to check known_hosts: {e}"),
        }),
    }
}

/// SHA256 fingerprint, `SHA256:<base64>`
#[must_use]
pub fn fingerprint(key: &PublicKey) -> String {
    key.fingerprint(HashAlg::Sha256).to_string()
}

/// Compare fingerprints, tolerating a missing `SHA256:` prefix and
/// base64 padding on the expected value
#[must_use]
pub fn fingerprint_matches(expected: &str, actual: &str) -> bool {
    fn normalize(fp: &str) -> &str {
        let fp = fp.trim();
        fp.strip_prefix("SHA256:").unwrap_or(fp).trim_end_matches('=')
    }
    !normalize(expected).is_empty() && normalize(expected) == normalize(actual)
}

#[cfg(unix)]
fn check_known_hosts_permissions() {
    let Some(home) = dirs::home_dir() else {
        return;
    };
    let known_hosts_path = home.join(".ssh").join("known_hosts");
    if let Ok(metadata) = std::fs::metadata(&known_hosts_path) {
        let mode = metadata.mode() & 0o777;
        if mode & 0o077 != 0 && mode != 0o644 {
            warn!(
                path = %known_hosts_path.display(),
                mode = format!("{mode:o}"),
                "known_hosts file has overly permissive permissions. \
                 Consider running: chmod 600 ~/.ssh/known_hosts"
            );
        }
    }
}

#[cfg(not(unix))]
fn check_known_hosts_permissions() {}

/// Accept the gateway key if it matches the pinned fingerprint or, with no
/// pin, a `known_hosts` entry.
///
/// # Errors
///
/// Returns `Tunnel` on a fingerprint mismatch, a `known_hosts` mismatch,
/// an unknown gateway, or an unreadable `known_hosts` file.
pub fn verify_gateway_key(
    hostname: &str,
    port: u16,
    key: &PublicKey,
    expected_fingerprint: Option<&str>,
) -> Result<()> {
    let actual = fingerprint(key);

    if let Some(expected) = expected_fingerprint {
        if fingerprint_matches(expected, &actual) {
            debug!(hostname = %hostname, "Gateway key matches pinned fingerprint");
            return Ok(());
        }
        return Err(ShellError::Tunnel {
            reason: format!(
                "gateway {hostname} presented key {actual}, expected {expected}"
            ),
        });
    }

    check_known_hosts_permissions();

    match verify(hostname, port, key)? {
        VerifyResult::Match => Ok(()),
        VerifyResult::Mismatch { line } => Err(ShellError::Tunnel {
            reason: format!(
                "gateway {hostname} key {actual} does not match known_hosts line {line}"
            ),
        }),
        VerifyResult::Unknown => Err(ShellError::Tunnel {
            reason: format!("gateway {hostname} is not in known_hosts (key {actual})"),
        }),
    }
}
