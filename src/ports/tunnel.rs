//! Tunnel Ports
//!
//! The tunnel's wire protocol stays behind two seams: a [`CertSource`] that
//! yields the identity used to authenticate against the remote gateway, and
//! a [`TunnelDialer`] that turns that identity into a byte stream reaching
//! the remote branch.

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncWrite};
use zeroize::Zeroizing;

use super::api::ApiError;
use crate::error::Result;

/// Credentials for the authenticated channel to the gateway.
///
/// The private key is erased from memory on drop and never printed.
#[derive(Clone, Deserialize)]
pub struct TunnelIdentity {
    /// Gateway login
    pub user: String,

    /// Private key in OpenSSH PEM form
    pub private_key: Zeroizing<String>,

    /// Gateway address (`host:port`)
    pub gateway: String,

    /// Expected SHA256 fingerprint of the gateway host key
    #[serde(default)]
    pub host_key_fingerprint: Option<String>,
}

impl fmt::Debug for TunnelIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TunnelIdentity")
            .field("user", &self.user)
            .field("private_key", &"<redacted>")
            .field("gateway", &self.gateway)
            .field("host_key_fingerprint", &self.host_key_fingerprint)
            .finish()
    }
}

/// Bidirectional byte stream
pub trait AsyncStream: AsyncRead + AsyncWrite + Send {}

impl<T: AsyncRead + AsyncWrite + Send> AsyncStream for T {}

/// A connection to the remote branch
pub type TunnelStream = Pin<Box<dyn AsyncStream>>;

/// Source of tunnel identities
#[async_trait]
pub trait CertSource: Send + Sync {
    /// Obtain the identity for `organization/database/branch`
    async fn identity(
        &self,
        organization: &str,
        database: &str,
        branch: &str,
    ) -> std::result::Result<TunnelIdentity, ApiError>;
}

/// Opens connections to a remote branch
#[async_trait]
pub trait TunnelDialer: Send + Sync {
    /// Open one stream to `instance` (`organization/database/branch`)
    async fn dial(&self, identity: &TunnelIdentity, instance: &str) -> Result<TunnelStream>;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_debug_redacts_private_key() {
        let identity = mock::test_identity();
        let debug = format!("{identity:?}");
        assert!(debug.contains("tunnel-user"));
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("OPENSSH"));
    }

    #[test]
    fn test_identity_deserialization() {
        let identity: TunnelIdentity = serde_json::from_str(
            r#"{"user": "u", "private_key": "KEY", "gateway": "gw:22"}"#,
        )
        .unwrap();
        assert_eq!(identity.user, "u");
        assert_eq!(identity.private_key.as_str(), "KEY");
        assert_eq!(identity.gateway, "gw:22");
        assert!(identity.host_key_fingerprint.is_none());
    }
}
