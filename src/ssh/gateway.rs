//! SSH gateway dialer
//!
//! Reaches a branch through the SSH gateway named in its tunnel identity:
//! one authenticated SSH connection per session, one `direct-tcpip`
//! channel per forwarded connection.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::client::{self, Config, Handle, Handler};
use russh::keys::key::PrivateKeyWithHashAlg;
use russh::keys::{PublicKey, decode_secret_key};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, error, info};

use super::known_hosts::verify_gateway_key;
use crate::config::TunnelConfig;
use crate::error::{Result, ShellError};
use crate::ports::{TunnelDialer, TunnelIdentity, TunnelStream};

/// Port the gateway routes branch connections to
pub const BRANCH_PORT: u32 = 3306;

const DEFAULT_SSH_PORT: u16 = 22;

/// Split `host[:port]` (IPv6 in brackets), defaulting to port 22
///
/// # Errors
///
/// Returns `Tunnel` for an empty host or an invalid port.
pub fn parse_gateway(gateway: &str) -> Result<(String, u16)> {
    let invalid = |reason: &str| ShellError::Tunnel {
        reason: format!("invalid gateway address '{gateway}': {reason}"),
    };

    let (host, port) = if let Some(rest) = gateway.strip_prefix('[') {
        let (host, after) = rest
            .split_once(']')
            .ok_or_else(|| invalid("unterminated '['"))?;
        match after.strip_prefix(':') {
            Some(port) => (host, Some(port)),
            None if after.is_empty() => (host, None),
            None => return Err(invalid("unexpected text after ']'")),
        }
    } else {
        match gateway.rsplit_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (gateway, None),
        }
    };

    if host.is_empty() {
        return Err(invalid("empty host"));
    }

    let port = match port {
        Some(p) => p.parse().map_err(|_| invalid("bad port"))?,
        None => DEFAULT_SSH_PORT,
    };

    Ok((host.to_string(), port))
}

/// russh handler checking the gateway key
struct GatewayHandler {
    hostname: String,
    port: u16,
    expected_fingerprint: Option<String>,
}

impl Handler for GatewayHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        match verify_gateway_key(
            &self.hostname,
            self.port,
            server_public_key,
            self.expected_fingerprint.as_deref(),
        ) {
            Ok(()) => Ok(true),
            Err(e) => {
                error!(error = %e, "Gateway key verification failed");
                Ok(false)
            }
        }
    }
}

struct GatewayConnection {
    gateway: String,
    handle: Arc<Handle<GatewayHandler>>,
}

/// [`TunnelDialer`] over an SSH gateway
pub struct SshGatewayDialer {
    connect_timeout: Duration,
    keepalive_interval: Duration,
    connection: Mutex<Option<GatewayConnection>>,
}

impl SshGatewayDialer {
    #[must_use]
    pub fn new(config: &TunnelConfig) -> Self {
        Self {
            connect_timeout: Duration::from_secs(config.connect_timeout_seconds),
            keepalive_interval: Duration::from_secs(config.keepalive_interval_seconds),
            connection: Mutex::new(None),
        }
    }

    /// Reuse the live gateway connection, or establish a new one
    async fn handle(&self, identity: &TunnelIdentity) -> Result<Arc<Handle<GatewayHandler>>> {
        let mut guard = self.connection.lock().await;

        if let Some(conn) = guard.as_ref() {
            if conn.gateway == identity.gateway && !conn.handle.is_closed() {
                return Ok(Arc::clone(&conn.handle));
            }
            debug!(gateway = %conn.gateway, "Gateway connection closed, reconnecting");
        }

        let handle = Arc::new(self.connect(identity).await?);
        *guard = Some(GatewayConnection {
            gateway: identity.gateway.clone(),
            handle: Arc::clone(&handle),
        });
        Ok(handle)
    }

    async fn connect(&self, identity: &TunnelIdentity) -> Result<Handle<GatewayHandler>> {
        let gateway = identity.gateway.as_str();
        let tunnel_err = |reason: String| ShellError::Tunnel { reason };

        let (host, port) = parse_gateway(gateway)?;

        let key = decode_secret_key(identity.private_key.as_str(), None)
            .map_err(|e| tunnel_err(format!("invalid tunnel private key: {e}")))?;

        let config = Arc::new(Config {
            keepalive_interval: Some(self.keepalive_interval),
            keepalive_max: 3,
            ..Default::default()
        });

        let handler = GatewayHandler {
            hostname: host.clone(),
            port,
            expected_fingerprint: identity.host_key_fingerprint.clone(),
        };

        let timeout_secs = self.connect_timeout.as_secs();
        let mut handle = timeout(
            self.connect_timeout,
            client::connect(config, (host.as_str(), port), handler),
        )
        .await
        .map_err(|_| {
            error!(gateway = %gateway, timeout_secs, "Gateway connection timeout");
            tunnel_err(format!(
                "connection to gateway {gateway} timed out after {timeout_secs}s"
            ))
        })?
        .map_err(|e| {
            error!(gateway = %gateway, error = %e, "Gateway connection failed");
            tunnel_err(format!("connection to gateway {gateway} failed: {e}"))
        })?;

        let hash_alg = handle
            .best_supported_rsa_hash()
            .await
            .ok()
            .flatten()
            .flatten();

        let auth = handle
            .authenticate_publickey(
                &identity.user,
                PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg),
            )
            .await
            .map_err(|e| tunnel_err(format!("gateway authentication error: {e}")))?;

        if !auth.success() {
            error!(gateway = %gateway, user = %identity.user, "Gateway authentication rejected");
            return Err(tunnel_err(format!(
                "gateway {gateway} rejected key for {}",
                identity.user
            )));
        }

        info!(gateway = %gateway, user = %identity.user, "Connected to gateway");
        Ok(handle)
    }
}

#[async_trait]
impl TunnelDialer for SshGatewayDialer {
    async fn dial(&self, identity: &TunnelIdentity, instance: &str) -> Result<TunnelStream> {
        let handle = self.handle(identity).await?;

        let channel = handle
            .channel_open_direct_tcpip(instance, BRANCH_PORT, "127.0.0.1", 0)
            .await
            .map_err(|e| ShellError::Tunnel {
                reason: format!("gateway refused channel to {instance}: {e}"),
            })?;

        debug!(instance = %instance, "Opened gateway channel");
        Ok(Box::pin(channel.into_stream()))
    }
}
