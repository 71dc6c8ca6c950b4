//! Tunnel Lifecycle
//!
//! Binds a local listener and relays every accepted connection to the
//! remote branch through a [`TunnelDialer`]. The forwarding task runs on a
//! child of the session's cancellation token; the [`TunnelHandle`] is the
//! only way to reach its bound address, so a launcher can never read the
//! address before the listener exists.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::target::Target;
use crate::config::DEFAULT_LOCAL_ADDR;
use crate::error::{Result, ShellError};
use crate::ports::{ApiError, CertSource, TunnelDialer, TunnelIdentity};

/// Where the tunnel listens and which gateway it uses
#[derive(Debug, Clone)]
pub struct TunnelOptions {
    /// Local bind address, `127.0.0.1:0` by default
    pub local_addr: String,
    /// Gateway override; the identity's gateway is used when `None`
    pub remote_addr: Option<String>,
}

impl Default for TunnelOptions {
    fn default() -> Self {
        Self {
            local_addr: DEFAULT_LOCAL_ADDR.to_string(),
            remote_addr: None,
        }
    }
}

/// A running tunnel.
///
/// Exposes only its bound address and a way to stop it.
#[derive(Debug)]
pub struct TunnelHandle {
    local_addr: SocketAddr,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl TunnelHandle {
    /// The actual bound address (port resolved even when binding port 0)
    #[must_use]
    pub const fn local_address(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop forwarding and wait for the task to finish.
    ///
    /// Returns the background error, if the task failed; it is for the
    /// caller to report, not to raise.
    pub async fn stop(self) -> Option<ShellError> {
        self.cancel.cancel();
        self.task.await.err().map(|e| ShellError::Tunnel {
            reason: format!("forwarding task failed: {e}"),
        })
    }
}

/// Starts tunnels for a target
pub struct TunnelManager {
    certs: Arc<dyn CertSource>,
    dialer: Arc<dyn TunnelDialer>,
}

impl TunnelManager {
    #[must_use]
    pub fn new(certs: Arc<dyn CertSource>, dialer: Arc<dyn TunnelDialer>) -> Self {
        Self { certs, dialer }
    }

    /// Obtain the tunnel identity, bind the local listener and spawn the
    /// forwarding task.
    ///
    /// # Errors
    ///
    /// Returns `TunnelStart` if the identity cannot be obtained or the
    /// local address cannot be bound.
    pub async fn start(
        &self,
        target: &Target,
        options: &TunnelOptions,
        cancel: &CancellationToken,
    ) -> Result<TunnelHandle> {
        let instance = target.instance();
        let start_err = |reason: String| ShellError::TunnelStart {
            instance: instance.clone(),
            reason,
        };

        let mut identity = self
            .certs
            .identity(&target.organization, &target.database, &target.branch)
            .await
            .map_err(|e| match e {
                ApiError::NotFound => start_err("no tunnel identity for this branch".to_string()),
                ApiError::Other(msg) => start_err(format!("failed to obtain tunnel identity: {msg}")),
            })?;

        if let Some(remote) = &options.remote_addr {
            identity.gateway.clone_from(remote);
        }

        // Bind first so the address is known before anything depends on it
        let listener = TcpListener::bind(options.local_addr.as_str())
            .await
            .map_err(|e| start_err(format!("failed to bind {}: {e}", options.local_addr)))?;

        let local_addr = listener
            .local_addr()
            .map_err(|e| start_err(format!("failed to read bound address: {e}")))?;

        info!(
            instance = %instance,
            local = %local_addr,
            gateway = %identity.gateway,
            "Tunnel listening"
        );

        let token = cancel.child_token();
        let task = tokio::spawn(forward_loop(
            listener,
            Arc::clone(&self.dialer),
            Arc::new(identity),
            instance,
            token.clone(),
        ));

        Ok(TunnelHandle {
            local_addr,
            cancel: token,
            task,
        })
    }
}

/// Pause after a failed accept, so a persistent condition such as
/// descriptor exhaustion does not spin
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Source of inbound connections for the forwarding loop
trait Incoming: Send + Sync + 'static {
    fn accept(&self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send;
}

impl Incoming for TcpListener {
    fn accept(&self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send {
        TcpListener::accept(self)
    }
}

/// Accept connections until cancelled. A failed accept only affects that
/// attempt. Dropping the `JoinSet` on exit aborts the connections still
/// being relayed.
async fn forward_loop<L: Incoming>(
    listener: L,
    dialer: Arc<dyn TunnelDialer>,
    identity: Arc<TunnelIdentity>,
    instance: String,
    cancel: CancellationToken,
) {
    let mut connections = JoinSet::new();

    loop {
        let accepted = tokio::select! {
            () = cancel.cancelled() => {
                debug!(instance = %instance, active = connections.len(), "Tunnel stopping");
                return;
            }
            accepted = listener.accept() => accepted,
            Some(_) = connections.join_next(), if !connections.is_empty() => continue,
        };

        let (stream, peer) = match accepted {
            Ok(conn) => conn,
            Err(e) => {
                warn!(instance = %instance, error = %e, "Tunnel: accept failed");
                tokio::select! {
                    () = cancel.cancelled() => return,
                    () = tokio::time::sleep(ACCEPT_BACKOFF) => continue,
                }
            }
        };

        debug!(instance = %instance, peer = %peer, "Tunnel: new connection");

        connections.spawn(relay(
            stream,
            Arc::clone(&dialer),
            Arc::clone(&identity),
            instance.clone(),
        ));
    }
}

async fn relay(
    mut local: TcpStream,
    dialer: Arc<dyn TunnelDialer>,
    identity: Arc<TunnelIdentity>,
    instance: String,
) {
    let mut remote = match dialer.dial(&identity, &instance).await {
        Ok(remote) => remote,
        Err(e) => {
            warn!(instance = %instance, error = %e, "Tunnel: could not reach remote branch");
            return;
        }
    };

    match tokio::io::copy_bidirectional(&mut local, &mut remote).await {
        Ok((sent, received)) => {
            debug!(instance = %instance, sent, received, "Tunnel connection closed");
        }
        Err(e) => debug!(instance = %instance, error = %e, "Tunnel connection ended"),
    }
}
