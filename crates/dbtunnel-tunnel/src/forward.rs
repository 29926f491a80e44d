//! Forwarding loop for an established tunnel

use dbtunnel_proto::Endpoint;
use russh::client::Handle;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, warn};

use crate::ssh::BastionHandler;

#[derive(Debug, Error)]
enum ForwardError {
    #[error("Failed to open channel to {remote}: {source}")]
    Channel {
        remote: Endpoint,
        #[source]
        source: russh::Error,
    },

    #[error("IO error during forwarding: {0}")]
    Io(#[from] std::io::Error),
}

/// How often an idle forward checks whether the bastion session is gone
const SESSION_CHECK_INTERVAL: Duration = Duration::from_millis(500);

/// Pause after a failed accept (e.g. EMFILE) before trying again
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Accept local connections and relay each one over its own
/// `direct-tcpip` channel. Runs until the bastion session closes, then drops
/// the listener so the local port can be bound again.
pub(crate) async fn run(listener: TcpListener, session: Handle<BastionHandler>, remote: Endpoint) {
    let session = Arc::new(session);
    let mut session_check = tokio::time::interval(SESSION_CHECK_INTERVAL);

    loop {
        let accepted = tokio::select! {
            accepted = listener.accept() => accepted,
            _ = session_check.tick() => {
                if session.is_closed() {
                    warn!(remote = %remote, "Bastion session closed, stopping forward");
                    break;
                }
                continue;
            }
        };

        let (stream, peer_addr) = match accepted {
            Ok(accepted) => accepted,
            Err(e) => {
                error!("Failed to accept forwarded connection: {}", e);
                tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                continue;
            }
        };

        if session.is_closed() {
            warn!(remote = %remote, "Bastion session closed, stopping forward");
            break;
        }

        debug!(peer = %peer_addr, remote = %remote, "New forwarded connection");

        let session = session.clone();
        let remote = remote.clone();
        tokio::spawn(async move {
            match forward_connection(&session, stream, peer_addr, &remote).await {
                Ok((to_remote, to_local)) => debug!(
                    peer = %peer_addr,
                    bytes_to_remote = to_remote,
                    bytes_to_local = to_local,
                    "Forwarded connection closed"
                ),
                Err(e) => error!("Error forwarding connection from {}: {}", peer_addr, e),
            }
        });
    }
}

async fn forward_connection(
    session: &Handle<BastionHandler>,
    mut stream: TcpStream,
    peer_addr: SocketAddr,
    remote: &Endpoint,
) -> Result<(u64, u64), ForwardError> {
    let channel = session
        .channel_open_direct_tcpip(
            remote.host.clone(),
            u32::from(remote.port),
            peer_addr.ip().to_string(),
            u32::from(peer_addr.port()),
        )
        .await
        .map_err(|source| ForwardError::Channel {
            remote: remote.clone(),
            source,
        })?;

    let mut channel_stream = channel.into_stream();
    let transferred = tokio::io::copy_bidirectional(&mut stream, &mut channel_stream).await?;

    Ok(transferred)
}
