//! SSH port forwarding through a bastion host
//!
//! Opens a local TCP listener whose connections are relayed over an
//! authenticated SSH session to a host:port only the bastion can reach.

pub mod descriptor;
pub mod error;
mod forward;
pub mod ssh;

pub use descriptor::{SanitizedDescriptor, TunnelDescriptor, LOOPBACK_BIND};
pub use error::{TunnelError, TunnelFailure};
pub use ssh::SshTunnel;

use async_trait::async_trait;
use std::sync::Arc;

/// Establishes a local-to-remote port forward
///
/// Resolves with the local port once the listener accepts connections. The
/// forward stays up for the rest of the process; there is no teardown.
#[async_trait]
pub trait TunnelEstablisher: Send + Sync {
    async fn open(&self, descriptor: &TunnelDescriptor) -> Result<u16, TunnelError>;
}

#[async_trait]
impl<T: TunnelEstablisher + ?Sized> TunnelEstablisher for Arc<T> {
    async fn open(&self, descriptor: &TunnelDescriptor) -> Result<u16, TunnelError> {
        (**self).open(descriptor).await
    }
}
