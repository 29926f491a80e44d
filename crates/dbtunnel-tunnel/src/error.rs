//! Tunnel errors

use thiserror::Error;

use crate::descriptor::{SanitizedDescriptor, TunnelDescriptor};

/// What went wrong while opening the forward
#[derive(Debug, Error)]
pub enum TunnelFailure {
    #[error("Failed to bind local port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("Bastion unreachable: {0}")]
    Unreachable(#[source] std::io::Error),

    #[error("Invalid private key: {0}")]
    InvalidKey(#[source] russh_keys::Error),

    #[error("SSH handshake failed: {0}")]
    Handshake(#[source] russh::Error),

    #[error("Bastion host key {actual} does not match expected fingerprint {expected}")]
    HostKeyMismatch { expected: String, actual: String },

    #[error("Bastion rejected public key authentication for user {user}")]
    AuthenticationRejected { user: String },
}

/// A failed tunnel attempt, with the descriptor it was opened from
#[derive(Debug, Error)]
#[error("Tunnel {descriptor} failed: {cause}")]
pub struct TunnelError {
    pub descriptor: SanitizedDescriptor,
    #[source]
    pub cause: TunnelFailure,
}

impl TunnelError {
    pub fn new(descriptor: &TunnelDescriptor, cause: TunnelFailure) -> Self {
        Self {
            descriptor: descriptor.sanitized(),
            cause,
        }
    }
}
