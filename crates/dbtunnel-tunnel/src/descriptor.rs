//! Tunnel descriptors

use dbtunnel_proto::{BastionOptions, Endpoint};
use std::fmt;

/// Address the local forward listens on
pub const LOOPBACK_BIND: &str = "127.0.0.1";

/// Everything needed to open one forward
#[derive(Clone, PartialEq, Eq)]
pub struct TunnelDescriptor {
    pub bastion_user: String,
    pub bastion_host: String,
    pub bastion_port: u16,
    pub bastion_private_key: String,
    pub key_passphrase: Option<String>,
    /// Expected SHA-256 host key fingerprint; any key is accepted when unset
    pub host_key_fingerprint: Option<String>,
    pub remote_host: String,
    pub remote_port: u16,
    /// Port to listen on; 0 lets the OS pick one
    pub local_port: u16,
}

impl TunnelDescriptor {
    /// Forward `local_forward_port` to `remote` through the configured bastion
    pub fn from_options(bastion: &BastionOptions, remote: &Endpoint) -> Self {
        Self {
            bastion_user: bastion.user.clone(),
            bastion_host: bastion.host.clone(),
            bastion_port: bastion.port,
            bastion_private_key: bastion.private_key.clone(),
            key_passphrase: bastion.key_passphrase.clone(),
            host_key_fingerprint: bastion.host_key_fingerprint.clone(),
            remote_host: remote.host.clone(),
            remote_port: remote.port,
            local_port: bastion.local_forward_port,
        }
    }

    pub fn bastion(&self) -> Endpoint {
        Endpoint::new(self.bastion_host.clone(), self.bastion_port)
    }

    pub fn remote(&self) -> Endpoint {
        Endpoint::new(self.remote_host.clone(), self.remote_port)
    }

    /// Copy without key material, safe to log or return in errors
    pub fn sanitized(&self) -> SanitizedDescriptor {
        SanitizedDescriptor {
            bastion_user: self.bastion_user.clone(),
            bastion_host: self.bastion_host.clone(),
            bastion_port: self.bastion_port,
            remote_host: self.remote_host.clone(),
            remote_port: self.remote_port,
            local_port: self.local_port,
        }
    }
}

impl fmt::Debug for TunnelDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TunnelDescriptor")
            .field("bastion_user", &self.bastion_user)
            .field("bastion_host", &self.bastion_host)
            .field("bastion_port", &self.bastion_port)
            .field("bastion_private_key", &"<redacted>")
            .field(
                "key_passphrase",
                &self.key_passphrase.as_ref().map(|_| "<redacted>"),
            )
            .field("host_key_fingerprint", &self.host_key_fingerprint)
            .field("remote_host", &self.remote_host)
            .field("remote_port", &self.remote_port)
            .field("local_port", &self.local_port)
            .finish()
    }
}

/// A [`TunnelDescriptor`] minus its secrets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedDescriptor {
    pub bastion_user: String,
    pub bastion_host: String,
    pub bastion_port: u16,
    pub remote_host: String,
    pub remote_port: u16,
    pub local_port: u16,
}

impl fmt::Display for SanitizedDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}:{} ({}:{} -> {}:{})",
            self.bastion_user,
            self.bastion_host,
            self.bastion_port,
            LOOPBACK_BIND,
            self.local_port,
            self.remote_host,
            self.remote_port
        )
    }
}
