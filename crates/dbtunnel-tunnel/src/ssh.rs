//! SSH implementation of [`TunnelEstablisher`]

use async_trait::async_trait;
use russh::client;
use russh_keys::key::PublicKey;
use std::sync::{Arc, OnceLock};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::descriptor::{TunnelDescriptor, LOOPBACK_BIND};
use crate::error::{TunnelError, TunnelFailure};
use crate::forward;
use crate::TunnelEstablisher;

/// Opens forwards over a russh client session
///
/// Steps, each failing fast: decode the key, bind the local port, reach the
/// bastion, handshake (checking the host key when a fingerprint is given),
/// authenticate, then hand the listener to a detached forwarding task.
#[derive(Clone)]
pub struct SshTunnel {
    config: Arc<client::Config>,
}

impl SshTunnel {
    pub fn new() -> Self {
        Self::with_config(client::Config::default())
    }

    pub fn with_config(config: client::Config) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

impl Default for SshTunnel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TunnelEstablisher for SshTunnel {
    async fn open(&self, descriptor: &TunnelDescriptor) -> Result<u16, TunnelError> {
        let fail = |cause: TunnelFailure| TunnelError::new(descriptor, cause);
        let bind_failed = |source: std::io::Error| {
            fail(TunnelFailure::Bind {
                port: descriptor.local_port,
                source,
            })
        };

        // Local config fault; report it before touching the network
        let key = russh_keys::decode_secret_key(
            &descriptor.bastion_private_key,
            descriptor.key_passphrase.as_deref(),
        )
        .map_err(|e| fail(TunnelFailure::InvalidKey(e)))?;

        let listener = TcpListener::bind((LOOPBACK_BIND, descriptor.local_port))
            .await
            .map_err(bind_failed)?;
        let local_port = listener.local_addr().map_err(bind_failed)?.port();

        debug!(bastion = %descriptor.bastion(), "Connecting to bastion");
        let stream = TcpStream::connect((descriptor.bastion_host.as_str(), descriptor.bastion_port))
            .await
            .map_err(|e| fail(TunnelFailure::Unreachable(e)))?;

        let rejected_key = Arc::new(OnceLock::new());
        let handler = BastionHandler {
            expected: descriptor.host_key_fingerprint.clone(),
            rejected_key: rejected_key.clone(),
        };

        let mut session = match client::connect_stream(self.config.clone(), stream, handler).await
        {
            Ok(session) => session,
            Err(e) => {
                let cause = match (rejected_key.get(), &descriptor.host_key_fingerprint) {
                    (Some(actual), Some(expected)) => TunnelFailure::HostKeyMismatch {
                        expected: expected.clone(),
                        actual: actual.clone(),
                    },
                    _ => TunnelFailure::Handshake(e),
                };
                return Err(fail(cause));
            }
        };

        let authenticated = session
            .authenticate_publickey(descriptor.bastion_user.clone(), Arc::new(key))
            .await
            .map_err(|e| fail(TunnelFailure::Handshake(e)))?;
        if !authenticated {
            return Err(fail(TunnelFailure::AuthenticationRejected {
                user: descriptor.bastion_user.clone(),
            }));
        }

        info!(
            tunnel = %descriptor.sanitized(),
            local_port,
            "Tunnel listening"
        );

        tokio::spawn(forward::run(listener, session, descriptor.remote()));

        Ok(local_port)
    }
}

/// Client handler for the bastion session; only checks the host key
pub(crate) struct BastionHandler {
    expected: Option<String>,
    /// Fingerprint of a key that failed the check
    rejected_key: Arc<OnceLock<String>>,
}

#[async_trait]
impl client::Handler for BastionHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        let actual = server_public_key.fingerprint();

        match &self.expected {
            None => {
                warn!(
                    fingerprint = %actual,
                    "Accepting bastion host key without verification"
                );
                Ok(true)
            }
            Some(expected) if fingerprints_match(expected, &actual) => Ok(true),
            Some(_) => {
                let _ = self.rejected_key.set(actual);
                Ok(false)
            }
        }
    }
}

/// Compare fingerprints, ignoring a `SHA256:` prefix and base64 padding
fn fingerprints_match(expected: &str, actual: &str) -> bool {
    fn normalize(fingerprint: &str) -> &str {
        let fingerprint = fingerprint.trim();
        fingerprint
            .strip_prefix("SHA256:")
            .unwrap_or(fingerprint)
            .trim_end_matches('=')
    }

    normalize(expected) == normalize(actual)
}
