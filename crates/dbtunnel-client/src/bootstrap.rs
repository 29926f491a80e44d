//! Bootstrap entry point

use dbtunnel_driver::BackendDriver;
use dbtunnel_proto::{validate, ConnectionOptions, Endpoint};
use dbtunnel_tunnel::{SshTunnel, TunnelEstablisher};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::BootstrapError;
use crate::registry::ClientRegistry;
use crate::strategy::{self, Strategy};

/// Confirmation returned by a successful bootstrap
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub backend: String,
    pub strategy: Strategy,
    /// Endpoint the driver connected to (the local forward when tunneled)
    pub endpoint: Endpoint,
    pub bastion: Option<Endpoint>,
}

impl fmt::Display for StatusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.bastion {
            None => write!(f, "Connected to {} at {}.", self.backend, self.endpoint),
            Some(bastion) => write!(
                f,
                "Connected to {} at {} through bastion {}.",
                self.backend, self.endpoint, bastion
            ),
        }
    }
}

/// Composition root for one backend family
///
/// Owns the driver, the tunnel establisher and a shared handle to the
/// [`ClientRegistry`] it publishes into.
pub struct Bootstrap<D: BackendDriver, T = SshTunnel> {
    driver: D,
    tunnels: T,
    registry: Arc<ClientRegistry<D::Client>>,
}

impl<D: BackendDriver> Bootstrap<D, SshTunnel> {
    pub fn new(driver: D) -> Self {
        Self::with_registry(driver, Arc::new(ClientRegistry::new()))
    }

    /// Publish into an existing registry
    pub fn with_registry(driver: D, registry: Arc<ClientRegistry<D::Client>>) -> Self {
        Self {
            driver,
            tunnels: SshTunnel::new(),
            registry,
        }
    }
}

impl<D, T> Bootstrap<D, T>
where
    D: BackendDriver,
    T: TunnelEstablisher,
{
    /// Swap the tunnel establisher (e.g. for a configured [`SshTunnel`])
    pub fn with_tunnel_establisher<U: TunnelEstablisher>(self, tunnels: U) -> Bootstrap<D, U> {
        Bootstrap {
            driver: self.driver,
            tunnels,
            registry: self.registry,
        }
    }

    pub fn registry(&self) -> &Arc<ClientRegistry<D::Client>> {
        &self.registry
    }

    /// Current client, `None` until a bootstrap succeeds
    pub fn client(&self) -> Option<Arc<D::Client>> {
        self.registry.get()
    }

    /// Validate `options`, connect, and publish the client
    ///
    /// Validation completes before any I/O. On failure the registry is left
    /// as it was.
    pub async fn init(&self, options: &Value) -> Result<StatusMessage, BootstrapError> {
        let options = validate(options).map_err(|e| {
            warn!("Rejected connection options: {}", e);
            e
        })?;
        self.init_validated(options).await
    }

    /// Connect with options that already passed validation
    pub async fn init_validated(
        &self,
        options: ConnectionOptions,
    ) -> Result<StatusMessage, BootstrapError> {
        debug!(
            environment = %options.environment,
            strategy = %Strategy::select(&options),
            backend = self.driver.name(),
            "Bootstrapping connection"
        );

        let established = strategy::establish(&options, &self.driver, &self.tunnels)
            .await
            .map_err(|e| {
                warn!("Bootstrap failed: {}", e);
                e
            })?;

        let status = StatusMessage {
            backend: self.driver.name().to_string(),
            strategy: established.strategy,
            endpoint: established.endpoint,
            bastion: established.bastion,
        };

        if self.registry.set(Arc::new(established.client)).is_some() {
            debug!("Replaced previously registered client");
        }
        info!("{}", status);

        Ok(status)
    }
}
