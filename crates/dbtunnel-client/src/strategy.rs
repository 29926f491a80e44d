//! Direct vs. tunneled connection strategy

use dbtunnel_driver::BackendDriver;
use dbtunnel_proto::{ConnectionOptions, Endpoint};
use dbtunnel_tunnel::{TunnelDescriptor, TunnelEstablisher};
use std::fmt;
use tracing::debug;

use crate::error::{BootstrapError, ConnectionError};

/// How the backend is reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Driver dials the configured endpoint
    Direct,
    /// Driver dials the local end of an SSH forward
    Tunneled,
}

impl Strategy {
    /// `Tunneled` iff the options asked for a tunnel, whatever the environment
    pub fn select(options: &ConnectionOptions) -> Self {
        if options.tunnel() {
            Strategy::Tunneled
        } else {
            Strategy::Direct
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Direct => f.write_str("direct"),
            Strategy::Tunneled => f.write_str("tunneled"),
        }
    }
}

/// A connected client and how it was reached
pub(crate) struct Established<C> {
    pub client: C,
    pub strategy: Strategy,
    /// Endpoint the driver actually dialed
    pub endpoint: Endpoint,
    pub bastion: Option<Endpoint>,
}

/// Run the selected strategy to completion
///
/// Tunneled: open the forward, then connect the driver to
/// `(forward host, local port)`. A tunnel failure returns before the driver
/// is called.
pub(crate) async fn establish<D, T>(
    options: &ConnectionOptions,
    driver: &D,
    tunnels: &T,
) -> Result<Established<D::Client>, BootstrapError>
where
    D: BackendDriver,
    T: TunnelEstablisher,
{
    let (endpoint, bastion) = match &options.bastion {
        None => (options.endpoint.clone(), None),
        Some(bastion) => {
            let descriptor = TunnelDescriptor::from_options(bastion, &options.endpoint);
            debug!(tunnel = %descriptor.sanitized(), "Opening tunnel");

            let local_port = tunnels.open(&descriptor).await?;
            let forward = bastion.forward_endpoint();
            (
                Endpoint::new(forward.host, local_port),
                Some(bastion.endpoint()),
            )
        }
    };

    debug!(
        backend = driver.name(),
        endpoint = %endpoint,
        "Connecting backend driver"
    );
    let client = driver
        .connect(&endpoint, &options.auth)
        .await
        .map_err(|source| ConnectionError {
            backend: driver.name().to_string(),
            endpoint: endpoint.clone(),
            source,
        })?;

    Ok(Established {
        client,
        strategy: Strategy::select(options),
        endpoint,
        bastion,
    })
}
