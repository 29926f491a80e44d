//! Bootstrap errors

use dbtunnel_driver::DriverError;
use dbtunnel_proto::{Endpoint, ValidationError};
use dbtunnel_tunnel::TunnelError;
use thiserror::Error;

/// The backend driver failed to connect to the (possibly forwarded) endpoint
#[derive(Debug, Error)]
#[error("Could not connect to {backend} at {endpoint}: {source}")]
pub struct ConnectionError {
    pub backend: String,
    pub endpoint: Endpoint,
    #[source]
    pub source: DriverError,
}

/// Every way a bootstrap attempt can fail
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("Invalid connection options: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Tunnel(#[from] TunnelError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),
}
