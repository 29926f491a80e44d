//! Backend driver abstraction
//!
//! A driver turns a reachable endpoint into a connected client handle. The
//! bootstrap logic only ever talks to [`BackendDriver`], so the same
//! direct/tunneled sequencing serves every backend family.

pub mod search;
pub mod tls;
pub mod wire;

pub use search::{ClusterInfo, ClusterVersion, SearchClient, SearchDriver};
pub use wire::{WireClient, WireDriver, WireStream};

use async_trait::async_trait;
use dbtunnel_proto::{AuthMaterial, Endpoint};
use std::sync::Arc;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Driver errors
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("Backend unreachable: {0}")]
    Unreachable(#[source] BoxError),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error(transparent)]
    Other(BoxError),
}

/// Connects to one backend family
#[async_trait]
pub trait BackendDriver: Send + Sync {
    /// Connected client handle
    type Client: Send + Sync + 'static;

    /// Human-readable backend name, used in status messages
    fn name(&self) -> &str;

    /// Connect to `endpoint`; a single attempt, no retry
    async fn connect(
        &self,
        endpoint: &Endpoint,
        auth: &AuthMaterial,
    ) -> Result<Self::Client, DriverError>;
}

#[async_trait]
impl<D: BackendDriver> BackendDriver for Arc<D> {
    type Client = D::Client;

    fn name(&self) -> &str {
        (**self).name()
    }

    async fn connect(
        &self,
        endpoint: &Endpoint,
        auth: &AuthMaterial,
    ) -> Result<Self::Client, DriverError> {
        (**self).connect(endpoint, auth).await
    }
}
