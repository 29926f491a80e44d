//! Connection bootstrap - Public API
//!
//! Validates connection options, picks the direct or tunneled strategy,
//! opens the SSH forward when needed, connects the backend driver and
//! publishes the resulting client in a [`ClientRegistry`].
//!
//! # Quick Start
//!
//! ```ignore
//! use dbtunnel_client::{Bootstrap, SearchDriver};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bootstrap = Bootstrap::new(SearchDriver::default());
//!
//!     let status = bootstrap
//!         .init(&json!({
//!             "environment": "local",
//!             "tunnel": false,
//!             "backend_host": "localhost",
//!             "backend_port": 9200,
//!         }))
//!         .await?;
//!     println!("{}", status);
//!
//!     let client = bootstrap.registry().client()?;
//!     let health = client.request(reqwest::Method::GET, "/_cluster/health").send().await?;
//!     Ok(())
//! }
//! ```
//!
//! The registry is an explicit object: hand `bootstrap.registry().clone()`
//! to whatever needs read access instead of reaching for a global.

pub mod bootstrap;
pub mod error;
pub mod registry;
pub mod strategy;

pub use bootstrap::{Bootstrap, StatusMessage};
pub use error::{BootstrapError, ConnectionError};
pub use registry::{ClientRegistry, RegistryError};
pub use strategy::Strategy;

// Re-export the building blocks so callers need a single dependency
pub use dbtunnel_driver::{
    BackendDriver, DriverError, SearchClient, SearchDriver, WireClient, WireDriver, WireStream,
};
pub use dbtunnel_proto::{
    validate, AuthMaterial, BastionOptions, ConnectionOptions, Credentials, Endpoint, Environment,
    Mode, ValidationError,
};
pub use dbtunnel_tunnel::{
    SanitizedDescriptor, SshTunnel, TunnelDescriptor, TunnelError, TunnelEstablisher,
    TunnelFailure,
};
