//! Connection option definitions
//!
//! This crate defines the typed connection options shared by the tunnel,
//! driver and client crates, and the validator that turns an untyped
//! options value into them.

pub mod options;
pub mod validate;

pub use options::{
    AuthMaterial, BastionOptions, ConnectionOptions, Credentials, Endpoint, Environment,
    DEFAULT_FORWARD_HOST,
};
pub use validate::{validate, Field, FieldKind, Mode, ValidationError};
