//! Options validation
//!
//! Options arrive as an untyped [`serde_json::Value`]. The `environment` and
//! `tunnel` keys select a [`Mode`], and the mode's schema is then checked in a
//! fixed order so the first reported error is the same on every run:
//!
//! | mode            | fields (in order)                                              |
//! |-----------------|----------------------------------------------------------------|
//! | local direct    | `backend_host`, `backend_port`                                 |
//! | local tunneled  | local direct fields, bastion fields                            |
//! | remote direct   | `cluster_host`, `cluster_port`, `credentials`?, `tls_ca`?      |
//! | remote tunneled | remote direct fields, bastion fields                           |
//!
//! Bastion fields are `bastion_user`, `bastion_host`, `bastion_port`,
//! `bastion_private_key`, `local_forward_port`, `bastion_key_passphrase`?,
//! `bastion_host_key`?, `forward_host`?. Every mode ends with `database`?.
//! A `?` marks an optional field. Keys outside the schema are ignored and a
//! `null` value counts as absent.

use serde_json::{Map, Value};
use std::collections::HashMap;
use thiserror::Error;

use crate::options::{
    AuthMaterial, BastionOptions, ConnectionOptions, Credentials, Endpoint, Environment,
};

/// Validation errors, naming the first offending field
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Options must be an object")]
    NotAnObject,

    #[error("Missing required field `{field}`")]
    MissingField { field: String },

    #[error("Field `{field}` must be a {expected}")]
    InvalidType {
        field: String,
        expected: &'static str,
    },

    #[error("Field `{field}` is invalid: {reason}")]
    InvalidValue { field: String, reason: String },
}

impl ValidationError {
    /// Name of the offending field, if the error is about one
    pub fn field(&self) -> Option<&str> {
        match self {
            ValidationError::NotAnObject => None,
            ValidationError::MissingField { field }
            | ValidationError::InvalidType { field, .. }
            | ValidationError::InvalidValue { field, .. } => Some(field),
        }
    }

    fn missing(field: &str) -> Self {
        ValidationError::MissingField {
            field: field.to_string(),
        }
    }

    fn invalid_type(field: &str, expected: &'static str) -> Self {
        ValidationError::InvalidType {
            field: field.to_string(),
            expected,
        }
    }
}

/// Primitive type a schema field must have
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    /// Integer in `0..=65535`
    Port,
    /// Integer in `1..=65535`
    NonZeroPort,
    /// Object with string `username` and `password`
    Credentials,
}

impl FieldKind {
    fn expected(self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Port => "port number (0-65535)",
            FieldKind::NonZeroPort => "port number (1-65535)",
            FieldKind::Credentials => "object with `username` and `password`",
        }
    }
}

/// One entry of a mode's schema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

const fn required(name: &'static str, kind: FieldKind) -> Field {
    Field {
        name,
        kind,
        required: true,
    }
}

const fn optional(name: &'static str, kind: FieldKind) -> Field {
    Field {
        name,
        kind,
        required: false,
    }
}

const LOCAL_FIELDS: &[Field] = &[
    required("backend_host", FieldKind::String),
    required("backend_port", FieldKind::Port),
];

const REMOTE_FIELDS: &[Field] = &[
    required("cluster_host", FieldKind::String),
    required("cluster_port", FieldKind::Port),
    optional("credentials", FieldKind::Credentials),
    optional("tls_ca", FieldKind::String),
];

const BASTION_FIELDS: &[Field] = &[
    required("bastion_user", FieldKind::String),
    required("bastion_host", FieldKind::String),
    required("bastion_port", FieldKind::NonZeroPort),
    required("bastion_private_key", FieldKind::String),
    required("local_forward_port", FieldKind::NonZeroPort),
    optional("bastion_key_passphrase", FieldKind::String),
    optional("bastion_host_key", FieldKind::String),
    optional("forward_host", FieldKind::String),
];

const COMMON_FIELDS: &[Field] = &[optional("database", FieldKind::String)];

/// Schema selector derived from `environment` and `tunnel`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    LocalDirect,
    LocalTunneled,
    RemoteDirect,
    RemoteTunneled,
}

impl Mode {
    pub fn new(environment: Environment, tunnel: bool) -> Self {
        match (environment, tunnel) {
            (Environment::Local, false) => Mode::LocalDirect,
            (Environment::Local, true) => Mode::LocalTunneled,
            (Environment::Remote, false) => Mode::RemoteDirect,
            (Environment::Remote, true) => Mode::RemoteTunneled,
        }
    }

    pub fn environment(self) -> Environment {
        match self {
            Mode::LocalDirect | Mode::LocalTunneled => Environment::Local,
            Mode::RemoteDirect | Mode::RemoteTunneled => Environment::Remote,
        }
    }

    pub fn is_tunneled(self) -> bool {
        matches!(self, Mode::LocalTunneled | Mode::RemoteTunneled)
    }

    /// The mode's schema, in checking order
    pub fn fields(self) -> Vec<Field> {
        let base = match self.environment() {
            Environment::Local => LOCAL_FIELDS,
            Environment::Remote => REMOTE_FIELDS,
        };
        let mut fields = base.to_vec();
        if self.is_tunneled() {
            fields.extend_from_slice(BASTION_FIELDS);
        }
        fields.extend_from_slice(COMMON_FIELDS);
        fields
    }

    /// Names of the fields that must be present
    pub fn required_fields(self) -> Vec<&'static str> {
        self.fields()
            .into_iter()
            .filter(|field| field.required)
            .map(|field| field.name)
            .collect()
    }
}

/// Validate an options value and produce typed [`ConnectionOptions`]
///
/// Performs no I/O. `environment` is checked first, then `tunnel`, then the
/// fields of the selected mode in schema order.
pub fn validate(options: &Value) -> Result<ConnectionOptions, ValidationError> {
    let object = options.as_object().ok_or(ValidationError::NotAnObject)?;

    let environment = environment(object)?;
    let tunnel = tunnel(object)?;
    let mode = Mode::new(environment, tunnel);

    let mut values = Values::default();
    for field in mode.fields() {
        match present(object, field.name) {
            Some(value) => {
                let checked = check(&field, value)?;
                values.0.insert(field.name, checked);
            }
            None if field.required => return Err(ValidationError::missing(field.name)),
            None => {}
        }
    }

    values.into_options(mode)
}

fn present<'a>(object: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    object.get(name).filter(|value| !value.is_null())
}

fn environment(object: &Map<String, Value>) -> Result<Environment, ValidationError> {
    match present(object, "environment") {
        None => Err(ValidationError::missing("environment")),
        Some(Value::String(value)) => match value.as_str() {
            "local" => Ok(Environment::Local),
            "remote" => Ok(Environment::Remote),
            other => Err(ValidationError::InvalidValue {
                field: "environment".to_string(),
                reason: format!("expected `local` or `remote`, got `{}`", other),
            }),
        },
        Some(_) => Err(ValidationError::invalid_type("environment", "string")),
    }
}

fn tunnel(object: &Map<String, Value>) -> Result<bool, ValidationError> {
    match present(object, "tunnel") {
        None => Err(ValidationError::missing("tunnel")),
        Some(Value::Bool(tunnel)) => Ok(*tunnel),
        Some(_) => Err(ValidationError::invalid_type("tunnel", "boolean")),
    }
}

enum FieldValue {
    Str(String),
    Port(u16),
    Credentials(Credentials),
}

fn check(field: &Field, value: &Value) -> Result<FieldValue, ValidationError> {
    let invalid = || ValidationError::invalid_type(field.name, field.kind.expected());

    match field.kind {
        FieldKind::String => value
            .as_str()
            .map(|s| FieldValue::Str(s.to_string()))
            .ok_or_else(invalid),
        FieldKind::Port | FieldKind::NonZeroPort => {
            let port = value
                .as_u64()
                .and_then(|n| u16::try_from(n).ok())
                .ok_or_else(invalid)?;
            if field.kind == FieldKind::NonZeroPort && port == 0 {
                return Err(invalid());
            }
            Ok(FieldValue::Port(port))
        }
        FieldKind::Credentials => {
            let object = value.as_object().ok_or_else(invalid)?;
            let username = nested_string(object, field.name, "username")?;
            let password = nested_string(object, field.name, "password")?;
            Ok(FieldValue::Credentials(Credentials { username, password }))
        }
    }
}

fn nested_string(
    object: &Map<String, Value>,
    parent: &str,
    key: &str,
) -> Result<String, ValidationError> {
    let name = format!("{}.{}", parent, key);
    match present(object, key) {
        None => Err(ValidationError::MissingField { field: name }),
        Some(Value::String(value)) => Ok(value.clone()),
        Some(_) => Err(ValidationError::InvalidType {
            field: name,
            expected: "string",
        }),
    }
}

/// Checked field values, keyed by schema name
#[derive(Default)]
struct Values(HashMap<&'static str, FieldValue>);

impl Values {
    fn string(&mut self, name: &str) -> Option<String> {
        match self.0.remove(name) {
            Some(FieldValue::Str(value)) => Some(value),
            _ => None,
        }
    }

    fn port(&mut self, name: &str) -> Option<u16> {
        match self.0.remove(name) {
            Some(FieldValue::Port(port)) => Some(port),
            _ => None,
        }
    }

    fn credentials(&mut self, name: &str) -> Option<Credentials> {
        match self.0.remove(name) {
            Some(FieldValue::Credentials(credentials)) => Some(credentials),
            _ => None,
        }
    }

    fn required_string(&mut self, name: &str) -> Result<String, ValidationError> {
        self.string(name)
            .ok_or_else(|| ValidationError::missing(name))
    }

    fn required_port(&mut self, name: &str) -> Result<u16, ValidationError> {
        self.port(name).ok_or_else(|| ValidationError::missing(name))
    }

    fn into_options(mut self, mode: Mode) -> Result<ConnectionOptions, ValidationError> {
        let (host_field, port_field) = match mode.environment() {
            Environment::Local => ("backend_host", "backend_port"),
            Environment::Remote => ("cluster_host", "cluster_port"),
        };
        let endpoint = Endpoint::new(
            self.required_string(host_field)?,
            self.required_port(port_field)?,
        );

        let auth = AuthMaterial {
            credentials: self.credentials("credentials"),
            tls_ca: self.string("tls_ca"),
            database: self.string("database"),
        };

        let bastion = if mode.is_tunneled() {
            Some(BastionOptions {
                user: self.required_string("bastion_user")?,
                host: self.required_string("bastion_host")?,
                port: self.required_port("bastion_port")?,
                private_key: self.required_string("bastion_private_key")?,
                key_passphrase: self.string("bastion_key_passphrase"),
                host_key_fingerprint: self.string("bastion_host_key"),
                local_forward_port: self.required_port("local_forward_port")?,
                forward_host: self.string("forward_host"),
            })
        } else {
            None
        };

        Ok(ConnectionOptions {
            environment: mode.environment(),
            endpoint,
            auth,
            bastion,
        })
    }
}
