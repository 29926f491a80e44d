//! rustls configuration from caller-supplied CA material

use rustls::{ClientConfig, RootCertStore};
use std::io::BufReader;
use std::sync::Arc;

use crate::DriverError;

/// Build a client config trusting only the certificates in `ca_pem`
pub fn client_config(ca_pem: &str) -> Result<ClientConfig, DriverError> {
    let mut roots = RootCertStore::empty();
    let mut reader = BufReader::new(ca_pem.as_bytes());

    for cert in rustls_pemfile::certs(&mut reader) {
        let cert =
            cert.map_err(|e| DriverError::Tls(format!("Failed to parse CA bundle: {}", e)))?;
        roots
            .add(cert)
            .map_err(|e| DriverError::Tls(format!("Invalid CA certificate: {}", e)))?;
    }

    if roots.is_empty() {
        return Err(DriverError::Tls(
            "CA bundle contains no certificates".to_string(),
        ));
    }

    let config =
        ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()
            .map_err(|e| DriverError::Tls(e.to_string()))?
            .with_root_certificates(roots)
            .with_no_client_auth();

    Ok(config)
}
