//! HTTP driver for search clusters
//!
//! Probes the cluster root once; the returned client reuses the same HTTP
//! connection pool and attaches credentials to every request.

use async_trait::async_trait;
use dbtunnel_proto::{AuthMaterial, Credentials, Endpoint};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::{BackendDriver, DriverError};

/// Fields of the cluster root document, when the backend returns one
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ClusterInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub cluster_name: Option<String>,
    #[serde(default)]
    pub version: Option<ClusterVersion>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ClusterVersion {
    #[serde(default)]
    pub number: Option<String>,
}

/// Connected search cluster client
#[derive(Debug, Clone)]
pub struct SearchClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Option<Credentials>,
    info: ClusterInfo,
}

impl SearchClient {
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn info(&self) -> &ClusterInfo {
        &self.info
    }

    /// Start a request to `path` on the cluster, authenticated if configured
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let request = self.http.request(method, url);
        match &self.credentials {
            Some(credentials) => {
                request.basic_auth(&credentials.username, Some(&credentials.password))
            }
            None => request,
        }
    }
}

/// Driver for HTTP search clusters (https when a CA is supplied)
pub struct SearchDriver {
    name: String,
}

impl SearchDriver {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for SearchDriver {
    fn default() -> Self {
        Self::new("search cluster")
    }
}

#[async_trait]
impl BackendDriver for SearchDriver {
    type Client = SearchClient;

    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(
        &self,
        endpoint: &Endpoint,
        auth: &AuthMaterial,
    ) -> Result<SearchClient, DriverError> {
        let scheme = if auth.tls_ca.is_some() { "https" } else { "http" };
        let base_url = format!("{}://{}", scheme, endpoint);

        let mut builder = reqwest::Client::builder().use_rustls_tls();
        if let Some(ca_pem) = &auth.tls_ca {
            // Reject unusable bundles up front; reqwest only parses them at build time
            crate::tls::client_config(ca_pem)?;
            let cert = reqwest::Certificate::from_pem(ca_pem.as_bytes())
                .map_err(|e| DriverError::Tls(format!("Invalid CA certificate: {}", e)))?;
            builder = builder
                .tls_built_in_root_certs(false)
                .add_root_certificate(cert);
        }
        let http = builder.build().map_err(|e| {
            if auth.tls_ca.is_some() {
                DriverError::Tls(e.to_string())
            } else {
                DriverError::Other(Box::new(e))
            }
        })?;

        let mut client = SearchClient {
            http,
            base_url,
            credentials: auth.credentials.clone(),
            info: ClusterInfo::default(),
        };

        debug!(url = %client.base_url, "Probing {}", self.name);
        let response = client
            .request(Method::GET, "/")
            .send()
            .await
            .map_err(|e| DriverError::Unreachable(Box::new(e)))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(DriverError::Authentication(format!(
                "{} responded {}",
                client.base_url, status
            )));
        }
        if !status.is_success() {
            return Err(DriverError::Protocol(format!(
                "{} responded {}",
                client.base_url, status
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| DriverError::Protocol(e.to_string()))?;
        client.info = serde_json::from_str(&body).unwrap_or_default();

        Ok(client)
    }
}
