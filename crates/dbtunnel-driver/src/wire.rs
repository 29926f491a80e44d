//! Raw TCP/TLS driver for document stores
//!
//! Establishes the transport only. The database wire protocol, including its
//! own authentication handshake, is spoken by the application over
//! [`WireClient::stream`] using the credentials carried in the handle.

use async_trait::async_trait;
use dbtunnel_proto::{AuthMaterial, Endpoint};
use rustls::pki_types::ServerName;
use std::fmt;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, MutexGuard};
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use tracing::debug;

use crate::{tls, BackendDriver, DriverError};

/// Plain or TLS-wrapped connection to the backend
pub enum WireStream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl WireStream {
    pub fn is_tls(&self) -> bool {
        matches!(self, WireStream::Tls(_))
    }
}

impl fmt::Debug for WireStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireStream::Plain(_) => f.write_str("WireStream::Plain"),
            WireStream::Tls(_) => f.write_str("WireStream::Tls"),
        }
    }
}

impl AsyncRead for WireStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            WireStream::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            WireStream::Tls(stream) => Pin::new(stream.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for WireStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            WireStream::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            WireStream::Tls(stream) => Pin::new(stream.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            WireStream::Plain(stream) => Pin::new(stream).poll_flush(cx),
            WireStream::Tls(stream) => Pin::new(stream.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            WireStream::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            WireStream::Tls(stream) => Pin::new(stream.as_mut()).poll_shutdown(cx),
        }
    }
}

/// Connected document store transport
pub struct WireClient {
    endpoint: Endpoint,
    auth: AuthMaterial,
    tls: bool,
    stream: Mutex<WireStream>,
}

// Stream and auth material stay out of logs
impl fmt::Debug for WireClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WireClient")
            .field("endpoint", &self.endpoint)
            .field("tls", &self.tls)
            .finish_non_exhaustive()
    }
}

impl WireClient {
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn auth(&self) -> &AuthMaterial {
        &self.auth
    }

    pub fn is_tls(&self) -> bool {
        self.tls
    }

    /// Exclusive access to the underlying stream
    pub async fn stream(&self) -> MutexGuard<'_, WireStream> {
        self.stream.lock().await
    }
}

/// Driver that opens a TCP connection, wrapped in TLS when a CA is supplied
pub struct WireDriver {
    name: String,
}

impl WireDriver {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for WireDriver {
    fn default() -> Self {
        Self::new("document store")
    }
}

#[async_trait]
impl BackendDriver for WireDriver {
    type Client = WireClient;

    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(
        &self,
        endpoint: &Endpoint,
        auth: &AuthMaterial,
    ) -> Result<WireClient, DriverError> {
        let tcp = TcpStream::connect((endpoint.host.as_str(), endpoint.port))
            .await
            .map_err(|e| DriverError::Unreachable(Box::new(e)))?;

        let stream = match &auth.tls_ca {
            None => WireStream::Plain(tcp),
            Some(ca_pem) => {
                let config = tls::client_config(ca_pem)?;
                let connector = TlsConnector::from(Arc::new(config));
                let server_name = ServerName::try_from(endpoint.host.clone()).map_err(|e| {
                    DriverError::Tls(format!("Invalid server name {}: {}", endpoint.host, e))
                })?;
                let tls_stream = connector
                    .connect(server_name, tcp)
                    .await
                    .map_err(|e| DriverError::Tls(e.to_string()))?;
                WireStream::Tls(Box::new(tls_stream))
            }
        };

        debug!(
            endpoint = %endpoint,
            tls = stream.is_tls(),
            "Connected to {}",
            self.name
        );

        Ok(WireClient {
            endpoint: endpoint.clone(),
            auth: auth.clone(),
            tls: stream.is_tls(),
            stream: Mutex::new(stream),
        })
    }
}
