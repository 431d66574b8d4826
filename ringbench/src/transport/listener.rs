use crate::error::{Result, RingError};
use crate::transport::tls::{generate_self_signed_cert, make_client_config, make_server_config};
use std::net::SocketAddr;

/// A QUIC endpoint that accepts connections and can also dial out.
///
/// Workers use one endpoint for everything: the connection to the seed,
/// outgoing mesh connections, and incoming mesh connections.
pub struct TransportListener {
    endpoint: quinn::Endpoint,
    local_addr: SocketAddr,
}

impl TransportListener {
    /// Bind on `addr` with a fresh self-signed certificate.
    pub fn bind(addr: SocketAddr) -> Result<Self> {
        let (cert, key) = generate_self_signed_cert()?;
        Self::bind_with_config(addr, make_server_config(cert, key)?)
    }

    /// Bind with an existing server config.
    pub fn bind_with_config(addr: SocketAddr, config: quinn::ServerConfig) -> Result<Self> {
        let mut endpoint = quinn::Endpoint::server(config, addr)
            .map_err(|e| RingError::transport_with_source(format!("bind {addr}"), e))?;
        endpoint.set_default_client_config(make_client_config()?);

        let local_addr = endpoint
            .local_addr()
            .map_err(|e| RingError::transport_with_source("local_addr", e))?;

        Ok(Self {
            endpoint,
            local_addr,
        })
    }

    /// Accept the next incoming QUIC connection.
    pub async fn accept(&self) -> Result<quinn::Connection> {
        let incoming = self
            .endpoint
            .accept()
            .await
            .ok_or_else(|| RingError::transport("endpoint closed"))?;

        incoming
            .await
            .map_err(|e| RingError::transport_with_source("accept", e))
    }

    /// Dial `addr` from this endpoint. `rank` only labels the error.
    pub async fn connect(&self, addr: SocketAddr, rank: u32) -> Result<quinn::Connection> {
        self.endpoint
            .connect(addr, "localhost")
            .map_err(|e| RingError::transport_with_source(format!("connect to {addr}"), e))?
            .await
            .map_err(|e| RingError::ConnectionFailed {
                rank,
                reason: format!("QUIC handshake with {addr}: {e}"),
            })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn endpoint(&self) -> &quinn::Endpoint {
        &self.endpoint
    }
}
