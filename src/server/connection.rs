//! Per-connection handling
//!
//! Reads the handshake document and hands the socket to the push or pull
//! adapter. Any error closes this connection only.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpStream;

use crate::error::Result;
use crate::protocol::handshake::read_document;
use crate::protocol::HandshakeRequest;
use crate::registry::StreamRegistry;

use super::config::ServerConfig;
use super::delivery::handle_pull;
use super::ingest::handle_push;

/// A single accepted connection
pub struct Connection {
    session_id: u64,
    socket: TcpStream,
    peer_addr: SocketAddr,
    config: Arc<ServerConfig>,
    registry: Arc<StreamRegistry>,
}

impl Connection {
    pub fn new(
        session_id: u64,
        socket: TcpStream,
        peer_addr: SocketAddr,
        config: Arc<ServerConfig>,
        registry: Arc<StreamRegistry>,
    ) -> Self {
        Self {
            session_id,
            socket,
            peer_addr,
            config,
            registry,
        }
    }

    /// Run the connection until it closes
    pub async fn run(mut self) -> Result<()> {
        let document = read_document(&mut self.socket, self.config.max_handshake_size).await?;
        let request = HandshakeRequest::parse(&document)?;

        tracing::debug!(
            session_id = self.session_id,
            peer = %self.peer_addr,
            stream = %request.stream_id(),
            "Handshake received"
        );

        match request {
            HandshakeRequest::Push(request) => {
                handle_push(
                    self.session_id,
                    self.socket,
                    request,
                    &self.config,
                    &self.registry,
                )
                .await
            }
            HandshakeRequest::Pull(request) => {
                handle_pull(self.session_id, self.socket, request, &self.registry).await
            }
        }
    }
}
