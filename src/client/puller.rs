//! Relay stream puller
//!
//! Subscribes to a stream and yields its packets.

use std::io;

use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::error::{Error, Result};
use crate::protocol::constants::DEFAULT_MAX_HANDSHAKE_SIZE;
use crate::protocol::handshake::{read_document, write_document};
use crate::protocol::{HandshakeRequest, Packet, PullRequest, PullResponse};
use crate::registry::StreamMetadata;

/// Relay stream puller
pub struct RelayPuller {
    stream_id: String,
    metadata: StreamMetadata,
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl RelayPuller {
    /// Connect, send the pull handshake and wait for the stream metadata
    ///
    /// Fails with [`Error::Rejected`] if the relay closes the connection
    /// instead of answering, which is what it does for unknown streams.
    pub async fn connect(addr: impl ToSocketAddrs, stream_id: impl Into<String>) -> Result<Self> {
        let stream_id = stream_id.into();
        let socket = TcpStream::connect(addr).await?;
        socket.set_nodelay(true)?;

        let (reader, mut writer) = socket.into_split();
        let mut reader = BufReader::new(reader);

        let request = HandshakeRequest::Pull(PullRequest::new(stream_id.clone()));
        write_document(&mut writer, &request).await?;

        let document = match read_document(&mut reader, DEFAULT_MAX_HANDSHAKE_SIZE).await {
            Ok(document) => document,
            Err(Error::Io(e)) if is_closed(&e) => return Err(Error::Rejected(stream_id)),
            Err(e) => return Err(e),
        };

        let response: PullResponse = serde_json::from_slice(&document)
            .map_err(crate::error::HandshakeError::InvalidDocument)?;
        let metadata = response.metadata()?;

        tracing::debug!(stream = %stream_id, "Pull handshake complete");

        Ok(Self {
            stream_id,
            metadata,
            reader,
            writer,
        })
    }

    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    /// Metadata from the relay's handshake response
    pub fn metadata(&self) -> &StreamMetadata {
        &self.metadata
    }

    /// Receive the next packet, `None` once the relay closes the stream
    pub async fn recv(&mut self) -> Result<Option<Packet>> {
        Packet::read_from(&mut self.reader).await
    }

    /// Send one byte the relay ignores, to keep middleboxes from idling out
    pub async fn send_keepalive(&mut self) -> Result<()> {
        self.writer.write_all(&[0u8]).await?;
        Ok(())
    }
}

fn is_closed(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::UnexpectedEof | io::ErrorKind::ConnectionReset | io::ErrorKind::BrokenPipe
    )
}
