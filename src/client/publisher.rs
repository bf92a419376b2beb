//! Relay stream publisher
//!
//! High-level API for pushing a stream to a relay.

use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::error::Result;
use crate::protocol::handshake::write_document;
use crate::protocol::{HandshakeRequest, Packet, PushRequest};

/// Relay stream publisher
///
/// # Example
/// ```no_run
/// use avrelay::client::RelayPublisher;
/// use avrelay::protocol::{Packet, PushRequest, FLAG_KEYFRAME};
/// use avrelay::StreamMetadata;
///
/// # async fn example() -> avrelay::Result<()> {
/// let metadata = StreamMetadata { video_codec_id: 27, fps: 30, width: 1280, height: 720, ..Default::default() };
/// let mut publisher =
///     RelayPublisher::connect("127.0.0.1:1935", PushRequest::new("camera_stream", &metadata)).await?;
///
/// publisher.send(&Packet::new(0, 0, 0, FLAG_KEYFRAME, vec![0u8; 1024])).await?;
/// publisher.flush().await?;
/// # Ok(())
/// # }
/// ```
pub struct RelayPublisher {
    stream_id: String,
    writer: BufWriter<TcpStream>,
}

impl RelayPublisher {
    /// Connect to the relay and send the push handshake
    pub async fn connect(addr: impl ToSocketAddrs, request: PushRequest) -> Result<Self> {
        let socket = TcpStream::connect(addr).await?;
        socket.set_nodelay(true)?;

        let stream_id = request.stream_id.clone();
        let mut writer = BufWriter::new(socket);
        write_document(&mut writer, &HandshakeRequest::Push(request)).await?;

        tracing::debug!(stream = %stream_id, "Push handshake sent");

        Ok(Self { stream_id, writer })
    }

    /// Stream this publisher feeds
    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    /// Queue one packet for sending
    ///
    /// Packets are buffered; call [`flush`](Self::flush) to push them out.
    pub async fn send(&mut self, packet: &Packet) -> Result<()> {
        packet.check_size()?;
        packet.write_to(&mut self.writer).await?;
        Ok(())
    }

    /// Flush buffered packets to the socket
    pub async fn flush(&mut self) -> Result<()> {
        self.writer.flush().await?;
        Ok(())
    }

    /// Flush and close the connection
    pub async fn close(mut self) -> Result<()> {
        self.writer.flush().await?;
        self.writer.shutdown().await?;
        Ok(())
    }

    /// Write raw bytes, bypassing packet framing
    pub async fn send_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer.write_all(bytes).await?;
        Ok(())
    }
}
