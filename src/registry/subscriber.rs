//! Pull subscriber handle
//!
//! A subscriber is attached to exactly one stream, named by id rather than
//! by a reference to its hub; detaching goes back through the registry.

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, MutexGuard};

use crate::protocol::Packet;

/// Outbound half of a subscriber connection
pub type Transport = Box<dyn AsyncWrite + Send + Unpin>;

/// Identifier of a subscriber, unique per server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(pub u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of offering a packet to a subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Packet was written to the transport
    Sent,
    /// Primary-track packet withheld until the first keyframe
    Skipped,
}

/// Per-connection state of a pull client
pub struct Subscriber {
    id: SubscriberId,
    stream_id: String,
    sync_acquired: AtomicBool,
    transport: Mutex<Transport>,
}

impl Subscriber {
    /// Create a subscriber writing to `transport`
    pub fn new(id: SubscriberId, stream_id: impl Into<String>, transport: Transport) -> Self {
        Self {
            id,
            stream_id: stream_id.into(),
            sync_acquired: AtomicBool::new(false),
            transport: Mutex::new(transport),
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Stream this subscriber is attached to
    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    /// Whether a primary-track keyframe has been delivered yet
    pub fn sync_acquired(&self) -> bool {
        self.sync_acquired.load(Ordering::Acquire)
    }

    /// Offer a packet, applying the sync gate
    pub async fn deliver(&self, packet: &Packet) -> io::Result<Delivery> {
        let mut transport = self.transport.lock().await;
        self.deliver_locked(&mut transport, packet).await
    }

    /// Lock the transport so a sequence of packets goes out uninterrupted
    pub(crate) async fn lock_transport(&self) -> MutexGuard<'_, Transport> {
        self.transport.lock().await
    }

    /// Offer a packet through an already held transport guard
    ///
    /// Until the first primary-track keyframe, primary-track packets are
    /// skipped; packets of every other track pass straight through. The
    /// keyframe that flips the gate is itself delivered.
    pub(crate) async fn deliver_locked(
        &self,
        transport: &mut Transport,
        packet: &Packet,
    ) -> io::Result<Delivery> {
        if packet.is_primary() && !self.sync_acquired() {
            if !packet.is_keyframe() {
                return Ok(Delivery::Skipped);
            }
            self.sync_acquired.store(true, Ordering::Release);
        }

        packet.write_to(transport).await?;
        Ok(Delivery::Sent)
    }

    /// Shut down the outbound transport
    pub async fn close(&self) {
        let mut transport = self.transport.lock().await;
        if let Err(e) = transport.shutdown().await {
            tracing::trace!(subscriber = %self.id, error = %e, "Transport shutdown failed");
        }
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.id)
            .field("stream_id", &self.stream_id)
            .field("sync_acquired", &self.sync_acquired())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;
    use tokio_test::io::Builder;

    use super::*;
    use crate::protocol::FLAG_KEYFRAME;

    fn wire(packet: &Packet) -> BytesMut {
        let mut buf = BytesMut::new();
        packet.encode(&mut buf);
        buf
    }

    #[tokio::test]
    async fn test_gate_skips_until_keyframe() {
        let delta = Packet::new(0, 0, 0, 0, vec![1]);
        let key = Packet::new(1, 1, 0, FLAG_KEYFRAME, vec![2]);
        let after = Packet::new(2, 2, 0, 0, vec![3]);

        let key_wire = wire(&key);
        let after_wire = wire(&after);
        let mock = Builder::new()
            .write(&key_wire[..28])
            .write(&key_wire[28..])
            .write(&after_wire[..28])
            .write(&after_wire[28..])
            .build();

        let subscriber = Subscriber::new(SubscriberId(1), "s1", Box::new(mock));
        assert!(!subscriber.sync_acquired());

        assert_eq!(subscriber.deliver(&delta).await.unwrap(), Delivery::Skipped);
        assert!(!subscriber.sync_acquired());

        assert_eq!(subscriber.deliver(&key).await.unwrap(), Delivery::Sent);
        assert!(subscriber.sync_acquired());

        // Once synced, deltas flow
        assert_eq!(subscriber.deliver(&after).await.unwrap(), Delivery::Sent);
    }

    #[tokio::test]
    async fn test_secondary_track_passes_unsynced() {
        let audio = Packet::new(0, 0, 1, 0, vec![0xAF]);
        let audio_wire = wire(&audio);
        let mock = Builder::new()
            .write(&audio_wire[..28])
            .write(&audio_wire[28..])
            .build();

        let subscriber = Subscriber::new(SubscriberId(2), "s1", Box::new(mock));

        assert_eq!(subscriber.deliver(&audio).await.unwrap(), Delivery::Sent);
        assert!(!subscriber.sync_acquired());
    }

    #[tokio::test]
    async fn test_write_error_surfaces() {
        let key = Packet::new(0, 0, 0, FLAG_KEYFRAME, vec![1]);
        let mock = Builder::new()
            .write_error(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
            .build();

        let subscriber = Subscriber::new(SubscriberId(3), "s1", Box::new(mock));

        let err = subscriber.deliver(&key).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}
