//! Per-stream broadcast hub
//!
//! A hub owns one stream's live state: its metadata, the set of attached
//! subscribers, the late-joiner GOP cache and a bounded packet queue. A
//! single fan-out task drains the queue in FIFO order and writes every
//! packet to every attached subscriber.
//!
//! ```text
//!  ingest ──try_send──► [bounded queue] ──recv──► fan-out loop
//!     │ full: drop                                   │
//!     ▼                                              ├─► gop cache
//!  counters.dropped                                  └─► subscriber 1..n
//! ```
//!
//! `enqueue` never blocks: when the queue is full the packet is dropped and
//! counted, so a slow consumer side can never stall the producer.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::RwLock;

use crate::protocol::Packet;
use crate::stats::{HubCounters, HubStats};

use super::config::{RegistryConfig, MAX_QUEUE_CAPACITY};
use super::gop::GopCache;
use super::metadata::StreamMetadata;
use super::subscriber::{Delivery, Subscriber, SubscriberId};

/// Drop warnings are logged for the first drop and then every this many
const DROP_LOG_INTERVAL: u64 = 1000;

/// Result of offering a packet to a hub's queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueResult {
    /// Packet is queued for fan-out
    Accepted,
    /// Queue was full; packet discarded
    Dropped,
}

/// State guarded by the hub lock
struct HubState {
    metadata: StreamMetadata,
    subscribers: HashMap<SubscriberId, Arc<Subscriber>>,
    gop: GopCache,
}

/// Broadcast hub for a single stream
pub struct StreamHub {
    stream_id: String,
    tx: mpsc::Sender<Packet>,
    state: RwLock<HubState>,
    counters: HubCounters,
    created_at: Instant,
}

impl StreamHub {
    /// Create a hub without starting its fan-out loop
    ///
    /// The returned receiver is the consumer end of the queue; exactly one
    /// task may drain it.
    pub(crate) fn new(stream_id: impl Into<String>, config: &RegistryConfig) -> (Self, mpsc::Receiver<Packet>) {
        let (tx, rx) = mpsc::channel(config.queue_capacity.clamp(1, MAX_QUEUE_CAPACITY));

        let hub = Self {
            stream_id: stream_id.into(),
            tx,
            state: RwLock::new(HubState {
                metadata: StreamMetadata::default(),
                subscribers: HashMap::new(),
                gop: GopCache::with_max_size(config.gop_cache_max_size),
            }),
            counters: HubCounters::new(),
            created_at: Instant::now(),
        };

        (hub, rx)
    }

    /// Create a hub and start its fan-out loop
    ///
    /// The loop holds a reference to the hub and the hub holds the queue
    /// sender, so the loop runs for as long as the process does.
    pub fn spawn(stream_id: impl Into<String>, config: &RegistryConfig) -> Arc<Self> {
        let (hub, rx) = Self::new(stream_id, config);
        let hub = Arc::new(hub);

        tokio::spawn(Arc::clone(&hub).run(rx));

        hub
    }

    /// Stream identifier
    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    /// Offer a packet for fan-out without blocking
    pub fn enqueue(&self, packet: Packet) -> EnqueueResult {
        match self.tx.try_send(packet) {
            Ok(()) => {
                self.counters.record_enqueued();
                EnqueueResult::Accepted
            }
            Err(TrySendError::Full(packet)) => {
                let dropped = self.counters.record_dropped();
                if dropped == 1 || dropped % DROP_LOG_INTERVAL == 0 {
                    tracing::warn!(
                        stream = %self.stream_id,
                        dropped = dropped,
                        pts = packet.pts,
                        track = packet.track_index,
                        "Queue full, dropping packet"
                    );
                }
                EnqueueResult::Dropped
            }
            Err(TrySendError::Closed(_)) => {
                // Only reachable if the fan-out task panicked
                self.counters.record_dropped();
                tracing::error!(stream = %self.stream_id, "Fan-out loop gone, dropping packet");
                EnqueueResult::Dropped
            }
        }
    }

    /// Attach a subscriber
    ///
    /// The subscriber starts unsynced. If a GOP is cached it is written to
    /// the subscriber before any live packet; packets fanned out before
    /// this call are never duplicated and packets fanned out after it are
    /// never missed.
    pub async fn attach(&self, subscriber: Arc<Subscriber>) {
        // Hold the transport while registering so the fan-out loop cannot
        // write a live packet ahead of the catchup packets.
        let mut transport = subscriber.lock_transport().await;

        let (catchup, subscribers) = {
            let mut state = self.state.write().await;
            state
                .subscribers
                .insert(subscriber.id(), Arc::clone(&subscriber));
            (state.gop.snapshot(), state.subscribers.len())
        };

        tracing::info!(
            stream = %self.stream_id,
            subscriber = %subscriber.id(),
            subscribers = subscribers,
            catchup_packets = catchup.len(),
            "Subscriber attached"
        );

        for packet in &catchup {
            match subscriber.deliver_locked(&mut transport, packet).await {
                Ok(delivery) => self.record(delivery),
                Err(e) => {
                    self.counters.record_write_error();
                    tracing::debug!(
                        stream = %self.stream_id,
                        subscriber = %subscriber.id(),
                        error = %e,
                        "Failed to send catchup packet"
                    );
                    break;
                }
            }
        }
    }

    /// Detach a subscriber
    ///
    /// Returns true if it was attached. Detaching an absent subscriber is a
    /// no-op.
    pub async fn detach(&self, id: SubscriberId) -> bool {
        let mut state = self.state.write().await;
        let removed = state.subscribers.remove(&id).is_some();

        if removed {
            tracing::info!(
                stream = %self.stream_id,
                subscriber = %id,
                subscribers = state.subscribers.len(),
                "Subscriber detached"
            );
        }

        removed
    }

    /// Current metadata
    pub async fn metadata(&self) -> StreamMetadata {
        self.state.read().await.metadata.clone()
    }

    /// Replace the metadata wholesale
    ///
    /// Also empties the GOP cache under the same lock: late joiners wait for
    /// the new producer's first keyframe.
    pub async fn set_metadata(&self, metadata: StreamMetadata) {
        let mut state = self.state.write().await;
        state.metadata = metadata;
        state.gop.clear();
    }

    /// Number of attached subscribers
    pub async fn subscriber_count(&self) -> usize {
        self.state.read().await.subscribers.len()
    }

    /// Whether a subscriber is attached
    pub async fn is_attached(&self, id: SubscriberId) -> bool {
        self.state.read().await.subscribers.contains_key(&id)
    }

    /// Packets waiting in the queue
    pub fn queue_len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    /// Statistics snapshot
    pub async fn stats(&self) -> HubStats {
        let state = self.state.read().await;

        HubStats {
            subscriber_count: state.subscribers.len(),
            queue_len: self.queue_len(),
            gop_packets: state.gop.len(),
            gop_size_bytes: state.gop.size(),
            age: self.created_at.elapsed(),
            ..HubStats::from_counters(&self.counters)
        }
    }

    /// Fan-out loop: drains the queue until the sender side is gone
    pub(crate) async fn run(self: Arc<Self>, mut rx: mpsc::Receiver<Packet>) {
        tracing::debug!(stream = %self.stream_id, "Fan-out loop started");

        while let Some(packet) = rx.recv().await {
            self.dispatch(&packet).await;
        }

        tracing::debug!(stream = %self.stream_id, "Fan-out loop stopped");
    }

    /// Deliver one packet to every attached subscriber
    ///
    /// The GOP cache update and the subscriber snapshot happen under one
    /// lock acquisition, which is what lets `attach` hand out a gap-free
    /// catchup. Writes happen outside the lock, so attach/detach elsewhere
    /// is never blocked behind a slow subscriber.
    pub(crate) async fn dispatch(&self, packet: &Packet) {
        let subscribers: Vec<Arc<Subscriber>> = {
            let mut state = self.state.write().await;
            state.gop.push(packet);
            state.subscribers.values().cloned().collect()
        };

        tracing::trace!(
            stream = %self.stream_id,
            pts = packet.pts,
            dts = packet.dts,
            track = packet.track_index,
            flags = packet.flags,
            size = packet.payload.len(),
            subscribers = subscribers.len(),
            "Dispatching packet"
        );

        for subscriber in subscribers {
            match subscriber.deliver(packet).await {
                Ok(delivery) => self.record(delivery),
                Err(e) => {
                    // Detaching is left to the pull adapter, which sees the
                    // same failure on its read side.
                    self.counters.record_write_error();
                    tracing::debug!(
                        stream = %self.stream_id,
                        subscriber = %subscriber.id(),
                        error = %e,
                        "Failed to send packet to subscriber"
                    );
                }
            }
        }
    }

    fn record(&self, delivery: Delivery) {
        match delivery {
            Delivery::Sent => self.counters.record_delivered(),
            Delivery::Skipped => self.counters.record_skipped(),
        }
    }
}

impl std::fmt::Debug for StreamHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHub")
            .field("stream_id", &self.stream_id)
            .field("queue_len", &self.queue_len())
            .finish_non_exhaustive()
    }
}
