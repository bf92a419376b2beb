//! Statistics for stream hubs and push sessions

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Live counters of a stream hub
///
/// Updated lock-free from the ingest side and the fan-out loop.
#[derive(Debug, Default)]
pub struct HubCounters {
    enqueued: AtomicU64,
    dropped: AtomicU64,
    delivered: AtomicU64,
    skipped: AtomicU64,
    write_errors: AtomicU64,
}

impl HubCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an accepted packet
    pub fn record_enqueued(&self) -> u64 {
        self.enqueued.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Record a packet dropped because the queue was full, returning the running total
    pub fn record_dropped(&self) -> u64 {
        self.dropped.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Record a packet written to one subscriber
    pub fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a packet withheld from a subscriber that has not synced yet
    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed write to a subscriber
    pub fn record_write_error(&self) {
        self.write_errors.fetch_add(1, Ordering::Relaxed);
    }

    fn load(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}

/// Point-in-time statistics of a stream hub
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HubStats {
    /// Packets accepted into the queue
    pub enqueued: u64,
    /// Packets dropped because the queue was full
    pub dropped: u64,
    /// Successful per-subscriber deliveries
    pub delivered: u64,
    /// Per-subscriber deliveries withheld until a keyframe
    pub skipped: u64,
    /// Failed per-subscriber writes
    pub write_errors: u64,
    /// Currently attached subscribers
    pub subscriber_count: usize,
    /// Packets waiting in the queue
    pub queue_len: usize,
    /// Packets held in the late-joiner GOP cache
    pub gop_packets: usize,
    /// Payload bytes held in the late-joiner GOP cache
    pub gop_size_bytes: usize,
    /// Time since the hub was created
    pub age: Duration,
}

impl HubStats {
    /// Snapshot the counters; the caller fills in the structural fields
    pub fn from_counters(counters: &HubCounters) -> Self {
        Self {
            enqueued: HubCounters::load(&counters.enqueued),
            dropped: HubCounters::load(&counters.dropped),
            delivered: HubCounters::load(&counters.delivered),
            skipped: HubCounters::load(&counters.skipped),
            write_errors: HubCounters::load(&counters.write_errors),
            ..Default::default()
        }
    }
}

/// Statistics of one push connection
#[derive(Debug, Clone, Default)]
pub struct IngestStats {
    /// Packets read from the producer
    pub packets: u64,
    /// Payload bytes read from the producer
    pub bytes: u64,
    /// Primary-track keyframes read
    pub keyframes: u64,
    /// Packets the hub refused because its queue was full
    pub dropped: u64,
}

impl IngestStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for one packet read from the producer
    pub fn on_packet(&mut self, size: usize, sync_point: bool) {
        self.packets += 1;
        self.bytes += size as u64;
        if sync_point {
            self.keyframes += 1;
        }
    }

    /// Average payload bitrate over `elapsed`
    pub fn bitrate(&self, elapsed: Duration) -> u64 {
        let secs = elapsed.as_secs();
        if secs > 0 {
            (self.bytes * 8) / secs
        } else {
            0
        }
    }
}
