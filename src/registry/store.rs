//! Stream registry implementation
//!
//! Maps stream ids to hubs. A hub is created lazily by the first push or
//! pull that names an unknown id and then lives for the rest of the
//! process.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::stats::HubStats;

use super::config::RegistryConfig;
use super::error::RegistryError;
use super::hub::StreamHub;
use super::metadata::StreamMetadata;
use super::subscriber::{Subscriber, SubscriberId};

/// Central registry of stream hubs
///
/// Thread-safe via `RwLock`; lookups of existing hubs only take the read
/// lock.
pub struct StreamRegistry {
    /// Map of stream id to hub
    streams: RwLock<HashMap<String, Arc<StreamHub>>>,

    /// Configuration applied to every new hub
    config: RegistryConfig,
}

impl StreamRegistry {
    /// Create a new stream registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new stream registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            streams: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Get the hub for `stream_id`, creating it if needed
    ///
    /// Creation happens at most once per id even when a push and a pull race
    /// for the same unseen stream: the existence check is repeated under the
    /// write lock.
    pub async fn get_or_create(&self, stream_id: &str) -> Arc<StreamHub> {
        if let Some(hub) = self.streams.read().await.get(stream_id) {
            return Arc::clone(hub);
        }

        let mut streams = self.streams.write().await;
        let hub = streams.entry(stream_id.to_owned()).or_insert_with(|| {
            tracing::info!(stream = %stream_id, "Stream hub created");
            StreamHub::spawn(stream_id, &self.config)
        });

        Arc::clone(hub)
    }

    /// Get the hub for `stream_id` if it exists
    pub async fn lookup(&self, stream_id: &str) -> Result<Arc<StreamHub>, RegistryError> {
        self.streams
            .read()
            .await
            .get(stream_id)
            .cloned()
            .ok_or_else(|| RegistryError::StreamNotFound(stream_id.to_owned()))
    }

    /// Replace a stream's metadata, creating its hub if needed
    pub async fn update_metadata(&self, stream_id: &str, metadata: StreamMetadata) -> Arc<StreamHub> {
        let hub = self.get_or_create(stream_id).await;
        hub.set_metadata(metadata).await;
        hub
    }

    /// Attach a subscriber to the hub of its stream
    pub async fn attach(&self, subscriber: Arc<Subscriber>) -> Arc<StreamHub> {
        let hub = self.get_or_create(subscriber.stream_id()).await;
        hub.attach(subscriber).await;
        hub
    }

    /// Detach a subscriber; a no-op if it or its stream is unknown
    pub async fn detach(&self, stream_id: &str, id: SubscriberId) -> bool {
        match self.lookup(stream_id).await {
            Ok(hub) => hub.detach(id).await,
            Err(_) => false,
        }
    }

    /// Check if a stream exists
    pub async fn stream_exists(&self, stream_id: &str) -> bool {
        self.streams.read().await.contains_key(stream_id)
    }

    /// Get stream statistics
    pub async fn stream_stats(&self, stream_id: &str) -> Option<HubStats> {
        let hub = self.lookup(stream_id).await.ok()?;
        Some(hub.stats().await)
    }

    /// Get total number of streams
    pub async fn stream_count(&self) -> usize {
        self.streams.read().await.len()
    }

}

impl Default for StreamRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::duplex;
    use tokio::time::timeout;

    use super::*;
    use crate::protocol::{Packet, FLAG_KEYFRAME};

    fn metadata(video_codec_id: i64) -> StreamMetadata {
        StreamMetadata {
            video_codec_id,
            audio_codec_id: 3,
            fps: 30,
            width: 1920,
            height: 1080,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_get_or_create_idempotent() {
        let registry = StreamRegistry::new();

        let first = registry.get_or_create("s1").await;
        let second = registry.get_or_create("s1").await;

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.stream_count().await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_creation_happens_once() {
        let registry = Arc::new(StreamRegistry::new());

        let tasks: Vec<_> = (0..32)
            .map(|_| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move { registry.get_or_create("race").await })
            })
            .collect();

        let mut hubs = Vec::new();
        for task in tasks {
            hubs.push(task.await.unwrap());
        }

        assert!(hubs.iter().all(|hub| Arc::ptr_eq(hub, &hubs[0])));
        assert_eq!(registry.stream_count().await, 1);
    }

    #[tokio::test]
    async fn test_lookup_not_found() {
        let registry = StreamRegistry::new();

        let result = registry.lookup("missing").await;
        assert_eq!(
            result.unwrap_err(),
            RegistryError::StreamNotFound("missing".into())
        );
        assert!(!registry.stream_exists("missing").await);
        assert!(registry.stream_stats("missing").await.is_none());
    }

    #[tokio::test]
    async fn test_update_metadata_creates_hub() {
        let registry = StreamRegistry::new();

        registry.update_metadata("s1", metadata(7)).await;
        assert!(registry.stream_exists("s1").await);

        let hub = registry.lookup("s1").await.unwrap();
        assert_eq!(hub.metadata().await.video_codec_id, 7);

        // Last writer wins
        registry.update_metadata("s1", metadata(9)).await;
        assert_eq!(hub.metadata().await.video_codec_id, 9);
        assert_eq!(registry.stream_count().await, 1);
    }

    #[tokio::test]
    async fn test_attach_creates_hub_and_detach() {
        let registry = StreamRegistry::new();
        let (local, _remote) = duplex(1024);
        let subscriber = Arc::new(Subscriber::new(SubscriberId(1), "s1", Box::new(local)));

        let hub = registry.attach(Arc::clone(&subscriber)).await;
        assert_eq!(hub.stream_id(), "s1");
        assert_eq!(hub.subscriber_count().await, 1);

        assert!(registry.detach("s1", SubscriberId(1)).await);
        assert!(!registry.detach("s1", SubscriberId(1)).await);
        assert!(!registry.detach("other", SubscriberId(1)).await);

        // Hubs are never removed
        assert!(registry.stream_exists("s1").await);
    }

    #[tokio::test]
    async fn test_streams_are_isolated() {
        let config = RegistryConfig::default().queue_capacity(1);
        let registry = StreamRegistry::with_config(config);

        let hub_a = registry.update_metadata("a", metadata(1)).await;
        let hub_b = registry.update_metadata("b", metadata(2)).await;

        let (local, mut remote) = duplex(1024);
        let subscriber = Arc::new(Subscriber::new(SubscriberId(1), "b", Box::new(local)));
        registry.attach(subscriber).await;

        // Flood stream a; whatever it drops must not touch stream b
        for pts in 0..100 {
            hub_a.enqueue(Packet::new(pts, pts, 0, FLAG_KEYFRAME, vec![0u8; 8]));
        }

        let packet = Packet::new(1, 1, 0, FLAG_KEYFRAME, vec![1, 2, 3]);
        hub_b.enqueue(packet.clone());
        let received = timeout(Duration::from_secs(5), Packet::read_from(&mut remote))
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(received, packet);

        let stats_b = registry.stream_stats("b").await.unwrap();
        assert_eq!(stats_b.dropped, 0);
        assert_eq!(stats_b.subscriber_count, 1);
        assert_eq!(hub_b.metadata().await.video_codec_id, 2);
        assert_eq!(hub_a.metadata().await.video_codec_id, 1);
    }
}
