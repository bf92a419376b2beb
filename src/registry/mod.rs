//! Stream registry and per-stream broadcast hubs
//!
//! The registry maps stream ids to hubs. Each hub owns its stream's queue,
//! subscriber set and metadata behind its own lock, and runs one fan-out
//! task for its whole lifetime.
//!
//! # Architecture
//!
//! ```text
//!                          Arc<StreamRegistry>
//!                     ┌─────────────────────────┐
//!                     │ streams: HashMap<Id,    │
//!                     │   Arc<StreamHub> {      │
//!                     │     tx: mpsc::Sender,   │
//!                     │     state: RwLock<..>,  │
//!                     │   }                     │
//!                     │ >                       │
//!                     └───────────┬─────────────┘
//!                                 │
//!         ┌───────────────────────┼───────────────────────┐
//!         │                       │                       │
//!         ▼                       ▼                       ▼
//!    [Producer]              [Fan-out task]          [Subscriber]
//!    hub.enqueue() ──queue──► rx.recv() ──write──► transport ──► TCP
//! ```
//!
//! # Zero-Copy Design
//!
//! Payloads are `bytes::Bytes`, so each subscriber write and the GOP cache
//! share one allocation per packet.

pub mod config;
pub mod error;
pub mod gop;
pub mod hub;
pub mod metadata;
pub mod store;
pub mod subscriber;

pub use config::RegistryConfig;
pub use error::RegistryError;
pub use gop::GopCache;
pub use hub::{EnqueueResult, StreamHub};
pub use metadata::StreamMetadata;
pub use store::StreamRegistry;
pub use subscriber::{Delivery, Subscriber, SubscriberId, Transport};
