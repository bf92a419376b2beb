//! Relay client implementation
//!
//! Provides client-side access to a relay for:
//! - Publishing a stream (push)
//! - Subscribing to a stream (pull)

pub mod publisher;
pub mod puller;

pub use publisher::RelayPublisher;
pub use puller::RelayPuller;
