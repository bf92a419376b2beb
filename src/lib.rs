//! Live audio/video relay
//!
//! Push producers stream timestamped media packets over a persistent TCP
//! connection; the relay fans each packet out, in real time, to every pull
//! subscriber attached to the same stream.
//!
//! ```text
//!   [push conn] ──► ingest ──► StreamHub::enqueue ──► queue
//!                                                      │
//!                                         fan-out loop ▼
//!                               ┌──────────────┬──────────────┐
//!                               ▼              ▼              ▼
//!                          [pull conn]    [pull conn]    [pull conn]
//! ```
//!
//! The [`registry::StreamRegistry`] is the only way the connection adapters
//! reach a [`registry::StreamHub`].

pub mod client;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod stats;

pub use error::{Error, Result};
pub use protocol::{Packet, PacketHeader, MAX_PACKET_SIZE};
pub use registry::{RegistryConfig, StreamHub, StreamMetadata, StreamRegistry};
pub use server::{RelayServer, ServerConfig};
