//! Relay server
//!
//! Accepts TCP connections, reads each one's handshake and runs it as
//! either a push (ingest) or pull (delivery) session against the shared
//! [`StreamRegistry`](crate::registry::StreamRegistry).

pub mod archive;
pub mod config;
pub mod connection;
pub mod delivery;
pub mod ingest;
pub mod listener;

pub use config::ServerConfig;
pub use listener::RelayServer;
