//! Server configuration

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::protocol::constants::{DEFAULT_MAX_HANDSHAKE_SIZE, DEFAULT_PORT};

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum concurrent connections (0 = unlimited)
    pub max_connections: usize,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,

    /// Application-level read buffer size for push connections
    pub read_buffer_size: usize,

    /// Largest handshake document accepted
    pub max_handshake_size: usize,

    /// Directory receiving primary-track archives (None = archival disabled)
    pub archive_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            max_connections: 0, // Unlimited
            tcp_nodelay: true, // Important for low latency
            read_buffer_size: 64 * 1024, // 64KB
            max_handshake_size: DEFAULT_MAX_HANDSHAKE_SIZE,
            archive_dir: Some(PathBuf::from(".")),
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the handshake document limit
    pub fn max_handshake_size(mut self, size: usize) -> Self {
        self.max_handshake_size = size;
        self
    }

    /// Archive primary tracks under `dir`
    pub fn archive_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.archive_dir = Some(dir.into());
        self
    }

    /// Disable primary-track archival
    pub fn disable_archive(mut self) -> Self {
        self.archive_dir = None;
        self
    }
}
