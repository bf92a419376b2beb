//! Error types
//!
//! Every error here is scoped to a single connection. The listener logs it
//! and closes that connection; nothing is fatal to the process.

use thiserror::Error;

pub use crate::registry::RegistryError;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug, Error)]
pub enum Error {
    /// Socket or file I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Connection handshake was malformed or unsupported
    #[error("handshake error: {0}")]
    Handshake(#[from] HandshakeError),

    /// Packet framing violated on a push connection
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    /// Registry lookup failed
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Server closed the connection before answering the handshake
    #[error("server rejected request for stream {0}")]
    Rejected(String),
}

/// Handshake errors: the connection is closed without a response
#[derive(Debug, Error)]
pub enum HandshakeError {
    /// Length prefix exceeds the configured limit
    #[error("handshake document of {len} bytes exceeds limit of {max}")]
    DocumentTooLarge { len: usize, max: usize },

    /// Document is not valid JSON or a required field is missing
    #[error("invalid handshake document: {0}")]
    InvalidDocument(#[from] serde_json::Error),

    /// Document has no string `mode` field
    #[error("missing mode")]
    MissingMode,

    /// `mode` is neither `push` nor `pull`
    #[error("mode {0:?} is not supported")]
    UnsupportedMode(String),

    /// Extradata field is not valid base64
    #[error("failed to decode {field}: {source}")]
    InvalidExtraData {
        field: &'static str,
        #[source]
        source: base64::DecodeError,
    },

    /// Stream id cannot be used as an archive file name
    #[error("invalid stream id {0:?}")]
    InvalidStreamId(String),
}

/// Framing errors on the packet stream
#[derive(Debug, Error)]
pub enum FramingError {
    /// Declared payload size outside `[0, MAX_PACKET_SIZE]`
    #[error("invalid packet size: {0}")]
    InvalidPacketSize(i64),

    /// Connection ended inside a payload
    #[error("truncated packet payload, expected {expected} bytes")]
    Truncated { expected: usize },
}
