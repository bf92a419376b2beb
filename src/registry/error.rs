//! Registry error types

use thiserror::Error;

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// No hub exists for the stream id
    #[error("stream not found: {0}")]
    StreamNotFound(String),
}
