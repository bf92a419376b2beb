//! Stream metadata
//!
//! Codec parameters announced by the most recent push handshake and handed
//! to every pull client in its handshake response.

use bytes::Bytes;

/// Encoding parameters of a stream
///
/// Replaced wholesale by each push handshake (last writer wins).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamMetadata {
    pub video_codec_id: i64,
    pub audio_codec_id: i64,
    pub fps: i64,
    pub width: i64,
    pub height: i64,
    /// Codec initialization data for the video track (may be empty)
    pub video_extradata: Bytes,
    /// Codec initialization data for the audio track (may be empty)
    pub audio_extradata: Bytes,
}
