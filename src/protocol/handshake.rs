//! Connection handshake documents
//!
//! The first thing on every connection is a little-endian `u32` length
//! followed by a JSON document of that length. Its `mode` field decides
//! whether the peer is a producer (`push`) or a subscriber (`pull`).
//!
//! Push request:
//!
//! ```json
//! {"mode": "push", "stream_id": "cam1", "video_codec_id": 27, "audio_codec_id": 86018,
//!  "fps": 30, "width": 1920, "height": 1080, "video_extradata": "<base64>"}
//! ```
//!
//! Pull request `{"mode": "pull", "stream_id": "cam1"}` is answered with a
//! document carrying the stream's current metadata, after which the
//! connection receives the live packet stream.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{HandshakeError, Result};
use crate::registry::StreamMetadata;

/// A parsed handshake request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum HandshakeRequest {
    /// Producer announcing a stream
    Push(PushRequest),
    /// Subscriber asking for a stream
    Pull(PullRequest),
}

impl HandshakeRequest {
    /// Parse a handshake document
    pub fn parse(document: &[u8]) -> std::result::Result<Self, HandshakeError> {
        let value: serde_json::Value = serde_json::from_slice(document)?;

        let mode = value
            .get("mode")
            .and_then(serde_json::Value::as_str)
            .ok_or(HandshakeError::MissingMode)?;

        match mode {
            "push" => Ok(HandshakeRequest::Push(serde_json::from_value(value)?)),
            "pull" => Ok(HandshakeRequest::Pull(serde_json::from_value(value)?)),
            other => Err(HandshakeError::UnsupportedMode(other.to_string())),
        }
    }

    /// Stream the request refers to
    pub fn stream_id(&self) -> &str {
        match self {
            HandshakeRequest::Push(req) => &req.stream_id,
            HandshakeRequest::Pull(req) => &req.stream_id,
        }
    }
}

/// Push handshake fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushRequest {
    pub stream_id: String,
    #[serde(deserialize_with = "number")]
    pub video_codec_id: i64,
    #[serde(deserialize_with = "number")]
    pub audio_codec_id: i64,
    #[serde(deserialize_with = "number")]
    pub fps: i64,
    #[serde(deserialize_with = "number")]
    pub width: i64,
    #[serde(deserialize_with = "number")]
    pub height: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_extradata: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_extradata: Option<String>,
}

impl PushRequest {
    /// Build a push request announcing `metadata` for `stream_id`
    pub fn new(stream_id: impl Into<String>, metadata: &StreamMetadata) -> Self {
        Self {
            stream_id: stream_id.into(),
            video_codec_id: metadata.video_codec_id,
            audio_codec_id: metadata.audio_codec_id,
            fps: metadata.fps,
            width: metadata.width,
            height: metadata.height,
            video_extradata: encode_extradata(&metadata.video_extradata),
            audio_extradata: encode_extradata(&metadata.audio_extradata),
        }
    }

    /// Decode the announced metadata, including base64 extradata
    pub fn metadata(&self) -> std::result::Result<StreamMetadata, HandshakeError> {
        Ok(StreamMetadata {
            video_codec_id: self.video_codec_id,
            audio_codec_id: self.audio_codec_id,
            fps: self.fps,
            width: self.width,
            height: self.height,
            video_extradata: decode_extradata("video_extradata", self.video_extradata.as_deref())?,
            audio_extradata: decode_extradata("audio_extradata", self.audio_extradata.as_deref())?,
        })
    }
}

/// Pull handshake fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub stream_id: String,
}

impl PullRequest {
    pub fn new(stream_id: impl Into<String>) -> Self {
        Self {
            stream_id: stream_id.into(),
        }
    }
}

/// Document sent back to a pull client before the packet stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullResponse {
    pub stream_id: String,
    pub video_codec_id: i64,
    pub audio_codec_id: i64,
    pub fps: i64,
    pub width: i64,
    pub height: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_extradata: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_extradata: Option<String>,
}

impl PullResponse {
    pub fn new(stream_id: impl Into<String>, metadata: &StreamMetadata) -> Self {
        Self {
            stream_id: stream_id.into(),
            video_codec_id: metadata.video_codec_id,
            audio_codec_id: metadata.audio_codec_id,
            fps: metadata.fps,
            width: metadata.width,
            height: metadata.height,
            video_extradata: encode_extradata(&metadata.video_extradata),
            audio_extradata: encode_extradata(&metadata.audio_extradata),
        }
    }

    /// Decode the metadata carried by the response
    pub fn metadata(&self) -> std::result::Result<StreamMetadata, HandshakeError> {
        Ok(StreamMetadata {
            video_codec_id: self.video_codec_id,
            audio_codec_id: self.audio_codec_id,
            fps: self.fps,
            width: self.width,
            height: self.height,
            video_extradata: decode_extradata("video_extradata", self.video_extradata.as_deref())?,
            audio_extradata: decode_extradata("audio_extradata", self.audio_extradata.as_deref())?,
        })
    }
}

/// Read one length-prefixed document
///
/// Documents longer than `max_len` are rejected before anything is
/// allocated for them.
pub async fn read_document<R>(reader: &mut R, max_len: usize) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let len = reader.read_u32_le().await? as usize;
    if len > max_len {
        return Err(HandshakeError::DocumentTooLarge { len, max: max_len }.into());
    }

    let mut document = vec![0u8; len];
    reader.read_exact(&mut document).await?;
    Ok(document)
}

/// Serialize `value` and write it as one length-prefixed document
pub async fn write_document<W, T>(writer: &mut W, value: &T) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
    T: Serialize,
{
    let document = serde_json::to_vec(value).map_err(HandshakeError::InvalidDocument)?;

    let mut frame = Vec::with_capacity(4 + document.len());
    frame.extend_from_slice(&(document.len() as u32).to_le_bytes());
    frame.extend_from_slice(&document);

    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Accept any JSON number and truncate it to an integer
fn number<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    Ok(value as i64)
}

fn encode_extradata(data: &Bytes) -> Option<String> {
    if data.is_empty() {
        None
    } else {
        Some(STANDARD.encode(data))
    }
}

fn decode_extradata(
    field: &'static str,
    encoded: Option<&str>,
) -> std::result::Result<Bytes, HandshakeError> {
    match encoded {
        None | Some("") => Ok(Bytes::new()),
        Some(encoded) => STANDARD
            .decode(encoded)
            .map(Bytes::from)
            .map_err(|source| HandshakeError::InvalidExtraData { field, source }),
    }
}
