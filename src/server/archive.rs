//! Primary-track archival
//!
//! Every push connection appends the payloads of its primary track, as
//! received, to a file named after the stream id.

use std::path::{Component, Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::error::{HandshakeError, Result};

/// Archive file of one push connection
#[derive(Debug)]
pub struct Archive {
    path: PathBuf,
    writer: BufWriter<File>,
    bytes_written: u64,
}

impl Archive {
    /// Create (or truncate) the archive for `stream_id` inside `dir`
    pub async fn create(dir: &Path, stream_id: &str) -> Result<Self> {
        let path = archive_path(dir, stream_id)?;
        let file = File::create(&path).await?;

        Ok(Self {
            path,
            writer: BufWriter::new(file),
            bytes_written: 0,
        })
    }

    /// Append one payload
    pub async fn append(&mut self, payload: &[u8]) -> std::io::Result<()> {
        self.writer.write_all(payload).await?;
        self.bytes_written += payload.len() as u64;
        Ok(())
    }

    /// Flush buffered data to disk
    pub async fn finish(&mut self) -> std::io::Result<()> {
        self.writer.flush().await
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

/// Resolve the archive file for a stream
///
/// The stream id must be a single plain file name.
pub fn archive_path(dir: &Path, stream_id: &str) -> std::result::Result<PathBuf, HandshakeError> {
    let mut components = Path::new(stream_id).components();

    match (components.next(), components.next()) {
        (Some(Component::Normal(name)), None)
            if name == stream_id && !stream_id.contains(['/', '\\']) =>
        {
            Ok(dir.join(name))
        }
        _ => Err(HandshakeError::InvalidStreamId(stream_id.to_string())),
    }
}
