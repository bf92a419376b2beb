//! Push-side adapter
//!
//! Turns a producer connection into packets on its stream's hub: the
//! handshake metadata replaces the stream's metadata, then framed packets
//! are read until the producer disconnects or breaks framing.

use std::time::Instant;

use tokio::io::{AsyncRead, BufReader};

use crate::error::{Error, Result};
use crate::protocol::{Packet, PushRequest};
use crate::registry::{EnqueueResult, StreamRegistry};
use crate::stats::IngestStats;

use super::archive::Archive;
use super::config::ServerConfig;

/// Run a push session to completion
///
/// Returns `Ok(())` when the producer closes the connection between packets.
/// A framing violation ends only this connection; the hub and its
/// subscribers carry on.
pub async fn handle_push<R>(
    session_id: u64,
    reader: R,
    request: PushRequest,
    config: &ServerConfig,
    registry: &StreamRegistry,
) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let metadata = request.metadata()?;
    let stream_id = request.stream_id;

    let mut archive = match &config.archive_dir {
        Some(dir) => Some(Archive::create(dir, &stream_id).await?),
        None => None,
    };

    tracing::info!(
        session_id = session_id,
        stream = %stream_id,
        video_codec_id = metadata.video_codec_id,
        audio_codec_id = metadata.audio_codec_id,
        fps = metadata.fps,
        width = metadata.width,
        height = metadata.height,
        video_extradata = metadata.video_extradata.len(),
        audio_extradata = metadata.audio_extradata.len(),
        "Push client connected"
    );

    let hub = registry.update_metadata(&stream_id, metadata).await;

    let mut reader = BufReader::with_capacity(config.read_buffer_size, reader);
    let mut stats = IngestStats::new();
    let started = Instant::now();

    let result = loop {
        let packet = match Packet::read_from(&mut reader).await {
            Ok(Some(packet)) => packet,
            Ok(None) => break Ok(()),
            Err(Error::Framing(e)) => {
                tracing::warn!(
                    session_id = session_id,
                    stream = %stream_id,
                    error = %e,
                    "Invalid packet, disconnecting push client"
                );
                break Err(e.into());
            }
            Err(e) => break Err(e),
        };

        stats.on_packet(packet.payload.len(), packet.is_sync_point());

        tracing::trace!(
            stream = %stream_id,
            pts = packet.pts,
            dts = packet.dts,
            track = packet.track_index,
            flags = packet.flags,
            size = packet.payload.len(),
            "Packet received"
        );

        if packet.is_primary() {
            if let Some(archive) = archive.as_mut() {
                if let Err(e) = archive.append(&packet.payload).await {
                    tracing::error!(
                        stream = %stream_id,
                        path = %archive.path().display(),
                        error = %e,
                        "Failed to archive packet"
                    );
                }
            }
        }

        if hub.enqueue(packet) == EnqueueResult::Dropped {
            stats.dropped += 1;
        }
    };

    if let Some(archive) = archive.as_mut() {
        if let Err(e) = archive.finish().await {
            tracing::error!(stream = %stream_id, error = %e, "Failed to flush archive");
        }
    }

    tracing::info!(
        session_id = session_id,
        stream = %stream_id,
        packets = stats.packets,
        bytes = stats.bytes,
        keyframes = stats.keyframes,
        dropped = stats.dropped,
        archived_bytes = archive.as_ref().map_or(0, Archive::bytes_written),
        bitrate = stats.bitrate(started.elapsed()),
        "Push client disconnected"
    );

    result
}
