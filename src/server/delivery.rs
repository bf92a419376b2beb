//! Pull-side adapter
//!
//! Answers a pull handshake with the stream's metadata, attaches the
//! connection to the stream's hub and then only reads from the peer, purely
//! to notice when it goes away. Anything the client sends is discarded.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};

use crate::error::Result;
use crate::protocol::handshake::write_document;
use crate::protocol::{PullRequest, PullResponse};
use crate::registry::{StreamRegistry, Subscriber, SubscriberId};

/// Run a pull session to completion
///
/// An unknown stream id ends the connection without any response.
pub async fn handle_pull<S>(
    session_id: u64,
    stream: S,
    request: PullRequest,
    registry: &StreamRegistry,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let stream_id = request.stream_id;

    let hub = match registry.lookup(&stream_id).await {
        Ok(hub) => hub,
        Err(e) => {
            tracing::info!(session_id = session_id, stream = %stream_id, "Pull client requested unknown stream");
            return Err(e.into());
        }
    };

    let metadata = hub.metadata().await;
    let (mut reader, mut writer) = tokio::io::split(stream);
    write_document(&mut writer, &PullResponse::new(stream_id.clone(), &metadata)).await?;

    tracing::info!(
        session_id = session_id,
        stream = %stream_id,
        video_codec_id = metadata.video_codec_id,
        audio_codec_id = metadata.audio_codec_id,
        fps = metadata.fps,
        video_extradata = metadata.video_extradata.len(),
        audio_extradata = metadata.audio_extradata.len(),
        "Pull client connected"
    );

    let subscriber = Arc::new(Subscriber::new(
        SubscriberId(session_id),
        stream_id.clone(),
        Box::new(writer),
    ));
    registry.attach(Arc::clone(&subscriber)).await;

    let result = discard_until_closed(&mut reader).await;

    registry.detach(&stream_id, subscriber.id()).await;
    subscriber.close().await;

    tracing::info!(session_id = session_id, stream = %stream_id, "Pull client disconnected");

    result
}

/// Read and drop everything until EOF or a read error
async fn discard_until_closed<R>(reader: &mut R) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; 512];
    loop {
        if reader.read(&mut buf).await? == 0 {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::{duplex, AsyncWriteExt};
    use tokio::time::timeout;

    use super::*;
    use crate::error::{Error, RegistryError};
    use crate::protocol::handshake::read_document;
    use crate::protocol::{Packet, FLAG_KEYFRAME};
    use crate::registry::StreamMetadata;

    const WAIT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_unknown_stream_rejected() {
        let registry = StreamRegistry::new();
        let (server_side, _client_side) = duplex(1024);

        let err = handle_pull(1, server_side, PullRequest::new("missing"), &registry)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Registry(RegistryError::StreamNotFound(ref id)) if id == "missing"
        ));
        assert!(!registry.stream_exists("missing").await);
    }

    #[tokio::test]
    async fn test_pull_session_lifecycle() {
        let registry = Arc::new(StreamRegistry::new());
        let hub = registry
            .update_metadata(
                "s1",
                StreamMetadata {
                    video_codec_id: 7,
                    fps: 30,
                    ..Default::default()
                },
            )
            .await;

        let (server_side, mut client_side) = duplex(64 * 1024);
        let session = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                handle_pull(42, server_side, PullRequest::new("s1"), &registry).await
            })
        };

        let document = read_document(&mut client_side, 4096).await.unwrap();
        let response: PullResponse = serde_json::from_slice(&document).unwrap();
        assert_eq!(response.stream_id, "s1");
        assert_eq!(response.video_codec_id, 7);
        assert_eq!(response.fps, 30);

        timeout(WAIT, async {
            while !hub.is_attached(SubscriberId(42)).await {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        // Bytes from the client are ignored
        client_side.write_all(&[0u8; 3]).await.unwrap();

        let packet = Packet::new(0, 0, 0, FLAG_KEYFRAME, vec![1, 2, 3, 4]);
        hub.enqueue(packet.clone());
        let received = timeout(WAIT, Packet::read_from(&mut client_side))
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(received, packet);

        // Closing the client detaches the subscriber
        drop(client_side);
        timeout(WAIT, session).await.unwrap().unwrap().unwrap();
        assert!(!hub.is_attached(SubscriberId(42)).await);
    }
}
