//! Media packet model and framing
//!
//! A packet is a fixed 28-byte little-endian header followed by exactly
//! `size` payload bytes. The same framing is used on push connections
//! (producer to relay) and pull connections (relay to subscriber).

use std::io;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{FramingError, Result};

use super::constants::{FLAG_KEYFRAME, HEADER_SIZE, MAX_PACKET_SIZE, PRIMARY_TRACK};

/// Fixed-size packet header as it appears on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    /// Presentation timestamp (producer-defined units)
    pub pts: i64,
    /// Decode timestamp (producer-defined units)
    pub dts: i64,
    /// Track within the stream (`streamIndex` on the wire)
    pub track_index: i32,
    /// Flag bits, see [`FLAG_KEYFRAME`]
    pub flags: i32,
    /// Declared payload length
    pub size: i32,
}

impl PacketHeader {
    /// Decode a header from its wire form
    pub fn decode(bytes: &[u8; HEADER_SIZE]) -> Self {
        let mut buf = &bytes[..];
        Self {
            pts: buf.get_i64_le(),
            dts: buf.get_i64_le(),
            track_index: buf.get_i32_le(),
            flags: buf.get_i32_le(),
            size: buf.get_i32_le(),
        }
    }

    /// Encode the header into `buf`
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_i64_le(self.pts);
        buf.put_i64_le(self.dts);
        buf.put_i32_le(self.track_index);
        buf.put_i32_le(self.flags);
        buf.put_i32_le(self.size);
    }

    /// Encode the header into a fixed array
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        let mut cursor = &mut out[..];
        self.encode(&mut cursor);
        out
    }

    /// Validate the declared size and return it as a payload length
    ///
    /// Sizes outside `[0, MAX_PACKET_SIZE]` are a protocol violation that
    /// terminates the connection.
    pub fn payload_len(&self) -> std::result::Result<usize, FramingError> {
        usize::try_from(self.size)
            .ok()
            .filter(|len| *len <= MAX_PACKET_SIZE)
            .ok_or(FramingError::InvalidPacketSize(self.size as i64))
    }
}

/// A media packet
///
/// Immutable once built. The payload is reference counted, so cloning a
/// packet for every subscriber does not copy media data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Presentation timestamp
    pub pts: i64,
    /// Decode timestamp
    pub dts: i64,
    /// Track index, 0 is the primary (video) track
    pub track_index: i32,
    /// Flag bits
    pub flags: i32,
    /// Opaque payload
    pub payload: Bytes,
}

impl Packet {
    /// Create a packet
    pub fn new(pts: i64, dts: i64, track_index: i32, flags: i32, payload: impl Into<Bytes>) -> Self {
        Self {
            pts,
            dts,
            track_index,
            flags,
            payload: payload.into(),
        }
    }

    /// Build a packet from a validated header and its payload
    pub fn from_parts(header: PacketHeader, payload: Bytes) -> Self {
        Self {
            pts: header.pts,
            dts: header.dts,
            track_index: header.track_index,
            flags: header.flags,
            payload,
        }
    }

    /// Header describing this packet
    pub fn header(&self) -> PacketHeader {
        PacketHeader {
            pts: self.pts,
            dts: self.dts,
            track_index: self.track_index,
            flags: self.flags,
            size: self.payload.len() as i32,
        }
    }

    /// Whether the keyframe bit is set
    pub fn is_keyframe(&self) -> bool {
        self.flags & FLAG_KEYFRAME != 0
    }

    /// Whether this packet belongs to the primary (video) track
    pub fn is_primary(&self) -> bool {
        self.track_index == PRIMARY_TRACK
    }

    /// A primary-track keyframe, the point where a late joiner can start decoding
    pub fn is_sync_point(&self) -> bool {
        self.is_primary() && self.is_keyframe()
    }

    /// Total encoded size (header + payload)
    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    /// Check that the payload fits the wire size field
    pub fn check_size(&self) -> std::result::Result<(), FramingError> {
        if self.payload.len() > MAX_PACKET_SIZE {
            return Err(FramingError::InvalidPacketSize(self.payload.len() as i64));
        }
        Ok(())
    }

    /// Append the wire form of this packet to `buf`
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.reserve(self.encoded_len());
        self.header().encode(buf);
        buf.put_slice(&self.payload);
    }

    /// Decode one packet from the front of `buf`
    ///
    /// Returns `Ok(None)` if `buf` does not yet hold a complete packet, in
    /// which case nothing is consumed. The payload is split off without
    /// copying.
    pub fn decode(buf: &mut BytesMut) -> std::result::Result<Option<Self>, FramingError> {
        if buf.len() < HEADER_SIZE {
            return Ok(None);
        }

        let mut raw = [0u8; HEADER_SIZE];
        raw.copy_from_slice(&buf[..HEADER_SIZE]);
        let header = PacketHeader::decode(&raw);
        let len = header.payload_len()?;

        if buf.len() < HEADER_SIZE + len {
            return Ok(None);
        }

        buf.advance(HEADER_SIZE);
        let payload = buf.split_to(len).freeze();
        Ok(Some(Self::from_parts(header, payload)))
    }

    /// Write the packet to an async sink
    ///
    /// Header and payload are written separately so the payload is never
    /// copied into a staging buffer.
    pub async fn write_to<W>(&self, writer: &mut W) -> io::Result<()>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        writer.write_all(&self.header().to_bytes()).await?;
        writer.write_all(&self.payload).await?;
        Ok(())
    }

    /// Read one packet from an async source
    ///
    /// Returns `Ok(None)` when the peer closes the connection between
    /// packets. A size outside the allowed range, or a header or payload cut
    /// short, is a framing error.
    pub async fn read_from<R>(reader: &mut R) -> Result<Option<Self>>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut raw = [0u8; HEADER_SIZE];
        let mut filled = 0;
        while filled < HEADER_SIZE {
            match reader.read(&mut raw[filled..]).await? {
                0 if filled == 0 => return Ok(None),
                0 => return Err(FramingError::Truncated { expected: HEADER_SIZE }.into()),
                n => filled += n,
            }
        }

        let header = PacketHeader::decode(&raw);
        let len = header.payload_len()?;

        let mut payload = BytesMut::zeroed(len);
        match reader.read_exact(&mut payload).await {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                return Err(FramingError::Truncated { expected: len }.into());
            }
            Err(e) => return Err(e.into()),
        }

        Ok(Some(Self::from_parts(header, payload.freeze())))
    }
}

#[cfg(test)]
mod tests {
    use tokio_test::io::Builder;

    use super::*;
    use crate::error::Error;

    fn roundtrip(len: usize) {
        let packet = Packet::new(-5, 1234, 0, FLAG_KEYFRAME, vec![0x5A; len]);

        let mut buf = BytesMut::new();
        packet.encode(&mut buf);
        assert_eq!(buf.len(), HEADER_SIZE + len);

        let decoded = Packet::decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded.header(), packet.header());
        assert_eq!(decoded.payload.len(), len);
        assert!(decoded.payload == packet.payload);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_header_layout_little_endian() {
        let header = PacketHeader {
            pts: 1,
            dts: 2,
            track_index: 3,
            flags: 1,
            size: 4,
        };
        let bytes = header.to_bytes();

        assert_eq!(&bytes[0..8], &1i64.to_le_bytes());
        assert_eq!(&bytes[8..16], &2i64.to_le_bytes());
        assert_eq!(&bytes[16..20], &3i32.to_le_bytes());
        assert_eq!(&bytes[20..24], &1i32.to_le_bytes());
        assert_eq!(&bytes[24..28], &4i32.to_le_bytes());
        assert_eq!(PacketHeader::decode(&bytes), header);
    }

    #[test]
    fn test_roundtrip_empty_payload() {
        roundtrip(0);
    }

    #[test]
    fn test_roundtrip_single_byte() {
        roundtrip(1);
    }

    #[test]
    fn test_roundtrip_max_payload() {
        roundtrip(MAX_PACKET_SIZE);
    }

    #[test]
    fn test_payload_len_bounds() {
        let mut header = PacketHeader {
            pts: 0,
            dts: 0,
            track_index: 0,
            flags: 0,
            size: MAX_PACKET_SIZE as i32,
        };
        assert_eq!(header.payload_len().unwrap(), MAX_PACKET_SIZE);

        header.size = MAX_PACKET_SIZE as i32 + 1;
        assert!(matches!(
            header.payload_len(),
            Err(FramingError::InvalidPacketSize(_))
        ));

        header.size = -1;
        assert!(matches!(
            header.payload_len(),
            Err(FramingError::InvalidPacketSize(-1))
        ));
    }

    #[test]
    fn test_decode_incomplete() {
        let packet = Packet::new(0, 0, 1, 0, vec![1, 2, 3, 4]);
        let mut full = BytesMut::new();
        packet.encode(&mut full);

        let mut partial = BytesMut::from(&full[..HEADER_SIZE + 2]);
        assert!(Packet::decode(&mut partial).unwrap().is_none());
        assert_eq!(partial.len(), HEADER_SIZE + 2);

        let mut short_header = BytesMut::from(&full[..10]);
        assert!(Packet::decode(&mut short_header).unwrap().is_none());
    }

    #[test]
    fn test_flags() {
        let key = Packet::new(0, 0, 0, FLAG_KEYFRAME, Bytes::new());
        assert!(key.is_keyframe());
        assert!(key.is_primary());
        assert!(key.is_sync_point());

        let audio_key = Packet::new(0, 0, 1, FLAG_KEYFRAME, Bytes::new());
        assert!(!audio_key.is_sync_point());

        let delta = Packet::new(0, 0, 0, 0x2, Bytes::new());
        assert!(!delta.is_keyframe());
    }

    #[tokio::test]
    async fn test_read_from_stream() {
        let packet = Packet::new(0, 0, 0, FLAG_KEYFRAME, vec![1, 2, 3, 4]);
        let mut wire = BytesMut::new();
        packet.encode(&mut wire);

        let mut mock = Builder::new()
            .read(&wire[..HEADER_SIZE])
            .read(&wire[HEADER_SIZE..])
            .build();

        let read = Packet::read_from(&mut mock).await.unwrap().unwrap();
        assert_eq!(read, packet);

        // Clean close between packets
        assert!(Packet::read_from(&mut mock).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_read_rejects_oversized() {
        let header = PacketHeader {
            pts: 0,
            dts: 0,
            track_index: 0,
            flags: 0,
            size: MAX_PACKET_SIZE as i32 + 1,
        };
        let mut mock = Builder::new().read(&header.to_bytes()).build();

        let err = Packet::read_from(&mut mock).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Framing(FramingError::InvalidPacketSize(_))
        ));
    }

    #[tokio::test]
    async fn test_read_truncated_payload() {
        let header = Packet::new(0, 0, 0, 0, vec![0; 8]).header();
        let mut mock = Builder::new()
            .read(&header.to_bytes())
            .read(&[1, 2, 3])
            .build();

        let err = Packet::read_from(&mut mock).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Framing(FramingError::Truncated { expected: 8 })
        ));
    }

    #[tokio::test]
    async fn test_read_truncated_header() {
        let header = Packet::new(0, 0, 0, FLAG_KEYFRAME, vec![0; 8]).header();
        let mut mock = Builder::new().read(&header.to_bytes()[..10]).build();

        let err = Packet::read_from(&mut mock).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Framing(FramingError::Truncated { expected: HEADER_SIZE })
        ));
    }

    #[tokio::test]
    async fn test_read_header_across_reads() {
        let packet = Packet::new(5, 4, 1, 0, vec![7, 7]);
        let mut wire = BytesMut::new();
        packet.encode(&mut wire);

        let mut mock = Builder::new()
            .read(&wire[..3])
            .read(&wire[3..HEADER_SIZE])
            .read(&wire[HEADER_SIZE..])
            .build();

        assert_eq!(Packet::read_from(&mut mock).await.unwrap().unwrap(), packet);
    }

    #[tokio::test]
    async fn test_write_to() {
        let packet = Packet::new(7, 7, 1, 0, vec![9, 9]);
        let mut expected = BytesMut::new();
        packet.encode(&mut expected);

        let mut mock = Builder::new()
            .write(&expected[..HEADER_SIZE])
            .write(&expected[HEADER_SIZE..])
            .build();

        packet.write_to(&mut mock).await.unwrap();
    }
}
