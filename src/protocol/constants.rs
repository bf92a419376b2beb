//! Wire protocol constants

/// Size of the fixed packet header in bytes
///
/// `pts:i64 | dts:i64 | stream_index:i32 | flags:i32 | size:i32`, all little-endian.
pub const HEADER_SIZE: usize = 28;

/// Largest payload a packet may declare
pub const MAX_PACKET_SIZE: usize = 100_000_000;

/// Flag bit marking an independently decodable packet
pub const FLAG_KEYFRAME: i32 = 1;

/// Track index of the primary (video) track
pub const PRIMARY_TRACK: i32 = 0;

/// Size of the handshake length prefix
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Default limit on a handshake document
pub const DEFAULT_MAX_HANDSHAKE_SIZE: usize = 1024 * 1024;

/// Default relay port
pub const DEFAULT_PORT: u16 = 1935;
