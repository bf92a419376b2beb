//! Relay wire protocol
//!
//! Every connection opens with a handshake document:
//!
//! ```text
//! +----------------+---------------------------+
//! | length (u32LE) | JSON document (length B)  |
//! +----------------+---------------------------+
//! ```
//!
//! The document's `mode` selects push or pull. After the handshake both
//! directions carry the same packet framing:
//!
//! ```text
//! +---------+---------+-------------+---------+---------+------------+
//! | pts i64 | dts i64 | stream i32  | flags   | size    | payload... |
//! |         |         |             | i32     | i32     | (size B)   |
//! +---------+---------+-------------+---------+---------+------------+
//! ```

pub mod constants;
pub mod handshake;
pub mod packet;

pub use constants::{FLAG_KEYFRAME, HEADER_SIZE, MAX_PACKET_SIZE, PRIMARY_TRACK};
pub use handshake::{HandshakeRequest, PullRequest, PullResponse, PushRequest};
pub use packet::{Packet, PacketHeader};
