//! Late-joiner GOP cache
//!
//! Holds every packet (all tracks) since the most recent primary-track
//! keyframe, so a subscriber attaching mid-GOP can start decoding right away
//! instead of waiting for the next keyframe.
//!
//! The cache never holds a partial GOP: it starts at a keyframe, and if the
//! byte limit would be exceeded it is emptied until the next keyframe.

use crate::protocol::Packet;

/// Cache of the current GOP
#[derive(Debug)]
pub struct GopCache {
    /// Byte limit (0 = disabled)
    max_size: usize,
    /// Payload bytes currently held
    current_size: usize,
    /// Packets since the last sync point, sync point first
    packets: Vec<Packet>,
}

impl GopCache {
    /// Create a cache holding at most `max_size` payload bytes
    pub fn with_max_size(max_size: usize) -> Self {
        Self {
            max_size,
            current_size: 0,
            packets: Vec::new(),
        }
    }

    /// Whether caching is enabled
    pub fn is_enabled(&self) -> bool {
        self.max_size > 0
    }

    /// Record a packet in fan-out order
    ///
    /// Returns true if the packet was cached.
    pub fn push(&mut self, packet: &Packet) -> bool {
        if !self.is_enabled() {
            return false;
        }

        if packet.is_sync_point() {
            self.clear();
        } else if self.packets.is_empty() {
            // No sync point yet
            return false;
        }

        let size = packet.payload.len();
        if self.current_size + size > self.max_size {
            self.clear();
            return false;
        }

        self.packets.push(packet.clone());
        self.current_size += size;
        true
    }

    /// Packets a late joiner needs, starting with the sync point
    pub fn snapshot(&self) -> Vec<Packet> {
        self.packets.clone()
    }

    pub fn clear(&mut self) {
        self.packets.clear();
        self.current_size = 0;
    }

    /// Number of cached packets
    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Cached payload bytes
    pub fn size(&self) -> usize {
        self.current_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::FLAG_KEYFRAME;

    fn video(pts: i64, keyframe: bool, len: usize) -> Packet {
        let flags = if keyframe { FLAG_KEYFRAME } else { 0 };
        Packet::new(pts, pts, 0, flags, vec![0u8; len])
    }

    fn audio(pts: i64, len: usize) -> Packet {
        Packet::new(pts, pts, 1, 0, vec![0u8; len])
    }

    #[test]
    fn test_waits_for_sync_point() {
        let mut gop = GopCache::with_max_size(1024);

        assert!(!gop.push(&video(0, false, 10)));
        assert!(!gop.push(&audio(1, 10)));
        assert!(gop.is_empty());

        assert!(gop.push(&video(2, true, 10)));
        assert!(gop.push(&audio(3, 10)));
        assert!(gop.push(&video(4, false, 10)));

        let pts: Vec<i64> = gop.snapshot().iter().map(|p| p.pts).collect();
        assert_eq!(pts, vec![2, 3, 4]);
        assert_eq!(gop.size(), 30);
    }

    #[test]
    fn test_keyframe_starts_new_gop() {
        let mut gop = GopCache::with_max_size(1024);

        gop.push(&video(0, true, 10));
        gop.push(&video(1, false, 10));
        gop.push(&video(2, true, 10));

        let snapshot = gop.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].pts, 2);
        assert_eq!(gop.size(), 10);
    }

    #[test]
    fn test_secondary_keyframe_does_not_reset() {
        let mut gop = GopCache::with_max_size(1024);

        gop.push(&video(0, true, 10));
        gop.push(&Packet::new(1, 1, 1, FLAG_KEYFRAME, vec![0u8; 4]));

        assert_eq!(gop.len(), 2);
    }

    #[test]
    fn test_overflow_invalidates() {
        let mut gop = GopCache::with_max_size(25);

        gop.push(&video(0, true, 10));
        gop.push(&video(1, false, 10));
        assert!(!gop.push(&video(2, false, 10)));
        assert!(gop.is_empty());
        assert_eq!(gop.size(), 0);

        // Stays empty until the next keyframe
        assert!(!gop.push(&video(3, false, 1)));
        assert!(gop.push(&video(4, true, 5)));
        assert_eq!(gop.len(), 1);
    }

    #[test]
    fn test_oversized_keyframe_not_cached() {
        let mut gop = GopCache::with_max_size(8);

        assert!(!gop.push(&video(0, true, 9)));
        assert!(gop.is_empty());
    }

    #[test]
    fn test_disabled() {
        let mut gop = GopCache::with_max_size(0);

        assert!(!gop.is_enabled());
        assert!(!gop.push(&video(0, true, 0)));
        assert!(gop.is_empty());
    }
}
