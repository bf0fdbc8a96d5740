//! Receive-side byte stream and frame extraction.
//!
//! The stream has no length prefixes; frames are whatever precedes a sync
//! marker. Bytes are only dropped up to a confirmed marker or when the
//! inactivity watchdog flushes a stalled stream.

use std::time::{Duration, Instant};

use super::matcher::find_sync;
use crate::core::constants::{FRAME_TIMEOUT, SYNC_MAX_EDITS, SYNC_PATTERN, SYNC_TRAILING_MARGIN};

/// Result of a watchdog flush.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flush {
    /// Frame recovered from the stalled stream, if a marker was found.
    pub frame: Option<Vec<u8>>,
    /// Bytes discarded after the recovery attempt.
    pub discarded: usize,
}

/// Byte stream owned by the framer.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    /// Received bytes not yet consumed.
    stream: Vec<u8>,
    /// When the last byte arrived.
    last_byte_at: Option<Instant>,
    /// Inactivity after which the stream is flushed.
    frame_timeout: Duration,
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameBuffer {
    /// Create an empty buffer with the protocol frame timeout.
    pub fn new() -> Self {
        Self::with_timeout(FRAME_TIMEOUT)
    }

    /// Create an empty buffer with a custom inactivity timeout.
    pub fn with_timeout(frame_timeout: Duration) -> Self {
        Self {
            stream: Vec::new(),
            last_byte_at: None,
            frame_timeout,
        }
    }

    /// Number of buffered bytes.
    pub fn len(&self) -> usize {
        self.stream.len()
    }

    /// Check if no bytes are buffered.
    pub fn is_empty(&self) -> bool {
        self.stream.is_empty()
    }

    /// Buffered bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.stream
    }

    /// When the last byte arrived.
    pub fn last_byte_at(&self) -> Option<Instant> {
        self.last_byte_at
    }

    /// Append a received byte and try to delimit a frame.
    pub fn push(&mut self, byte: u8, now: Instant) -> Option<Vec<u8>> {
        self.stream.push(byte);
        self.last_byte_at = Some(now);
        self.extract(false)
    }

    /// Look for the earliest sync marker and consume up to its end.
    ///
    /// Without `allow_abrupt_end` the marker must be followed by more than
    /// [`SYNC_TRAILING_MARGIN`] bytes. Returns the bytes before the marker,
    /// unless the marker sits at offset 0.
    pub fn extract(&mut self, allow_abrupt_end: bool) -> Option<Vec<u8>> {
        let found = find_sync(&self.stream, &SYNC_PATTERN, SYNC_MAX_EDITS)?;

        if !allow_abrupt_end && self.stream.len() <= found.end + SYNC_TRAILING_MARGIN {
            return None;
        }

        let frame = (found.start > 0).then(|| self.stream[..found.start].to_vec());
        self.stream.drain(..found.end);
        frame
    }

    /// Check whether the stream has stalled and flush it if so.
    ///
    /// Returns `None` while bytes are still flowing or nothing is buffered.
    /// A returned [`Flush`] means the caller must signal an inactivity
    /// timeout after delivering `frame`.
    pub fn check_inactivity(&mut self, now: Instant) -> Option<Flush> {
        if self.stream.is_empty() {
            return None;
        }

        let stalled = match self.last_byte_at {
            Some(at) => now.saturating_duration_since(at) > self.frame_timeout,
            None => true,
        };
        if !stalled {
            return None;
        }

        let frame = self.extract(true);
        let discarded = self.stream.len();
        self.stream.clear();

        Some(Flush { frame, discarded })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framing::encode_frame;

    fn feed(buffer: &mut FrameBuffer, bytes: &[u8], now: Instant) -> Vec<Vec<u8>> {
        bytes
            .iter()
            .filter_map(|&b| buffer.push(b, now))
            .collect()
    }

    #[test]
    fn test_frame_needs_trailing_margin() {
        let now = Instant::now();
        let mut buffer = FrameBuffer::new();
        let wire = encode_frame(&[0x33, 0x01]);

        assert!(feed(&mut buffer, &wire, now).is_empty());
        assert!(feed(&mut buffer, &[0x22, 0x22, 0x22], now).is_empty());

        let frames = feed(&mut buffer, &[0x22], now);
        assert_eq!(frames, vec![vec![0x33, 0x01, 0x34]]);
        assert_eq!(buffer.as_bytes(), &[0x22; 4]);
    }

    #[test]
    fn test_back_to_back_frames_in_order() {
        let now = Instant::now();
        let mut buffer = FrameBuffer::new();

        let mut wire = Vec::new();
        for tag in 1u8..=3 {
            wire.extend(encode_frame(&[tag, 0x10, 0x20, 0x30, 0x40]));
        }
        wire.extend_from_slice(&[0xEE; 4]);

        let frames = feed(&mut buffer, &wire, now);
        let tags: Vec<u8> = frames.iter().map(|f| f[0]).collect();
        assert_eq!(tags, vec![1, 2, 3]);
    }

    #[test]
    fn test_leading_marker_is_discarded() {
        let now = Instant::now();
        let mut buffer = FrameBuffer::new();

        let mut wire = SYNC_PATTERN.to_vec();
        wire.extend_from_slice(&[1, 2, 3, 4]);

        assert!(feed(&mut buffer, &wire, now).is_empty());
        assert_eq!(buffer.as_bytes(), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_noisy_marker_still_delimits() {
        let now = Instant::now();
        let mut buffer = FrameBuffer::new();

        let mut wire = encode_frame(&[0x33, 0x07]);
        let marker_at = wire.len() - SYNC_PATTERN.len();
        wire[marker_at + 4] ^= 0xFF;
        wire.extend_from_slice(&[0; 4]);

        let frames = feed(&mut buffer, &wire, now);
        assert_eq!(frames, vec![vec![0x33, 0x07, 0x3A]]);
    }

    #[test]
    fn test_no_flush_while_bytes_flow() {
        let start = Instant::now();
        let mut buffer = FrameBuffer::new();
        feed(&mut buffer, &[1, 2, 3], start);

        assert_eq!(buffer.check_inactivity(start + Duration::from_millis(100)), None);
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn test_flush_recovers_trailing_frame() {
        let start = Instant::now();
        let mut buffer = FrameBuffer::new();
        feed(&mut buffer, &encode_frame(&[0x33, 0x01]), start);

        let flush = buffer
            .check_inactivity(start + Duration::from_millis(250))
            .unwrap();

        assert_eq!(flush.frame, Some(vec![0x33, 0x01, 0x34]));
        assert_eq!(flush.discarded, 0);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_flush_clears_garbage() {
        let start = Instant::now();
        let mut buffer = FrameBuffer::new();
        feed(&mut buffer, &[9, 9, 9, 9, 9], start);

        let flush = buffer
            .check_inactivity(start + Duration::from_millis(250))
            .unwrap();

        assert_eq!(
            flush,
            Flush {
                frame: None,
                discarded: 5,
            }
        );
        assert!(buffer.is_empty());
        assert_eq!(buffer.check_inactivity(start + Duration::from_secs(1)), None);
    }

    #[test]
    fn test_empty_buffer_never_flushes() {
        let mut buffer = FrameBuffer::new();
        assert_eq!(buffer.check_inactivity(Instant::now()), None);
    }
}
