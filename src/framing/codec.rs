//! Frame encoding and checksum handling.
//!
//! Wire format:
//! ```text
//! +0      Payload (variable, no length prefix)
//! +N      Checksum (1 byte, sum of payload bytes mod 256)
//! +N+1    Sync pattern (8 bytes, "abcdefgh")
//! ```

use crate::core::DecodeError;
use crate::core::constants::{CHECKSUM_SIZE, SYNC_PATTERN, SYNC_PATTERN_SIZE};

/// Sum of all bytes, mod 256.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// Frame a payload for the wire: payload, checksum, sync pattern.
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(payload.len() + CHECKSUM_SIZE + SYNC_PATTERN_SIZE);
    frame.extend_from_slice(payload);
    frame.push(checksum(payload));
    frame.extend_from_slice(&SYNC_PATTERN);
    frame
}

/// Verify the trailing checksum of a delimited frame and return the payload.
pub fn verify_checksum(frame: &[u8]) -> Result<&[u8], DecodeError> {
    let Some((&received, payload)) = frame.split_last() else {
        return Err(DecodeError::TooShort {
            expected: CHECKSUM_SIZE,
            actual: 0,
        });
    };

    let computed = checksum(payload);
    if computed != received {
        return Err(DecodeError::ChecksumMismatch { computed, received });
    }

    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_wraps() {
        assert_eq!(checksum(&[]), 0);
        assert_eq!(checksum(&[1, 2, 3]), 6);
        assert_eq!(checksum(&[0xFF, 0x02]), 0x01);
    }

    #[test]
    fn test_encode_frame_layout() {
        let frame = encode_frame(&[0xAA, 0x01, 0, 0, 0, 0]);
        assert_eq!(hex::encode(&frame), "aa0100000000ab6162636465666768");
    }

    #[test]
    fn test_verify_returns_payload_unchanged() {
        let payload = [0x11, 0x03, 0x00, 0x00, 0x00, 0x2a];
        let frame = encode_frame(&payload);
        let delimited = &frame[..frame.len() - SYNC_PATTERN_SIZE];

        assert_eq!(verify_checksum(delimited).unwrap(), &payload);
    }

    #[test]
    fn test_single_byte_corruption_rejected() {
        let payload: Vec<u8> = (0u8..40).collect();
        let frame = encode_frame(&payload);
        let delimited = &frame[..frame.len() - SYNC_PATTERN_SIZE];

        for i in 0..payload.len() {
            let mut corrupted = delimited.to_vec();
            corrupted[i] ^= 0x10;
            assert!(matches!(
                verify_checksum(&corrupted),
                Err(DecodeError::ChecksumMismatch { .. })
            ));
        }
    }

    #[test]
    fn test_empty_frame_rejected() {
        assert!(matches!(
            verify_checksum(&[]),
            Err(DecodeError::TooShort { .. })
        ));
    }
}
