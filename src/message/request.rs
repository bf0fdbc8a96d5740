//! Host-to-token requests.
//!
//! Wire format (inside a frame, before the checksum):
//! ```text
//! +0   Request marker (0xAA)
//! +1   Request kind
//! +2   Block numbers (LE32 each, up to 8; a single zero group means "all")
//! ```

use crate::core::DecodeError;
use crate::core::constants::{
    BLOCK_NUMBER_SIZE, MSG_REQUEST, REQUEST_BLOCKS_PER_FRAME, REQUEST_CONTACT_DATA,
    REQUEST_TESTING_RESULTS,
};

use super::response::read_u32;

/// What a request asks the token for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RequestKind {
    /// Testing results.
    TestingResults = REQUEST_TESTING_RESULTS,
    /// Contact data blocks.
    ContactData = REQUEST_CONTACT_DATA,
}

impl RequestKind {
    /// Parse a request kind from a byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            REQUEST_TESTING_RESULTS => Some(Self::TestingResults),
            REQUEST_CONTACT_DATA => Some(Self::ContactData),
            _ => None,
        }
    }

    /// Convert to the wire byte.
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

/// A block request.
///
/// An empty block list is a full sweep: the token answers with NumBlocks
/// followed by every block it holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Request kind.
    pub kind: RequestKind,
    /// Requested block numbers; empty means all.
    pub blocks: Vec<u32>,
}

impl Request {
    /// Create a request for specific blocks.
    pub fn new(kind: RequestKind, blocks: Vec<u32>) -> Self {
        Self { kind, blocks }
    }

    /// Request every contact block the token holds.
    pub fn full_sweep() -> Self {
        Self::new(RequestKind::ContactData, Vec::new())
    }

    /// Check if this asks for everything.
    pub fn is_full_sweep(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Encode into one or more payloads (without checksum or sync).
    ///
    /// Each payload carries at most [`REQUEST_BLOCKS_PER_FRAME`] block
    /// numbers, so a long list becomes several back-to-back frames.
    pub fn encode_payloads(&self) -> Vec<Vec<u8>> {
        if self.blocks.is_empty() {
            return vec![self.encode_group(&[0])];
        }

        self.blocks
            .chunks(REQUEST_BLOCKS_PER_FRAME)
            .map(|group| self.encode_group(group))
            .collect()
    }

    fn encode_group(&self, blocks: &[u32]) -> Vec<u8> {
        let mut buf = Vec::with_capacity(2 + blocks.len() * BLOCK_NUMBER_SIZE);
        buf.push(MSG_REQUEST);
        buf.push(self.kind.as_byte());
        for block in blocks {
            buf.extend_from_slice(&block.to_le_bytes());
        }
        buf
    }

    /// Decode one request payload (checksum already stripped).
    ///
    /// A trailing partial block number is ignored, as the token firmware does.
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.len() < 2 {
            return Err(DecodeError::TooShort {
                expected: 2,
                actual: payload.len(),
            });
        }
        if payload[0] != MSG_REQUEST {
            return Err(DecodeError::BadMarker(payload[0]));
        }
        let kind =
            RequestKind::from_byte(payload[1]).ok_or(DecodeError::UnknownRequestKind(payload[1]))?;

        let body = &payload[2..];
        let mut blocks: Vec<u32> = (0..body.len() / BLOCK_NUMBER_SIZE)
            .map(|i| read_u32(body, i * BLOCK_NUMBER_SIZE))
            .collect();
        if blocks == [0] {
            blocks.clear();
        }

        Ok(Self { kind, blocks })
    }
}
