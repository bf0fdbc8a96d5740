//! Protocol constants shared by the host and the token firmware.
//!
//! These values are fixed by the wire protocol and MUST NOT be changed.
//! Timing values are defaults; [`crate::host::Timing`] can override them.

use std::time::Duration;

// =============================================================================
// FRAMING
// =============================================================================

/// Marker that terminates every frame on the wire (`"abcdefgh"`).
pub const SYNC_PATTERN: [u8; 8] = [97, 98, 99, 100, 101, 102, 103, 104];

/// Sync pattern length.
pub const SYNC_PATTERN_SIZE: usize = SYNC_PATTERN.len();

/// Maximum edit distance at which a run of bytes still counts as a sync marker.
pub const SYNC_MAX_EDITS: usize = 2;

/// Bytes that must follow a match before the reader trusts it.
///
/// A marker still being streamed in can fuzzy-match early with a few
/// trailing deletions; waiting for this margin lets the full marker arrive.
pub const SYNC_TRAILING_MARGIN: usize = 3;

/// Checksum byte size.
pub const CHECKSUM_SIZE: usize = 1;

// =============================================================================
// MESSAGE TAGS
// =============================================================================

/// Response: number of blocks plus device identifier.
pub const MSG_NUM_BLOCKS: u8 = 0x11;

/// Response: one block of contact identifiers.
pub const MSG_CONTACT_DATA: u8 = 0x22;

/// Response: test status (opaque, reserved for diagnostics).
pub const MSG_TEST_STATUS: u8 = 0x33;

/// First byte of every host-to-token request.
pub const MSG_REQUEST: u8 = 0xAA;

/// Request kind: testing results.
pub const REQUEST_TESTING_RESULTS: u8 = 0x00;

/// Request kind: contact data.
pub const REQUEST_CONTACT_DATA: u8 = 0x01;

// =============================================================================
// SIZES
// =============================================================================

/// Contact identifiers per block.
pub const CONTACTS_PER_BLOCK: usize = 16;

/// Contact / device identifier size (64-bit LE).
pub const ID_SIZE: usize = 8;

/// Block number size (32-bit LE).
pub const BLOCK_NUMBER_SIZE: usize = 4;

/// NumBlocks body size (count + device id).
pub const NUM_BLOCKS_BODY_SIZE: usize = BLOCK_NUMBER_SIZE + ID_SIZE;

/// ContactData body size (block number + contacts).
pub const CONTACT_DATA_BODY_SIZE: usize = BLOCK_NUMBER_SIZE + ID_SIZE * CONTACTS_PER_BLOCK;

/// Payload size the token pads every response to (tag + largest body).
pub const RESPONSE_PAYLOAD_SIZE: usize = 1 + CONTACT_DATA_BODY_SIZE;

/// Block numbers carried by a single request payload.
pub const REQUEST_BLOCKS_PER_FRAME: usize = 8;

/// Maximum block numbers requested in one retry round.
pub const MAX_REQUEST_BLOCKS: usize = 32;

// =============================================================================
// TIMING
// =============================================================================

/// Byte inactivity after which the buffered stream is force-flushed.
pub const FRAME_TIMEOUT: Duration = Duration::from_millis(200);

/// How often the inactivity watchdog checks the stream.
pub const WATCHDOG_INTERVAL: Duration = Duration::from_millis(50);

/// Time after which an unanswered request is resent.
pub const REQUEST_TIMEOUT: Duration = Duration::from_millis(500);

/// How often the retry timer checks the pending request.
pub const RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// Interval between device-presence checks before the link opens.
pub const DEVICE_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Per-call serial read timeout.
pub const READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Baud rate the token firmware runs at.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;
