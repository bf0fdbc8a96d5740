//! Framing layer.
//!
//! Turns a noisy, unframed byte stream into delimited frames:
//!
//! - **Fuzzy sync search**: [`find_sync`] locates the marker within two edits
//! - **Stream buffering**: [`FrameBuffer`] consumes frames and flushes stalls
//! - **Wire codec**: [`encode_frame`], [`checksum`], [`verify_checksum`]
//!
//! ```text
//! ┌──────────┬──────────┬──────────────────┐
//! │ payload  │ checksum │ sync "abcdefgh"  │
//! └──────────┴──────────┴──────────────────┘
//! ```

mod buffer;
mod codec;
mod matcher;

pub use buffer::{Flush, FrameBuffer};
pub use codec::{checksum, encode_frame, verify_checksum};
pub use matcher::{SyncMatch, find_sync};
