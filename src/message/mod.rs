//! Message layer.
//!
//! - [`Message`]: typed token responses (NumBlocks, ContactData, TestStatus)
//! - [`Request`]: host requests for blocks
//! - [`MessageProcessor`]: per-device block collection with timeout batches

mod processor;
mod request;
mod response;

pub use processor::*;
pub use request::*;
pub use response::Message;
