//! Message processor: checksum-validated frames into per-device block batches.

use tracing::{debug, info, trace};

use super::response::Message;
use crate::core::{BlockBatch, BlockMap, DeviceId};

/// Reassembly state for the token currently on the link.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceSession {
    /// Token identifier, known once NumBlocks arrived.
    device_id: Option<DeviceId>,
    /// Announced block count; `None` until NumBlocks arrived.
    expected_blocks: Option<u32>,
    /// Blocks received since the last batch.
    blocks: BlockMap,
}

impl DeviceSession {
    /// Token identifier, if announced.
    pub fn device_id(&self) -> Option<DeviceId> {
        self.device_id
    }

    /// Announced block count, if any.
    pub fn expected_blocks(&self) -> Option<u32> {
        self.expected_blocks
    }

    /// Blocks collected since the last batch.
    pub fn blocks(&self) -> &BlockMap {
        &self.blocks
    }

    fn take_batch(&mut self) -> Option<BlockBatch> {
        Some(BlockBatch {
            device_id: self.device_id?,
            expected_blocks: self.expected_blocks?,
            blocks: std::mem::take(&mut self.blocks),
        })
    }
}

/// Decodes frames and collects contact blocks.
///
/// Invalid frames never touch the session. Batches leave the processor in
/// two ways: immediately when the token announces zero blocks, and on an
/// inactivity timeout when blocks have been collected.
#[derive(Debug, Clone, Default)]
pub struct MessageProcessor {
    session: DeviceSession,
}

impl MessageProcessor {
    /// Create a processor with an empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current session state.
    pub fn session(&self) -> &DeviceSession {
        &self.session
    }

    /// Handle one delimited frame (payload plus checksum byte).
    pub fn on_frame(&mut self, frame: &[u8]) -> Option<BlockBatch> {
        match Message::decode(frame) {
            Ok(msg) => self.on_message(msg),
            Err(e) if e.is_silent_drop() => {
                trace!(len = frame.len(), error = %e, "dropping frame");
                None
            }
            Err(e) => {
                debug!(len = frame.len(), error = %e, "dropping unreadable frame");
                None
            }
        }
    }

    /// Handle an already-validated message.
    pub fn on_message(&mut self, msg: Message) -> Option<BlockBatch> {
        match msg {
            Message::NumBlocks { count, device_id } => self.on_num_blocks(count, device_id),
            Message::ContactData { block, contacts } => {
                let Some(expected) = self.session.expected_blocks else {
                    trace!(block, "contact data before block count, ignoring");
                    return None;
                };
                if block == 0 || block > expected {
                    trace!(block, expected, "block number out of range, ignoring");
                    return None;
                }
                trace!(block, "stored block");
                self.session.blocks.insert(block, contacts);
                None
            }
            Message::TestStatus(data) => {
                debug!(len = data.len(), "test status received");
                None
            }
            Message::Unknown(tag) => {
                trace!(tag, "unknown message tag");
                None
            }
        }
    }

    fn on_num_blocks(&mut self, count: u32, device_id: DeviceId) -> Option<BlockBatch> {
        info!(%device_id, count, "expecting blocks");

        self.session.device_id = Some(device_id);
        self.session.expected_blocks = Some(count);
        self.session.blocks.retain(|&n, _| n <= count);

        if count == 0 {
            return self.session.take_batch();
        }
        None
    }

    /// Handle byte inactivity on the link.
    ///
    /// Reports whatever was collected, possibly a partial batch, so the
    /// transport can ask for what is missing.
    pub fn on_timeout(&mut self) -> Option<BlockBatch> {
        if self.session.blocks.is_empty() {
            return None;
        }
        let batch = self.session.take_batch()?;
        debug!(blocks = batch.blocks.len(), "inactivity timeout, reporting batch");
        Some(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::constants::CONTACTS_PER_BLOCK;
    use crate::framing::checksum;

    fn frame(msg: &Message) -> Vec<u8> {
        let mut frame = msg.encode();
        frame.push(checksum(&frame));
        frame
    }

    fn contact_data(block: u32) -> Message {
        let mut contacts = [0u64; CONTACTS_PER_BLOCK];
        contacts[0] = u64::from(block) * 100;
        Message::ContactData { block, contacts }
    }

    fn num_blocks(count: u32, id: u64) -> Message {
        Message::NumBlocks {
            count,
            device_id: DeviceId::new(id),
        }
    }

    #[test]
    fn test_contact_data_before_num_blocks_ignored() {
        let mut processor = MessageProcessor::new();

        assert_eq!(processor.on_frame(&frame(&contact_data(1))), None);
        assert!(processor.session().blocks().is_empty());
        assert_eq!(processor.on_timeout(), None);
    }

    #[test]
    fn test_timeout_reports_partial_batch() {
        let mut processor = MessageProcessor::new();
        processor.on_frame(&frame(&num_blocks(3, 42)));
        processor.on_frame(&frame(&contact_data(1)));
        processor.on_frame(&frame(&contact_data(3)));

        let batch = processor.on_timeout().unwrap();
        assert_eq!(batch.device_id, DeviceId::new(42));
        assert_eq!(batch.expected_blocks, 3);
        assert_eq!(batch.blocks.keys().copied().collect::<Vec<_>>(), vec![1, 3]);

        // Fresh round: nothing left to report.
        assert!(processor.session().blocks().is_empty());
        assert_eq!(processor.on_timeout(), None);
    }

    #[test]
    fn test_zero_blocks_completes_immediately() {
        let mut processor = MessageProcessor::new();
        let batch = processor.on_frame(&frame(&num_blocks(0, 7))).unwrap();

        assert_eq!(batch.device_id, DeviceId::new(7));
        assert_eq!(batch.expected_blocks, 0);
        assert!(batch.blocks.is_empty());
    }

    #[test]
    fn test_corrupted_frame_leaves_state_untouched() {
        let mut processor = MessageProcessor::new();
        let mut bad = frame(&num_blocks(5, 1));
        bad[2] ^= 0x40;

        assert_eq!(processor.on_frame(&bad), None);
        assert_eq!(processor.session(), &DeviceSession::default());
    }

    #[test]
    fn test_out_of_range_blocks_dropped() {
        let mut processor = MessageProcessor::new();
        processor.on_frame(&frame(&num_blocks(2, 9)));
        processor.on_frame(&frame(&contact_data(0)));
        processor.on_frame(&frame(&contact_data(3)));
        processor.on_frame(&frame(&contact_data(2)));

        assert_eq!(
            processor.session().blocks().keys().copied().collect::<Vec<_>>(),
            vec![2]
        );
    }

    #[test]
    fn test_later_block_overwrites() {
        let mut processor = MessageProcessor::new();
        processor.on_frame(&frame(&num_blocks(1, 9)));
        processor.on_frame(&frame(&contact_data(1)));

        let mut contacts = [0u64; CONTACTS_PER_BLOCK];
        contacts[5] = 55;
        processor.on_frame(&frame(&Message::ContactData { block: 1, contacts }));

        assert_eq!(processor.session().blocks()[&1][5], 55);
        assert_eq!(processor.session().blocks()[&1][0], 0);
    }

    #[test]
    fn test_smaller_count_prunes_blocks() {
        let mut processor = MessageProcessor::new();
        processor.on_frame(&frame(&num_blocks(3, 9)));
        processor.on_frame(&frame(&contact_data(3)));
        processor.on_frame(&frame(&num_blocks(2, 9)));

        assert!(processor.session().blocks().is_empty());
    }

    #[test]
    fn test_test_status_has_no_effect() {
        let mut processor = MessageProcessor::new();
        processor.on_frame(&frame(&num_blocks(2, 9)));
        let before = processor.session().clone();

        assert_eq!(processor.on_frame(&frame(&Message::TestStatus(vec![1]))), None);
        assert_eq!(processor.session(), &before);
    }
}
