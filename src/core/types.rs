//! Domain types shared across layers.

use std::collections::BTreeMap;
use std::fmt;

use super::constants::CONTACTS_PER_BLOCK;

/// Token identifier (64-bit, as reported in the NumBlocks message).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct DeviceId(u64);

impl DeviceId {
    /// Create a device ID from its numeric value.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Numeric value.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for DeviceId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<DeviceId> for u64 {
    fn from(id: DeviceId) -> u64 {
        id.0
    }
}

/// One block of contact identifiers. Unused slots are zero.
pub type ContactBlock = [u64; CONTACTS_PER_BLOCK];

/// Block number (1-based) to block contents.
pub type BlockMap = BTreeMap<u32, ContactBlock>;

/// A batch of blocks reported by the message processor.
///
/// Produced on NumBlocks with a zero count and on every inactivity
/// timeout that finds collected blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockBatch {
    /// Token that sent the blocks.
    pub device_id: DeviceId,
    /// Block count announced by the token.
    pub expected_blocks: u32,
    /// Blocks received since the previous batch.
    pub blocks: BlockMap,
}

/// The exposure log of one token, as handed to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ContactLog {
    /// Token that produced the log.
    pub device_id: DeviceId,
    /// Block count announced by the token.
    pub expected_blocks: u32,
    /// Reassembled blocks.
    pub blocks: BlockMap,
}

impl ContactLog {
    /// Check whether every announced block is present.
    pub fn is_complete(&self) -> bool {
        (1..=self.expected_blocks).all(|n| self.blocks.contains_key(&n))
    }

    /// Every non-zero contact identifier, in block order.
    pub fn contact_ids(&self) -> Vec<u64> {
        contact_ids(&self.blocks)
    }
}

/// Every non-zero contact identifier in `blocks`, in block order.
///
/// The token zero-pads its last block, so zero never names a contact.
pub fn contact_ids(blocks: &BlockMap) -> Vec<u64> {
    blocks
        .values()
        .flat_map(|block| block.iter().copied())
        .filter(|&id| id != 0)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(ids: &[u64]) -> ContactBlock {
        let mut block = [0u64; CONTACTS_PER_BLOCK];
        block[..ids.len()].copy_from_slice(ids);
        block
    }

    #[test]
    fn test_device_id_display() {
        assert_eq!(DeviceId::new(42).to_string(), "42");
        assert_eq!(u64::from(DeviceId::from(7)), 7);
    }

    #[test]
    fn test_contact_ids_skip_padding() {
        let mut blocks = BlockMap::new();
        blocks.insert(2, block(&[30, 40]));
        blocks.insert(1, block(&[10, 20]));

        let log = ContactLog {
            device_id: DeviceId::new(1),
            expected_blocks: 2,
            blocks,
        };

        assert_eq!(log.contact_ids(), vec![10, 20, 30, 40]);
        assert!(log.is_complete());
    }

    #[test]
    fn test_partial_log_is_incomplete() {
        let mut blocks = BlockMap::new();
        blocks.insert(1, block(&[5]));

        let log = ContactLog {
            device_id: DeviceId::new(1),
            expected_blocks: 3,
            blocks,
        };

        assert!(!log.is_complete());
    }

    #[test]
    fn test_empty_log_is_complete() {
        let log = ContactLog {
            device_id: DeviceId::new(7),
            expected_blocks: 0,
            blocks: BlockMap::new(),
        };

        assert!(log.is_complete());
        assert!(log.contact_ids().is_empty());
    }

    #[test]
    fn test_contact_ids_of_partial_map() {
        let mut blocks = BlockMap::new();
        blocks.insert(3, block(&[7, 0, 9]));

        assert_eq!(contact_ids(&blocks), vec![7, 9]);
    }
}
