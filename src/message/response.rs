//! Token-to-host response messages.
//!
//! Wire format (inside a frame, before the checksum):
//! ```text
//! NumBlocks    0x11 | count: LE32 | device_id: LE64
//! ContactData  0x22 | block: LE32 | contact: LE64 x 16
//! TestStatus   0x33 | opaque
//! ```
//!
//! The token pads NumBlocks and ContactData payloads to
//! [`RESPONSE_PAYLOAD_SIZE`] bytes; decoding only reads what it needs.

use crate::core::constants::{
    BLOCK_NUMBER_SIZE, CONTACT_DATA_BODY_SIZE, CONTACTS_PER_BLOCK, ID_SIZE, MSG_CONTACT_DATA,
    MSG_NUM_BLOCKS, MSG_TEST_STATUS, NUM_BLOCKS_BODY_SIZE, RESPONSE_PAYLOAD_SIZE,
};
use crate::core::{ContactBlock, DecodeError, DeviceId};
use crate::framing::verify_checksum;

/// A decoded response from the token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Number of blocks the token holds, and its identifier.
    NumBlocks {
        /// Block count.
        count: u32,
        /// Token identifier.
        device_id: DeviceId,
    },
    /// One block of contacts.
    ContactData {
        /// Block number (1-based).
        block: u32,
        /// Contact identifiers, zero-padded.
        contacts: ContactBlock,
    },
    /// Test status report, not interpreted.
    TestStatus(Vec<u8>),
    /// Any other tag.
    Unknown(u8),
}

impl Message {
    /// Decode a delimited frame (payload followed by its checksum byte).
    pub fn decode(frame: &[u8]) -> Result<Self, DecodeError> {
        let payload = verify_checksum(frame)?;
        let Some((&tag, body)) = payload.split_first() else {
            return Err(DecodeError::TooShort {
                expected: 2,
                actual: frame.len(),
            });
        };

        match tag {
            MSG_NUM_BLOCKS => {
                require(body, NUM_BLOCKS_BODY_SIZE)?;
                Ok(Message::NumBlocks {
                    count: read_u32(body, 0),
                    device_id: DeviceId::new(read_u64(body, BLOCK_NUMBER_SIZE)),
                })
            }
            MSG_CONTACT_DATA => {
                require(body, CONTACT_DATA_BODY_SIZE)?;
                let mut contacts = [0u64; CONTACTS_PER_BLOCK];
                for (i, contact) in contacts.iter_mut().enumerate() {
                    *contact = read_u64(body, BLOCK_NUMBER_SIZE + i * ID_SIZE);
                }
                Ok(Message::ContactData {
                    block: read_u32(body, 0),
                    contacts,
                })
            }
            MSG_TEST_STATUS => Ok(Message::TestStatus(body.to_vec())),
            other => Ok(Message::Unknown(other)),
        }
    }

    /// Encode the payload as the token sends it (without checksum or sync).
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Message::NumBlocks { count, device_id } => {
                let mut buf = Vec::with_capacity(RESPONSE_PAYLOAD_SIZE);
                buf.push(MSG_NUM_BLOCKS);
                buf.extend_from_slice(&count.to_le_bytes());
                buf.extend_from_slice(&device_id.get().to_le_bytes());
                buf.resize(RESPONSE_PAYLOAD_SIZE, 0);
                buf
            }
            Message::ContactData { block, contacts } => {
                let mut buf = Vec::with_capacity(RESPONSE_PAYLOAD_SIZE);
                buf.push(MSG_CONTACT_DATA);
                buf.extend_from_slice(&block.to_le_bytes());
                for contact in contacts {
                    buf.extend_from_slice(&contact.to_le_bytes());
                }
                buf
            }
            Message::TestStatus(data) => {
                let mut buf = Vec::with_capacity(1 + data.len());
                buf.push(MSG_TEST_STATUS);
                buf.extend_from_slice(data);
                buf
            }
            Message::Unknown(tag) => vec![*tag],
        }
    }
}

fn require(body: &[u8], size: usize) -> Result<(), DecodeError> {
    if body.len() < size {
        return Err(DecodeError::TooShort {
            expected: 1 + size,
            actual: 1 + body.len(),
        });
    }
    Ok(())
}

pub(crate) fn read_u32(data: &[u8], offset: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&data[offset..offset + 4]);
    u32::from_le_bytes(bytes)
}

fn read_u64(data: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&data[offset..offset + 8]);
    u64::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framing::checksum;

    /// Payload plus checksum, as the framer hands it over.
    fn delimited(payload: &[u8]) -> Vec<u8> {
        let mut frame = payload.to_vec();
        frame.push(checksum(payload));
        frame
    }

    #[test]
    fn test_num_blocks_from_wire_bytes() {
        let payload = hex::decode("11030000002a00000000000000").unwrap();
        let msg = Message::decode(&delimited(&payload)).unwrap();

        assert_eq!(
            msg,
            Message::NumBlocks {
                count: 3,
                device_id: DeviceId::new(42)
            }
        );
    }

    #[test]
    fn test_contact_data_decode() {
        let mut contacts = [0u64; CONTACTS_PER_BLOCK];
        contacts[0] = 0x0102_0304_0506_0708;
        contacts[15] = u64::MAX;
        let msg = Message::ContactData { block: 9, contacts };

        let payload = msg.encode();
        assert_eq!(payload.len(), RESPONSE_PAYLOAD_SIZE);
        assert_eq!(&payload[1..5], &[9, 0, 0, 0]);
        assert_eq!(&payload[5..13], &[8, 7, 6, 5, 4, 3, 2, 1]);

        assert_eq!(Message::decode(&delimited(&payload)).unwrap(), msg);
    }

    #[test]
    fn test_num_blocks_is_padded_like_firmware() {
        let msg = Message::NumBlocks {
            count: 1,
            device_id: DeviceId::new(7),
        };
        let payload = msg.encode();

        assert_eq!(payload.len(), RESPONSE_PAYLOAD_SIZE);
        assert_eq!(Message::decode(&delimited(&payload)).unwrap(), msg);
    }

    #[test]
    fn test_checksum_mismatch_rejected() {
        let mut frame = delimited(&Message::TestStatus(vec![1, 2]).encode());
        frame[1] ^= 0x01;

        assert!(matches!(
            Message::decode(&frame),
            Err(DecodeError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_truncated_contact_data_rejected() {
        let payload = [MSG_CONTACT_DATA, 1, 0, 0, 0, 0xFF];
        assert!(matches!(
            Message::decode(&delimited(&payload)),
            Err(DecodeError::TooShort { .. })
        ));
    }

    #[test]
    fn test_checksum_only_frame_rejected() {
        assert!(matches!(
            Message::decode(&[0x00]),
            Err(DecodeError::TooShort { .. })
        ));
    }

    #[test]
    fn test_test_status_and_unknown() {
        let status = Message::decode(&delimited(&[MSG_TEST_STATUS, 0x01])).unwrap();
        assert_eq!(status, Message::TestStatus(vec![0x01]));

        let unknown = Message::decode(&delimited(&[0x5A, 0x00, 0x00])).unwrap();
        assert_eq!(unknown, Message::Unknown(0x5A));
    }
}
