use serde::{Deserialize, Serialize};

use super::message_id::MessageId;
use crate::error::TransportError;

/// The outer frame of every datagram.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub message_id: MessageId,
    pub payload: Vec<u8>,
    pub checksum: u64,
}

/// CRC-32 (IEEE) of `message_id ++ payload`, widened to the wire width.
pub fn checksum(message_id: &MessageId, payload: &[u8]) -> u64 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(message_id.as_bytes());
    hasher.update(payload);
    u64::from(hasher.finalize())
}

impl Envelope {
    pub fn wrap(message_id: MessageId, payload: Vec<u8>) -> Self {
        let checksum = checksum(&message_id, &payload);
        Self {
            message_id,
            payload,
            checksum,
        }
    }

    pub fn into_verified(self) -> Result<(MessageId, Vec<u8>), TransportError> {
        let expected = checksum(&self.message_id, &self.payload);
        if expected != self.checksum {
            return Err(TransportError::ChecksumMismatch {
                expected,
                actual: self.checksum,
            });
        }
        Ok((self.message_id, self.payload))
    }

    pub fn encode(&self) -> Result<Vec<u8>, TransportError> {
        bincode::serialize(self).map_err(TransportError::Codec)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, TransportError> {
        bincode::deserialize(bytes).map_err(TransportError::Malformed)
    }
}

/// Wraps and encodes in one step.
pub fn seal(message_id: MessageId, payload: Vec<u8>) -> Result<Vec<u8>, TransportError> {
    Envelope::wrap(message_id, payload).encode()
}

/// Decodes and verifies in one step.
pub fn open(datagram: &[u8]) -> Result<(MessageId, Vec<u8>), TransportError> {
    Envelope::decode(datagram)?.into_verified()
}
