//! Domain error types.
//!
//! Store and transport failures are modelled as closed enums so callers can map
//! them onto wire error codes (see [`crate::protocol::ErrorCode`]). Orchestration
//! code (socket IO, gossip) uses `anyhow` instead.

use thiserror::Error;

use crate::storage::memory::{MAX_KEY_LEN, MAX_VALUE_LEN};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("key not found")]
    KeyNotFound,
    #[error("key is {0} bytes, limit is {max}", max = MAX_KEY_LEN)]
    KeyTooLong(usize),
    #[error("value is {0} bytes, limit is {max}", max = MAX_VALUE_LEN)]
    ValueTooLong(usize),
    #[error("memory budget refused {0} bytes")]
    NoSpace(usize),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("malformed datagram: {0}")]
    Malformed(#[source] bincode::Error),
    #[error("checksum mismatch: expected {expected:#x}, got {actual:#x}")]
    ChecksumMismatch { expected: u64, actual: u64 },
    #[error("codec failure: {0}")]
    Codec(#[source] bincode::Error),
}
