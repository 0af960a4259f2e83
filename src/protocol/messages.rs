//! Request and response payloads.
//!
//! These travel inside a [`crate::transport::Envelope`] and are encoded with
//! bincode. Field order is the schema; append new fields at the end only.

use serde::{Deserialize, Serialize};
use std::net::{SocketAddr, SocketAddrV4};

use super::codes::ErrorCode;
use super::command::Command;
use crate::error::TransportError;
use crate::membership::types::Node;
use crate::storage::memory::StoreEntry;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KvRequest {
    /// Raw command tag; unknown tags must survive decoding so the receiver can
    /// answer with `UNKNOWN_CMD_ERR`.
    pub command: u32,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub version: Option<i32>,
    /// Client address for forwarded requests; re-link target for death notices.
    pub addr: Option<String>,
    /// The node a death notice is about.
    pub peer: Option<String>,
    /// Bulk key set carried by chain repair messages.
    pub kvs: Vec<StoreEntry>,
}

impl KvRequest {
    pub fn new(command: Command) -> Self {
        Self {
            command: command.tag(),
            ..Default::default()
        }
    }

    pub fn with_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.key = key.into();
        self
    }

    pub fn with_value(mut self, value: impl Into<Vec<u8>>, version: Option<i32>) -> Self {
        self.value = value.into();
        self.version = version;
        self
    }

    pub fn with_kvs(mut self, kvs: Vec<StoreEntry>) -> Self {
        self.kvs = kvs;
        self
    }

    pub fn with_addr(mut self, addr: impl ToString) -> Self {
        self.addr = Some(addr.to_string());
        self
    }

    pub fn with_peer(mut self, peer: impl ToString) -> Self {
        self.peer = Some(peer.to_string());
        self
    }

    pub fn command(&self) -> Result<Command, u32> {
        Command::try_from(self.command)
    }

    /// Parses the embedded client address, if any.
    pub fn client_addr(&self) -> Option<SocketAddr> {
        self.addr.as_deref().and_then(|a| a.parse().ok())
    }

    /// The re-link target of a death notice.
    pub fn relink_addr(&self) -> Option<SocketAddrV4> {
        self.addr.as_deref().and_then(|a| a.parse().ok())
    }

    /// The node a death notice is about.
    pub fn peer_addr(&self) -> Option<SocketAddrV4> {
        self.peer.as_deref().and_then(|a| a.parse().ok())
    }

    pub fn encode(&self) -> Result<Vec<u8>, TransportError> {
        bincode::serialize(self).map_err(TransportError::Codec)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, TransportError> {
        bincode::deserialize(bytes).map_err(TransportError::Malformed)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KvResponse {
    pub err_code: u32,
    pub value: Vec<u8>,
    pub version: i32,
    pub pid: i32,
    pub membership_count: i32,
    pub overload_wait_time_ms: Option<i32>,
    pub node_list: Vec<Node>,
}

impl KvResponse {
    pub fn with_code(code: ErrorCode) -> Self {
        Self {
            err_code: code.code(),
            ..Default::default()
        }
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        ErrorCode::from_code(self.err_code)
    }

    pub fn encode(&self) -> Result<Vec<u8>, TransportError> {
        bincode::serialize(self).map_err(TransportError::Codec)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, TransportError> {
        bincode::deserialize(bytes).map_err(TransportError::Malformed)
    }
}
