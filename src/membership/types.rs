use serde::{Deserialize, Serialize};
use std::net::SocketAddrV4;

/// Represents a single member in the cluster.
///
/// The `incarnation` field is a logical clock (nanoseconds of the last state
/// change) used to decide which of two conflicting views wins during a merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub addr: SocketAddrV4,
    pub alive: bool,
    pub incarnation: u64,
}

impl Node {
    pub fn seeded(addr: SocketAddrV4) -> Self {
        Self {
            addr,
            alive: true,
            incarnation: 0,
        }
    }
}

/// Liveness transitions produced by merging a remote view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub died: Vec<SocketAddrV4>,
    pub revived: Vec<SocketAddrV4>,
}

impl MergeOutcome {
    pub fn is_empty(&self) -> bool {
        self.died.is_empty() && self.revived.is_empty()
    }
}
