//! Membership & Gossip Module
//!
//! Keeps this node's view of the cluster and reconciles it with peers.
//!
//! ## Core Mechanisms
//! - **Seeded membership**: The member set comes from a static `ip:port` file; every entry starts alive.
//! - **Pull gossip**: Each round pulls the full member list from a random subset of alive peers.
//! - **Incarnations**: A liveness flip is adopted only when the remote incarnation is strictly newer.
//! - **Unilateral suspicion**: A peer that does not answer a pull is marked dead immediately.

pub mod service;
pub mod types;

pub use service::{MembershipService, gossip_fanout, load_members};
pub use types::{MergeOutcome, Node};

#[cfg(test)]
mod tests;
