//! Chain Replication Module
//!
//! Keeps every key on three consecutive ring members: its owner and the
//! owner's son and grandson.
//!
//! ## Core Mechanisms
//! - **Write fan-out**: A primary mutation is pushed to the son (depth 1) and grandson (depth 2). Fire-and-forget.
//! - **Failure propagation**: The dead node's father and grandfather are told, carrying the addresses needed to re-link.
//! - **Chain shift**: The son of a dead node merges its depth-1 replica into its primary and moves the slots up.
//! - **Resurrection**: On HELLO, neighbours hand the rejoining node its replicas and the keys it owns again.

pub mod chain;

pub use chain::{ChainReplicator, Outbound};
