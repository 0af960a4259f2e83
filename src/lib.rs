//! Replicated Key-Value Store Library
//!
//! This library crate defines the modules that make up a storage node. It
//! serves as the foundation for the binary executable (`main.rs`).
//!
//! ## Architecture Modules
//! Keys are partitioned over a consistent hash ring and each key lives on
//! three consecutive members (owner, son, grandson):
//!
//! - **`transport`**: The datagram envelope. Message ids, CRC-32 integrity checks and the
//!   response cache that makes re-delivered requests replay instead of re-execute.
//! - **`protocol`**: Command tags, error codes and the request/response payloads.
//! - **`storage`**: The primary table and the two replica slots, with size limits and
//!   memory-budget admission.
//! - **`ring`**: Consistent hashing of keys and members; answers "who owns this key" and
//!   "who are my father and son".
//! - **`replication`**: Chain replication. Write fan-out, failure promotion and the
//!   hand-back of keys when a member rejoins.
//! - **`membership`**: The node list and its pull-based gossip reconciliation.
//! - **`server`**: The UDP node that ties everything together.
//! - **`client`**: Request/response exchange used by gossip, probes and tests.

pub mod budget;
pub mod client;
pub mod config;
pub mod error;
pub mod membership;
pub mod protocol;
pub mod replication;
pub mod ring;
pub mod server;
pub mod storage;
pub mod transport;
