//! Consistent Hash Ring Module
//!
//! Maps keys and node addresses onto a 32-bit CRC ring.
//!
//! ## Chain Vocabulary
//! - **Owner**: first node clockwise from a key's hash.
//! - **Son / grandson**: 1st/2nd ring successor; hold depth-1/2 replicas of a node's primary data.
//! - **Father / grandfather**: 1st/2nd ring predecessor; the source of a node's replica slots.

pub mod hash_ring;

pub use hash_ring::{HashRing, Neighbors, Relation, RingView, hash_address, hash_key};
