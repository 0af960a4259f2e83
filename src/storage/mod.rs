//! Local Storage Module
//!
//! Implements the in-memory tables a node owns.
//!
//! ## Core Concepts
//! - **Primary**: Keys the ring assigns to this node. Only client traffic (direct or forwarded) writes here.
//! - **Replica slots**: Slot 0 mirrors the father's primary, slot 1 the grandfather's. Written only by the chain protocol.
//! - **Admission**: Keys are capped at 32 bytes and values at 10000 bytes; the memory budget is consulted after both checks.
//! - **Locking**: All three tables sit behind one lock so chain shifts move data atomically.

pub mod memory;

pub use memory::{ReplicaSlot, Store, StoreEntry, StoreSet, Table};

#[cfg(test)]
mod tests;
