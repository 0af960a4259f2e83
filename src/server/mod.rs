//! Node Server
//!
//! The UDP front of a storage node.
//!
//! ## Request Path
//! 1. Verify the envelope; corrupt datagrams are dropped without a reply.
//! 2. Replay the cached response if the message id was seen recently.
//! 3. Route key commands: execute locally if this node owns the key, otherwise relay once to the owner.
//! 4. Execute, cache the response, then send it.
//!
//! Replicate and chain messages are applied without a reply. Gossip, the cache
//! sweeper and the receive loop all stop on the same shutdown signal.

pub mod node;
pub mod router;

pub use node::NodeServer;
pub use router::{Route, route};
