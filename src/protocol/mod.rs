//! Wire Protocol
//!
//! Command tags, error codes and the request/response payloads exchanged
//! between clients and nodes and among nodes.
//!
//! ## Command Families
//! - **Client** (`PUT`, `GET`, `REMOVE`): routed by key ownership.
//! - **Forwarded** (`*_FORWARD`): a one-hop relay to the owner, carrying the client address.
//! - **Replicate** (`*_REPLICATE_SON/GRANDSON`): depth-1/2 write fan-out down the chain.
//! - **Chain** (`*_DIED`, `I_AM_YOUR_*`): chain repair after death or rejoin.
//! - **Lifecycle**: liveness, membership, shutdown, wipeout, `HELLO`.

pub mod codes;
pub mod command;
pub mod messages;

pub use codes::ErrorCode;
pub use command::{Command, CommandKind};
pub use messages::{KvRequest, KvResponse};

#[cfg(test)]
mod tests;
