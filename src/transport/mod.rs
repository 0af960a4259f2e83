//! Transport Envelope Module
//!
//! Framing and delivery guarantees on top of raw UDP datagrams.
//!
//! ## Core Mechanisms
//! - **Message identity**: A 16-byte id that embeds the sender address, a nonce and a send timestamp.
//! - **Integrity**: Each envelope carries a CRC-32 over id and payload; a mismatch drops the datagram silently.
//! - **At-most-once execution**: Responses are cached by id for a few seconds and replayed verbatim on re-delivery.

pub mod cache;
pub mod envelope;
pub mod message_id;

pub use cache::ResponseCache;
pub use envelope::{Envelope, open, seal};
pub use message_id::{MessageId, now_ns};

#[cfg(test)]
mod tests;
