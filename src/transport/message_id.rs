use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::{SystemTime, UNIX_EPOCH};

/// 16-byte request identity.
///
/// ```text
///  bytes   field
///  0 - 3   sender IPv4 address
///  4 - 5   sender port (little-endian)
///  6 - 7   random nonce
///  8 - 15  send timestamp in nanoseconds (little-endian)
/// ```
///
/// Besides de-duplicating requests, node-originated ids carry the sender's
/// address and send time, which HELLO handling decodes back out.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub [u8; 16]);

impl MessageId {
    pub fn generate(sender: SocketAddrV4) -> Self {
        Self::from_parts(sender, rand::random::<u16>(), now_ns())
    }

    pub fn from_parts(sender: SocketAddrV4, nonce: u16, timestamp_ns: u64) -> Self {
        let mut id = [0u8; 16];
        id[0..4].copy_from_slice(&sender.ip().octets());
        id[4..6].copy_from_slice(&sender.port().to_le_bytes());
        id[6..8].copy_from_slice(&nonce.to_le_bytes());
        id[8..16].copy_from_slice(&timestamp_ns.to_le_bytes());
        Self(id)
    }

    /// An id with no embedded address, for probes and gossip pulls.
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().into_bytes())
    }

    pub fn sender(&self) -> SocketAddrV4 {
        let b = &self.0;
        let ip = Ipv4Addr::new(b[0], b[1], b[2], b[3]);
        let port = u16::from_le_bytes([b[4], b[5]]);
        SocketAddrV4::new(ip, port)
    }

    pub fn timestamp_ns(&self) -> u64 {
        let mut ts = [0u8; 8];
        ts.copy_from_slice(&self.0[8..16]);
        u64::from_le_bytes(ts)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Debug for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageId(")?;
        for byte in self.0 {
            write!(f, "{:02x}", byte)?;
        }
        write!(f, ")")
    }
}

pub fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}
