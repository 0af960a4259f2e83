//! Request/response exchange over UDP.
//!
//! Used by nodes for gossip pulls and liveness probes, and by tests and tools
//! as a plain key/value client. Every exchange runs on a fresh ephemeral socket
//! and waits for the datagram whose message id matches the request's.

use anyhow::{Context, Result, bail};
use std::net::{SocketAddr, SocketAddrV4};
use std::time::Duration;
use tokio::net::UdpSocket;

use crate::membership::Node;
use crate::protocol::{Command, ErrorCode, KvRequest, KvResponse};
use crate::transport::{MessageId, open, seal};

/// Attempts per exchange.
///
/// The loop below doubles the deadline between attempts, but only one attempt
/// is made: an unanswered gossip pull is treated as a failure straight away.
pub const EXCHANGE_ATTEMPTS: usize = 1;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(100);

const RECV_BUFFER: usize = 65535;

/// Sends one sealed payload and returns the verified response payload.
pub async fn exchange_raw(
    peer: SocketAddr,
    message_id: MessageId,
    payload: Vec<u8>,
    timeout: Duration,
) -> Result<Vec<u8>> {
    let bind: SocketAddr = if peer.is_ipv4() {
        "0.0.0.0:0".parse()?
    } else {
        "[::]:0".parse()?
    };
    let socket = UdpSocket::bind(bind).await?;
    let datagram = seal(message_id, payload)?;
    let mut deadline = timeout;

    for attempt in 0..EXCHANGE_ATTEMPTS {
        socket.send_to(&datagram, peer).await?;

        match tokio::time::timeout(deadline, recv_matching(&socket, message_id)).await {
            Ok(result) => return result,
            Err(_) => {
                tracing::debug!(
                    "No answer from {} within {:?} (attempt {})",
                    peer,
                    deadline,
                    attempt + 1
                );
                deadline *= 2;
            }
        }
    }

    bail!("{} did not answer after {} attempt(s)", peer, EXCHANGE_ATTEMPTS)
}

/// Reads until a datagram with `message_id` arrives. Corrupt or unrelated
/// datagrams are skipped.
async fn recv_matching(socket: &UdpSocket, message_id: MessageId) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; RECV_BUFFER];
    loop {
        let (len, src) = socket.recv_from(&mut buf).await?;
        match open(&buf[..len]) {
            Ok((id, payload)) if id == message_id => return Ok(payload),
            Ok((id, _)) => tracing::trace!("Dropping stale reply {:?} from {}", id, src),
            Err(e) => tracing::debug!("Dropping bad datagram from {}: {}", src, e),
        }
    }
}

pub async fn exchange(
    peer: SocketAddr,
    message_id: MessageId,
    request: &KvRequest,
    timeout: Duration,
) -> Result<KvResponse> {
    let payload = exchange_raw(peer, message_id, request.encode()?, timeout).await?;
    KvResponse::decode(&payload).with_context(|| format!("bad response from {}", peer))
}

/// Returns true if `peer` answers `IS_ALIVE` in time.
pub async fn probe_alive(peer: SocketAddrV4, timeout: Duration) -> bool {
    let request = KvRequest::new(Command::IsAlive);
    match exchange(peer.into(), MessageId::random(), &request, timeout).await {
        Ok(response) => response.error_code() == Some(ErrorCode::NoErr),
        Err(e) => {
            tracing::debug!("Probe of {} failed: {}", peer, e);
            false
        }
    }
}

/// Pulls the full member list of `peer`.
pub async fn pull_membership(peer: SocketAddrV4, timeout: Duration) -> Result<Vec<Node>> {
    let request = KvRequest::new(Command::GetMembershipList);
    let response = exchange(peer.into(), MessageId::random(), &request, timeout).await?;
    Ok(response.node_list)
}

/// A key/value client bound to one node.
#[derive(Debug, Clone)]
pub struct KvClient {
    target: SocketAddr,
    timeout: Duration,
}

impl KvClient {
    pub fn new(target: SocketAddr) -> Self {
        Self {
            target,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    pub async fn send(&self, request: &KvRequest) -> Result<KvResponse> {
        self.send_with_id(MessageId::random(), request).await
    }

    /// Sends under a caller-chosen id; re-using an id replays the cached answer.
    pub async fn send_with_id(&self, message_id: MessageId, request: &KvRequest) -> Result<KvResponse> {
        exchange(self.target, message_id, request, self.timeout).await
    }

    /// Sends under a caller-chosen id and returns the undecoded response payload.
    pub async fn send_raw(&self, message_id: MessageId, request: &KvRequest) -> Result<Vec<u8>> {
        exchange_raw(self.target, message_id, request.encode()?, self.timeout).await
    }

    pub async fn put(&self, key: &[u8], value: &[u8], version: Option<i32>) -> Result<KvResponse> {
        self.send(&KvRequest::new(Command::Put).with_key(key).with_value(value, version))
            .await
    }

    pub async fn get(&self, key: &[u8]) -> Result<KvResponse> {
        self.send(&KvRequest::new(Command::Get).with_key(key)).await
    }

    pub async fn remove(&self, key: &[u8]) -> Result<KvResponse> {
        self.send(&KvRequest::new(Command::Remove).with_key(key)).await
    }

    pub async fn wipeout(&self) -> Result<KvResponse> {
        self.send(&KvRequest::new(Command::Wipeout)).await
    }

    pub async fn is_alive(&self) -> Result<bool> {
        let response = self.send(&KvRequest::new(Command::IsAlive)).await?;
        Ok(response.error_code() == Some(ErrorCode::NoErr))
    }

    pub async fn pid(&self) -> Result<i32> {
        Ok(self.send(&KvRequest::new(Command::GetPid)).await?.pid)
    }

    pub async fn membership_count(&self) -> Result<i32> {
        let response = self.send(&KvRequest::new(Command::GetMembershipCount)).await?;
        Ok(response.membership_count)
    }

    pub async fn membership_list(&self) -> Result<Vec<Node>> {
        let response = self.send(&KvRequest::new(Command::GetMembershipList)).await?;
        Ok(response.node_list)
    }

    /// Fire-and-forget: a node never answers `SHUTDOWN`.
    pub async fn shutdown(&self) -> Result<()> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let payload = KvRequest::new(Command::Shutdown).encode()?;
        socket
            .send_to(&seal(MessageId::random(), payload)?, self.target)
            .await?;
        Ok(())
    }
}
