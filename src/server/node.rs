use anyhow::{Result, bail};
use std::net::{SocketAddr, SocketAddrV4};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::task::JoinSet;

use super::router::{Route, route, unforwarded};
use crate::budget::{self, SharedBudget};
use crate::client;
use crate::config::{NodeConfig, OVERLOAD_WAIT_TIME_MS};
use crate::membership::MembershipService;
use crate::protocol::{Command, CommandKind, ErrorCode, KvRequest, KvResponse};
use crate::replication::{ChainReplicator, Outbound};
use crate::ring::HashRing;
use crate::storage::{StoreSet, Table};
use crate::transport::{MessageId, ResponseCache, now_ns, open, seal};

const RECV_BUFFER: usize = 65535;

/// One storage node: a UDP endpoint plus its membership view, ring, tables
/// and response cache.
pub struct NodeServer {
    local: SocketAddrV4,
    socket: UdpSocket,
    membership: MembershipService,
    ring: Arc<HashRing>,
    stores: Arc<StoreSet>,
    replicator: ChainReplicator,
    cache: Arc<ResponseCache>,
    config: NodeConfig,
    shutdown_tx: watch::Sender<bool>,
}

impl NodeServer {
    pub async fn bind(
        addr: SocketAddrV4,
        members: Vec<SocketAddrV4>,
        config: NodeConfig,
    ) -> Result<Arc<Self>> {
        let socket = UdpSocket::bind(addr).await?;
        Self::from_socket(socket, members, config)
    }

    pub fn from_socket(
        socket: UdpSocket,
        members: Vec<SocketAddrV4>,
        config: NodeConfig,
    ) -> Result<Arc<Self>> {
        let budget = budget::from_cap(config.max_allocation_bytes);
        Self::with_budget(socket, members, config, budget)
    }

    pub fn with_budget(
        socket: UdpSocket,
        members: Vec<SocketAddrV4>,
        config: NodeConfig,
        budget: SharedBudget,
    ) -> Result<Arc<Self>> {
        let local = match socket.local_addr()? {
            SocketAddr::V4(addr) => addr,
            SocketAddr::V6(addr) => bail!("IPv6 address {} is not supported", addr),
        };

        let membership = MembershipService::new(local, members);
        let ring = Arc::new(HashRing::new(
            membership.get_alive_members().into_iter().map(|n| n.addr),
        ));
        let stores = Arc::new(StoreSet::new(budget.clone()));
        let replicator = ChainReplicator::new(
            local,
            ring.clone(),
            stores.clone(),
            config.second_order_repair,
        );
        let cache = Arc::new(ResponseCache::new(budget, config.cache_ttl));
        let (shutdown_tx, _) = watch::channel(false);

        tracing::info!(
            "Node {} ready with {} members on the ring",
            local,
            ring.len()
        );

        Ok(Arc::new(Self {
            local,
            socket,
            membership,
            ring,
            stores,
            replicator,
            cache,
            config,
            shutdown_tx,
        }))
    }

    pub fn local_addr(&self) -> SocketAddrV4 {
        self.local
    }

    pub fn membership(&self) -> &MembershipService {
        &self.membership
    }

    pub fn ring(&self) -> &Arc<HashRing> {
        &self.ring
    }

    pub fn stores(&self) -> &Arc<StoreSet> {
        &self.stores
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    /// Stops the receive loop and the background tasks.
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    pub fn is_shut_down(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Runs the node until shutdown: announces itself, starts the cache
    /// sweeper and gossip loop, then serves datagrams.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        let sweeper_shutdown = self.shutdown_tx.subscribe();
        let gossip_shutdown = self.shutdown_tx.subscribe();
        let receive_shutdown = self.shutdown_tx.subscribe();
        if self.is_shut_down() {
            return Ok(());
        }
        tracing::info!("Starting node {}...", self.local);

        let sweeper = tokio::spawn(
            self.cache
                .clone()
                .run_sweeper(self.config.sweep_interval(), sweeper_shutdown),
        );
        let gossip = {
            let node = self.clone();
            tokio::spawn(async move { node.gossip_loop(gossip_shutdown).await })
        };

        self.announce().await;
        self.clone().receive_loop(receive_shutdown).await;

        for (name, handle) in [("sweeper", sweeper), ("gossip", gossip)] {
            if let Err(e) = handle.await {
                tracing::warn!("Background {} task failed: {}", name, e);
            }
        }
        tracing::info!("Node {} stopped", self.local);
        Ok(())
    }

    async fn receive_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut buf = vec![0u8; RECV_BUFFER];
        let mut in_flight = JoinSet::new();

        loop {
            tokio::select! {
                received = self.socket.recv_from(&mut buf) => match received {
                    Ok((len, src)) => {
                        let datagram = buf[..len].to_vec();
                        let node = self.clone();
                        in_flight.spawn(async move { node.handle_datagram(datagram, src).await });
                    }
                    Err(e) => tracing::warn!("Receive failed on {}: {}", self.local, e),
                },
                Some(done) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(e) = done {
                        tracing::error!("Request task panicked: {}", e);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::debug!("Waiting for {} in-flight requests", in_flight.len());
        while let Some(done) = in_flight.join_next().await {
            if let Err(e) = done {
                tracing::error!("Request task panicked: {}", e);
            }
        }
    }

    async fn handle_datagram(self: Arc<Self>, datagram: Vec<u8>, src: SocketAddr) {
        let (message_id, payload) = match open(&datagram) {
            Ok(opened) => opened,
            Err(e) => {
                tracing::debug!("Dropping datagram from {}: {}", src, e);
                return;
            }
        };

        let request = match KvRequest::decode(&payload) {
            Ok(request) => request,
            Err(e) => {
                tracing::debug!("Dropping undecodable request from {}: {}", src, e);
                return;
            }
        };

        if let Some(cached) = self.cache.get(&message_id) {
            // A relayed retry is answered to the client, not the relaying node.
            let reply_to = match request.command() {
                Ok(command) if command.kind() == CommandKind::Forwarded => {
                    request.client_addr().unwrap_or(src)
                }
                _ => src,
            };
            tracing::debug!("Replaying cached response for {:?}", message_id);
            self.send_payload(message_id, cached, reply_to).await;
            return;
        }

        let command = match request.command() {
            Ok(command) => command,
            Err(tag) => {
                tracing::warn!("Unknown command 0x{:02x} from {}", tag, src);
                self.respond(message_id, KvResponse::with_code(ErrorCode::UnknownCommand), src)
                    .await;
                return;
            }
        };
        tracing::trace!("{} from {}", command, src);

        match command.kind() {
            CommandKind::Client => {
                match route(&self.ring, self.local, command, &request, src) {
                    Route::Local => {
                        let response = self.execute_primary(command, &request).await;
                        self.respond(message_id, response, src).await;
                    }
                    Route::Forward { owner, request } => {
                        tracing::debug!("Forwarding {} to owner {}", command, owner);
                        self.send_request(message_id, &request, owner.into()).await;
                    }
                }
            }
            CommandKind::Forwarded => {
                let client = request.client_addr().unwrap_or(src);
                let response = self.execute_primary(unforwarded(command), &request).await;
                self.respond(message_id, response, client).await;
            }
            CommandKind::Replicate => {
                if let Err(e) = self.replicator.apply_replicate(command, &request) {
                    tracing::warn!("{} from {} not applied: {}", command, src, e);
                }
            }
            CommandKind::Chain => {
                let outbound = self.replicator.handle_chain(command, request);
                self.send_all(outbound).await;
            }
            CommandKind::Lifecycle => self.handle_lifecycle(command, message_id, src).await,
        }
    }

    /// Runs a key command against the primary table and fans successful
    /// writes out to the son and grandson.
    async fn execute_primary(&self, command: Command, request: &KvRequest) -> KvResponse {
        match command {
            Command::Get => match self.stores.get(Table::Primary, &request.key) {
                Ok((value, version)) => KvResponse {
                    value,
                    version,
                    ..KvResponse::with_code(ErrorCode::NoErr)
                },
                Err(e) => KvResponse::with_code((&e).into()),
            },
            Command::Put | Command::Remove => {
                let result = if command == Command::Put {
                    self.stores
                        .put(Table::Primary, &request.key, &request.value, request.version)
                } else {
                    self.stores.remove(Table::Primary, &request.key)
                };
                if result.is_ok() {
                    let fan_out = self.replicator.on_primary_write(
                        command,
                        &request.key,
                        &request.value,
                        request.version,
                    );
                    self.send_all(fan_out).await;
                }
                KvResponse::with_code((&result).into())
            }
            other => {
                tracing::warn!("{} is not a key command", other);
                KvResponse::with_code(ErrorCode::UnknownCommand)
            }
        }
    }

    async fn handle_lifecycle(&self, command: Command, message_id: MessageId, src: SocketAddr) {
        let response = match command {
            Command::Shutdown => {
                tracing::info!("Shutdown requested by {}", src);
                self.shutdown();
                return;
            }
            Command::Hello => {
                self.handle_hello(message_id).await;
                return;
            }
            Command::Wipeout => {
                let fan_out = self.replicator.on_wipeout();
                self.send_all(fan_out).await;
                KvResponse::with_code(ErrorCode::NoErr)
            }
            Command::IsAlive => KvResponse::with_code(ErrorCode::NoErr),
            Command::GetPid => KvResponse {
                pid: std::process::id() as i32,
                ..KvResponse::with_code(ErrorCode::NoErr)
            },
            Command::GetMembershipCount => KvResponse {
                membership_count: self.membership.get_alive_members().len() as i32,
                ..KvResponse::with_code(ErrorCode::NoErr)
            },
            Command::GetMembershipList => KvResponse {
                node_list: self.membership.snapshot(),
                ..KvResponse::with_code(ErrorCode::NoErr)
            },
            other => {
                tracing::warn!("{} is not a lifecycle command", other);
                KvResponse::with_code(ErrorCode::UnknownCommand)
            }
        };
        self.respond(message_id, response, src).await;
    }

    /// A member announced itself. The announcer and its incarnation come from
    /// the message id, not from the datagram source.
    async fn handle_hello(&self, message_id: MessageId) {
        let announcer = message_id.sender();
        if announcer == self.local {
            return;
        }
        if self.membership.get_member(&announcer).is_none() {
            tracing::warn!("HELLO from unknown node {}, ignoring", announcer);
            return;
        }

        tracing::info!("Received HELLO from {}", announcer);
        self.membership.mark_alive(&announcer, message_id.timestamp_ns());
        self.ring.add(announcer);
        let hand_offs = self.replicator.on_hello(announcer);
        self.send_all(hand_offs).await;
    }

    /// Sends HELLO to every other member.
    pub async fn announce(&self) {
        let peers: Vec<SocketAddrV4> = self
            .membership
            .snapshot()
            .into_iter()
            .map(|n| n.addr)
            .filter(|addr| *addr != self.local)
            .collect();
        tracing::info!("Announcing {} to {} peers", self.local, peers.len());

        let hellos = peers
            .into_iter()
            .map(|peer| Outbound::new(peer, KvRequest::new(Command::Hello)))
            .collect();
        self.send_all(hellos).await;
    }

    async fn gossip_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.config.gossip_interval());
        // The first tick fires immediately; let peers come up first.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => self.gossip_round().await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::debug!("Gossip loop stopping");
                        break;
                    }
                }
            }
        }
    }

    /// Pulls the member list from a random subset of alive peers and applies
    /// what was learned. A peer that does not answer is declared dead.
    pub async fn gossip_round(&self) {
        let targets = self.membership.gossip_targets();
        if targets.is_empty() {
            return;
        }

        let timeout = self.config.exchange_timeout();
        let mut pulls = JoinSet::new();
        for target in targets {
            pulls.spawn(async move { (target, client::pull_membership(target, timeout).await) });
        }

        while let Some(joined) = pulls.join_next().await {
            let (target, pulled) = match joined {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!("Gossip pull panicked: {}", e);
                    continue;
                }
            };

            match pulled {
                Ok(remote) => {
                    let outcome = self.membership.merge(remote);
                    for dead in outcome.died {
                        self.on_member_died(dead).await;
                    }
                    for revived in outcome.revived {
                        self.ring.add(revived);
                    }
                }
                Err(e) => {
                    tracing::warn!("Gossip target {} unreachable: {}", target, e);
                    self.membership.mark_dead(&target, now_ns());
                    self.on_member_died(target).await;
                }
            }
        }
    }

    async fn on_member_died(&self, dead: SocketAddrV4) {
        let notices = self.replicator.on_member_died(dead);
        self.send_all(notices).await;
    }

    /// Caches then sends a response. See [`NodeServer::cache_response`].
    async fn respond(&self, message_id: MessageId, response: KvResponse, to: SocketAddr) {
        if let Some(payload) = self.cache_response(message_id, response) {
            self.send_payload(message_id, payload, to).await;
        }
    }

    /// Encodes and caches a response.
    ///
    /// If the cache refuses the entry, the answer becomes a minimal overload
    /// response, cached in its place. If that is refused too the request is
    /// dropped and `None` is returned.
    fn cache_response(&self, message_id: MessageId, response: KvResponse) -> Option<Vec<u8>> {
        let payload = match response.encode() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!("Failed to encode response: {}", e);
                return None;
            }
        };
        if response.error_code() == Some(ErrorCode::SysOverload) {
            return Some(payload);
        }
        if self.cache.insert(message_id, payload.clone()) {
            return Some(payload);
        }

        tracing::warn!("Response cache full, answering {:?} with overload", message_id);
        let overload = KvResponse {
            overload_wait_time_ms: Some(OVERLOAD_WAIT_TIME_MS),
            ..KvResponse::with_code(ErrorCode::SysOverload)
        };
        let payload = overload.encode().ok()?;
        if self.cache.insert(message_id, payload.clone()) {
            Some(payload)
        } else {
            tracing::error!("Cannot cache overload response for {:?}, dropping request", message_id);
            None
        }
    }

    async fn send_payload(&self, message_id: MessageId, payload: Vec<u8>, to: SocketAddr) {
        let datagram = match seal(message_id, payload) {
            Ok(datagram) => datagram,
            Err(e) => {
                tracing::error!("Failed to seal datagram for {}: {}", to, e);
                return;
            }
        };
        if let Err(e) = self.socket.send_to(&datagram, to).await {
            tracing::warn!("Failed to send to {}: {}", to, e);
        }
    }

    async fn send_request(&self, message_id: MessageId, request: &KvRequest, to: SocketAddr) {
        match request.encode() {
            Ok(payload) => self.send_payload(message_id, payload, to).await,
            Err(e) => tracing::error!("Failed to encode {:?} for {}: {}", request.command(), to, e),
        }
    }

    /// Sends node-originated messages. Each gets a fresh id carrying this
    /// node's address and the send time.
    async fn send_all(&self, outbound: Vec<Outbound>) {
        for Outbound { to, request } in outbound {
            let message_id = MessageId::generate(self.local);
            self.send_request(message_id, &request, to.into()).await;
        }
    }
}
