use parking_lot::Mutex;
use std::collections::HashSet;
use std::net::SocketAddrV4;
use std::sync::Arc;

use crate::error::StoreError;
use crate::protocol::{Command, KvRequest};
use crate::ring::{HashRing, Relation};
use crate::storage::{ReplicaSlot, StoreEntry, StoreSet, Table};

/// A message the replicator wants delivered. Sending is the caller's job.
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub to: SocketAddrV4,
    pub request: KvRequest,
}

impl Outbound {
    pub fn new(to: SocketAddrV4, request: KvRequest) -> Self {
        Self { to, request }
    }
}

/// Son/grandson fan-out tags for a primary mutation.
fn fan_out_tags(command: Command) -> Option<(Command, Command)> {
    match command {
        Command::Put | Command::PutForward => {
            Some((Command::PutReplicateSon, Command::PutReplicateGrandson))
        }
        Command::Remove | Command::RemoveForward => {
            Some((Command::RemoveReplicateSon, Command::RemoveReplicateGrandson))
        }
        Command::Wipeout => Some((
            Command::WipeoutReplicateSon,
            Command::WipeoutReplicateGrandson,
        )),
        _ => None,
    }
}

/// Chain replication over the consistent hash ring.
///
/// Each node keeps its own keys in the primary table and mirrors its father
/// and grandfather in the two replica slots. The replicator mutates local
/// tables and returns the messages other nodes need; it never touches a
/// socket, so the whole protocol can be driven in memory.
pub struct ChainReplicator {
    local: SocketAddrV4,
    ring: Arc<HashRing>,
    stores: Arc<StoreSet>,
    second_order_repair: bool,
    /// Dead fathers whose chain shift has already been applied.
    shifted: Mutex<HashSet<SocketAddrV4>>,
}

impl ChainReplicator {
    pub fn new(
        local: SocketAddrV4,
        ring: Arc<HashRing>,
        stores: Arc<StoreSet>,
        second_order_repair: bool,
    ) -> Self {
        Self {
            local,
            ring,
            stores,
            second_order_repair,
            shifted: Mutex::new(HashSet::new()),
        }
    }

    pub fn local(&self) -> SocketAddrV4 {
        self.local
    }

    pub fn ring(&self) -> &Arc<HashRing> {
        &self.ring
    }

    pub fn stores(&self) -> &Arc<StoreSet> {
        &self.stores
    }

    fn push_unless_local(&self, out: &mut Vec<Outbound>, to: SocketAddrV4, request: KvRequest) {
        if to == self.local {
            tracing::trace!("Skipping {} to self", request.command);
            return;
        }
        out.push(Outbound::new(to, request));
    }

    /// Queues a chain message, or applies it on the spot when this node is the
    /// target. Small rings make a node its own son or grandfather.
    fn push_chain(&self, out: &mut Vec<Outbound>, to: SocketAddrV4, request: KvRequest) {
        if to != self.local {
            out.push(Outbound::new(to, request));
            return;
        }
        match request.command() {
            Ok(command) => out.extend(self.handle_chain(command, request)),
            Err(tag) => tracing::warn!("Dropping local chain message with tag {:#x}", tag),
        }
    }

    /// Fan-out for a mutation that has already been applied to the primary table.
    pub fn on_primary_write(
        &self,
        command: Command,
        key: &[u8],
        value: &[u8],
        version: Option<i32>,
    ) -> Vec<Outbound> {
        let Some((son_tag, grandson_tag)) = fan_out_tags(command) else {
            tracing::warn!("{} does not replicate", command);
            return Vec::new();
        };
        let neighbors = self.ring.view().neighbors(&self.local);

        let mut out = Vec::with_capacity(2);
        for (to, tag) in [(neighbors.son, son_tag), (neighbors.grandson, grandson_tag)] {
            let request = KvRequest::new(tag)
                .with_key(key)
                .with_value(value, version);
            self.push_unless_local(&mut out, to, request);
        }
        out
    }

    /// Clears the primary table and returns the slot wipes for son and grandson.
    pub fn on_wipeout(&self) -> Vec<Outbound> {
        self.stores.remove_all(Table::Primary);
        self.on_primary_write(Command::Wipeout, &[], &[], None)
    }

    /// Applies a `*_REPLICATE_*` message to the matching replica slot.
    pub fn apply_replicate(&self, command: Command, request: &KvRequest) -> Result<(), StoreError> {
        use Command::*;
        let slot = match command {
            PutReplicateSon | RemoveReplicateSon | WipeoutReplicateSon => ReplicaSlot::Father,
            PutReplicateGrandson | RemoveReplicateGrandson | WipeoutReplicateGrandson => {
                ReplicaSlot::Grandfather
            }
            other => {
                tracing::warn!("{} is not a replicate command", other);
                return Ok(());
            }
        };
        let table = Table::Replica(slot);

        match command {
            PutReplicateSon | PutReplicateGrandson => {
                self.stores
                    .put(table, &request.key, &request.value, request.version)
            }
            RemoveReplicateSon | RemoveReplicateGrandson => {
                // The replica may never have seen the key.
                match self.stores.remove(table, &request.key) {
                    Err(StoreError::KeyNotFound) => Ok(()),
                    other => other,
                }
            }
            _ => {
                self.stores.remove_all(table);
                Ok(())
            }
        }
    }

    /// Failure propagation for a confirmed-dead member.
    ///
    /// The dead node's neighbours are read and the node is removed from the
    /// ring under one lock. Returns nothing if the node was already gone.
    pub fn on_member_died(&self, dead: SocketAddrV4) -> Vec<Outbound> {
        let neighbors = {
            let mut view = self.ring.view();
            if !view.contains(&dead) {
                return Vec::new();
            }
            let neighbors = view.neighbors(&dead);
            view.remove(&dead);
            neighbors
        };
        tracing::info!(
            "Member {} died: notifying father {} and grandfather {}",
            dead,
            neighbors.father,
            neighbors.grandfather
        );

        vec![
            Outbound::new(
                neighbors.father,
                KvRequest::new(Command::SonDied)
                    .with_addr(neighbors.grandson)
                    .with_peer(dead),
            ),
            Outbound::new(
                neighbors.grandfather,
                KvRequest::new(Command::GrandsonDied)
                    .with_addr(neighbors.son)
                    .with_peer(dead),
            ),
        ]
    }

    /// Handles a death notice or a resurrection hand-off.
    pub fn handle_chain(&self, command: Command, request: KvRequest) -> Vec<Outbound> {
        let mut out = Vec::new();

        if matches!(
            command,
            Command::SonDied
                | Command::GrandsonDied
                | Command::FatherDied
                | Command::GrandfatherDied1
                | Command::GrandfatherDied2
        ) && let Some(dead) = request.peer_addr()
            && self.ring.remove(&dead)
        {
            tracing::debug!("{} took {} off the ring", command, dead);
        }

        match command {
            Command::GrandsonDied | Command::SonDied => {
                if !self.second_order_repair {
                    tracing::debug!("Ignoring {} about {:?}", command, request.peer);
                    return out;
                }
                let Some(target) = request.relink_addr() else {
                    tracing::warn!("{} without a re-link address", command);
                    return out;
                };
                let tag = if command == Command::GrandsonDied {
                    Command::FatherDied
                } else {
                    Command::GrandfatherDied1
                };
                let mut notice = KvRequest::new(tag).with_kvs(self.stores.snapshot(Table::Primary));
                notice.peer = request.peer;
                self.push_chain(&mut out, target, notice);
            }
            Command::FatherDied => {
                if let Some(father) = request.peer_addr()
                    && !self.shifted.lock().insert(father)
                {
                    tracing::debug!("Chain already shifted for dead father {}", father);
                    return out;
                }
                let merged = self.stores.shift_for_dead_father(request.kvs);
                tracing::info!("Father died: primary now holds {} keys", merged.len());

                let neighbors = self.ring.view().neighbors(&self.local);
                for (to, tag) in [
                    (neighbors.son, Command::GrandfatherDied2),
                    (neighbors.grandson, Command::GrandfatherDied1),
                ] {
                    let mut notice = KvRequest::new(tag).with_kvs(merged.clone());
                    notice.peer = request.peer.clone();
                    self.push_chain(&mut out, to, notice);
                }
            }
            Command::GrandfatherDied1 | Command::IAmYourGrandfather => {
                self.stores.replace(ReplicaSlot::Grandfather, request.kvs);
            }
            Command::GrandfatherDied2 | Command::IAmYourFather => {
                self.stores.replace(ReplicaSlot::Father, request.kvs);
            }
            Command::IAmYourSon => {
                let primary = self.stores.absorb(request.kvs);
                out.extend(self.push_primary_down(primary));
            }
            Command::IAmYourGrandson => {
                tracing::debug!("Ignoring {}", command);
            }
            other => {
                tracing::warn!("{} is not a chain command", other);
            }
        }

        out
    }

    fn push_primary_down(&self, primary: Vec<StoreEntry>) -> Vec<Outbound> {
        let neighbors = self.ring.view().neighbors(&self.local);
        let mut out = Vec::with_capacity(2);
        self.push_chain(
            &mut out,
            neighbors.son,
            KvRequest::new(Command::IAmYourFather).with_kvs(primary.clone()),
        );
        self.push_chain(
            &mut out,
            neighbors.grandson,
            KvRequest::new(Command::IAmYourGrandfather).with_kvs(primary),
        );
        out
    }

    /// Resurrection: hands data to a member that just announced itself.
    ///
    /// Must run after the announcer is back on the ring. In rings of three or
    /// fewer the announcer can hold several relations at once; a returning
    /// father is checked first since it changes this node's own primary.
    pub fn on_hello(&self, announcer: SocketAddrV4) -> Vec<Outbound> {
        self.shifted.lock().remove(&announcer);

        let neighbors = self.ring.view().neighbors(&self.local);
        let mut out = Vec::new();

        if neighbors.father == announcer {
            let handed_back = {
                let view = self.ring.view();
                self.stores
                    .drain_primary(|key| view.owner_of(key) != Some(self.local))
            };
            tracing::info!(
                "Father {} rejoined: handing back {} keys",
                announcer,
                handed_back.len()
            );
            self.push_chain(
                &mut out,
                announcer,
                KvRequest::new(Command::IAmYourSon).with_kvs(handed_back),
            );
            // Son and grandson mirror a primary that just shrank.
            out.extend(self.push_primary_down(self.stores.snapshot(Table::Primary)));
            return out;
        }

        match self.ring.view().relation(&self.local, &announcer) {
            // The old son is now this node's grandson and needs it as grandfather.
            Relation::Son => {
                out.extend(self.push_primary_down(self.stores.snapshot(Table::Primary)));
            }
            Relation::Grandson => {
                let primary = self.stores.snapshot(Table::Primary);
                self.push_chain(
                    &mut out,
                    announcer,
                    KvRequest::new(Command::IAmYourGrandfather).with_kvs(primary),
                );
            }
            Relation::Father | Relation::Grandfather | Relation::Unrelated => {}
        }

        out
    }
}
