use anyhow::{Context, Result};
use dashmap::DashMap;
use rand::seq::SliceRandom;
use std::net::SocketAddrV4;
use std::path::Path;

use super::types::{MergeOutcome, Node};

/// Number of peers contacted per gossip round for `alive` candidates.
pub fn gossip_fanout(alive: usize) -> usize {
    if alive > 4 { (alive / 5).max(4) } else { alive }
}

/// Reads a membership file of `ip:port` lines. Blank lines and `#` comments
/// are skipped.
pub fn load_members(path: impl AsRef<Path>) -> Result<Vec<SocketAddrV4>> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read membership file {}", path.display()))?;

    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| {
            line.parse::<SocketAddrV4>()
                .with_context(|| format!("invalid member address {:?}", line))
        })
        .collect()
}

/// This node's private copy of the cluster member list.
///
/// There is no single source of truth: every node holds its own view and
/// reconciles it with peers through [`MembershipService::merge`].
pub struct MembershipService {
    pub local_addr: SocketAddrV4,
    pub members: DashMap<SocketAddrV4, Node>,
}

impl MembershipService {
    pub fn new(local_addr: SocketAddrV4, seed: impl IntoIterator<Item = SocketAddrV4>) -> Self {
        let members = DashMap::new();
        for addr in seed {
            members.insert(addr, Node::seeded(addr));
        }
        members.insert(local_addr, Node::seeded(local_addr));

        Self {
            local_addr,
            members,
        }
    }

    pub fn get_member(&self, addr: &SocketAddrV4) -> Option<Node> {
        self.members.get(addr).map(|entry| entry.value().clone())
    }

    pub fn is_alive(&self, addr: &SocketAddrV4) -> bool {
        self.members.get(addr).is_some_and(|entry| entry.alive)
    }

    pub fn get_alive_members(&self) -> Vec<Node> {
        self.members
            .iter()
            .filter(|entry| entry.value().alive)
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Alive members other than this node.
    pub fn alive_peers(&self) -> Vec<SocketAddrV4> {
        self.members
            .iter()
            .filter(|entry| entry.value().alive && *entry.key() != self.local_addr)
            .map(|entry| *entry.key())
            .collect()
    }

    pub fn snapshot(&self) -> Vec<Node> {
        let mut nodes: Vec<Node> = self
            .members
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        nodes.sort_by_key(|n| n.addr);
        nodes
    }

    /// A random subset of alive peers sized by [`gossip_fanout`].
    pub fn gossip_targets(&self) -> Vec<SocketAddrV4> {
        let peers = self.alive_peers();
        let count = gossip_fanout(peers.len());
        peers
            .choose_multiple(&mut rand::thread_rng(), count)
            .copied()
            .collect()
    }

    /// Marks `addr` dead at `incarnation`. Returns true if it was alive.
    pub fn mark_dead(&self, addr: &SocketAddrV4, incarnation: u64) -> bool {
        match self.members.get_mut(addr) {
            Some(mut member) => {
                let was_alive = member.alive;
                member.alive = false;
                member.incarnation = incarnation;
                was_alive
            }
            None => {
                tracing::warn!("Cannot mark unknown member {} dead", addr);
                false
            }
        }
    }

    /// Marks `addr` alive at `incarnation`. Returns true if it was dead.
    ///
    /// Unknown addresses are not admitted: membership is fixed by the seed list.
    pub fn mark_alive(&self, addr: &SocketAddrV4, incarnation: u64) -> bool {
        match self.members.get_mut(addr) {
            Some(mut member) => {
                let was_dead = !member.alive;
                member.alive = true;
                member.incarnation = incarnation;
                was_dead
            }
            None => {
                tracing::warn!("Cannot mark unknown member {} alive", addr);
                false
            }
        }
    }

    /// Adopts remote entries whose liveness differs and whose incarnation is
    /// strictly newer. Entries about this node and addresses unknown locally
    /// are ignored.
    pub fn merge(&self, remote: Vec<Node>) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();

        for theirs in remote {
            if theirs.addr == self.local_addr {
                continue;
            }
            let Some(mut ours) = self.members.get_mut(&theirs.addr) else {
                tracing::debug!("Ignoring unknown member {} from remote view", theirs.addr);
                continue;
            };

            if ours.alive != theirs.alive && ours.incarnation < theirs.incarnation {
                tracing::info!(
                    "Member {} is now {} (inc {} -> {})",
                    theirs.addr,
                    if theirs.alive { "alive" } else { "dead" },
                    ours.incarnation,
                    theirs.incarnation
                );
                if theirs.alive {
                    outcome.revived.push(theirs.addr);
                } else {
                    outcome.died.push(theirs.addr);
                }
                *ours = theirs;
            }
        }

        outcome
    }
}
