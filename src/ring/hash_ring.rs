use parking_lot::{Mutex, MutexGuard};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::net::SocketAddrV4;
use std::ops::Bound::{Excluded, Unbounded};

pub fn hash_key(key: &[u8]) -> u32 {
    crc32fast::hash(key)
}

pub fn hash_address(addr: &SocketAddrV4) -> u32 {
    crc32fast::hash(addr.to_string().as_bytes())
}

/// A node's position relative to another node on the ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Son,
    Grandson,
    Father,
    Grandfather,
    Unrelated,
}

/// The four chain neighbours of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Neighbors {
    pub grandfather: SocketAddrV4,
    pub father: SocketAddrV4,
    pub son: SocketAddrV4,
    pub grandson: SocketAddrV4,
}

/// Consistent hash ring over member addresses.
///
/// Every operation, lookups included, goes through one exclusive lock; use
/// [`HashRing::view`] to keep that lock across a multi-step sequence.
#[derive(Debug, Default)]
pub struct HashRing {
    circle: Mutex<BTreeMap<u32, SocketAddrV4>>,
}

impl HashRing {
    pub fn new(members: impl IntoIterator<Item = SocketAddrV4>) -> Self {
        let ring = Self::default();
        {
            let mut view = ring.view();
            for addr in members {
                view.add(addr);
            }
        }
        ring
    }

    pub fn view(&self) -> RingView<'_> {
        RingView {
            circle: self.circle.lock(),
        }
    }

    pub fn add(&self, addr: SocketAddrV4) -> bool {
        self.view().add(addr)
    }

    pub fn remove(&self, addr: &SocketAddrV4) -> bool {
        self.view().remove(addr)
    }

    pub fn owner_of(&self, key: &[u8]) -> Option<SocketAddrV4> {
        self.view().owner_of(key)
    }

    pub fn successor(&self, addr: &SocketAddrV4) -> SocketAddrV4 {
        self.view().successor(addr)
    }

    pub fn predecessor(&self, addr: &SocketAddrV4) -> SocketAddrV4 {
        self.view().predecessor(addr)
    }

    pub fn contains(&self, addr: &SocketAddrV4) -> bool {
        self.view().contains(addr)
    }

    /// Members in ascending hash order.
    pub fn members(&self) -> Vec<SocketAddrV4> {
        self.view().members()
    }

    pub fn len(&self) -> usize {
        self.circle.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.circle.lock().is_empty()
    }
}

/// A locked snapshot of the ring.
pub struct RingView<'a> {
    circle: MutexGuard<'a, BTreeMap<u32, SocketAddrV4>>,
}

impl RingView<'_> {
    /// First member clockwise from the key's hash, wrapping to the lowest.
    /// `None` only for an empty ring.
    pub fn owner_of(&self, key: &[u8]) -> Option<SocketAddrV4> {
        let hash = hash_key(key);
        self.circle
            .range(hash..)
            .next()
            .or_else(|| self.circle.iter().next())
            .map(|(_, addr)| *addr)
    }

    pub fn contains(&self, addr: &SocketAddrV4) -> bool {
        self.circle.get(&hash_address(addr)) == Some(addr)
    }

    /// Returns false if `addr` was already present or its position is taken
    /// by another member, which keeps its place.
    pub fn add(&mut self, addr: SocketAddrV4) -> bool {
        match self.circle.entry(hash_address(&addr)) {
            Entry::Vacant(slot) => {
                slot.insert(addr);
                true
            }
            Entry::Occupied(slot) => {
                if *slot.get() != addr {
                    tracing::warn!(
                        "{} hashes onto the position held by {}; not adding it",
                        addr,
                        slot.get()
                    );
                }
                false
            }
        }
    }

    /// Returns false if `addr` was not on the ring.
    pub fn remove(&mut self, addr: &SocketAddrV4) -> bool {
        if !self.contains(addr) {
            return false;
        }
        self.circle.remove(&hash_address(addr)).is_some()
    }

    pub fn successor(&self, addr: &SocketAddrV4) -> SocketAddrV4 {
        if !self.contains(addr) {
            tracing::warn!("Successor requested for {} which is not on the ring", addr);
            return *addr;
        }
        let hash = hash_address(addr);
        self.circle
            .range((Excluded(hash), Unbounded))
            .next()
            .or_else(|| self.circle.iter().next())
            .map(|(_, a)| *a)
            .unwrap_or(*addr)
    }

    pub fn predecessor(&self, addr: &SocketAddrV4) -> SocketAddrV4 {
        if !self.contains(addr) {
            tracing::warn!("Predecessor requested for {} which is not on the ring", addr);
            return *addr;
        }
        let hash = hash_address(addr);
        self.circle
            .range(..hash)
            .next_back()
            .or_else(|| self.circle.iter().next_back())
            .map(|(_, a)| *a)
            .unwrap_or(*addr)
    }

    pub fn neighbors(&self, addr: &SocketAddrV4) -> Neighbors {
        let father = self.predecessor(addr);
        let son = self.successor(addr);
        Neighbors {
            grandfather: self.predecessor(&father),
            father,
            son,
            grandson: self.successor(&son),
        }
    }

    /// How `other` relates to `local`, checked in son, grandson, father,
    /// grandfather order (small rings alias several roles to one node).
    pub fn relation(&self, local: &SocketAddrV4, other: &SocketAddrV4) -> Relation {
        let n = self.neighbors(local);
        if &n.son == other {
            Relation::Son
        } else if &n.grandson == other {
            Relation::Grandson
        } else if &n.father == other {
            Relation::Father
        } else if &n.grandfather == other {
            Relation::Grandfather
        } else {
            Relation::Unrelated
        }
    }

    pub fn members(&self) -> Vec<SocketAddrV4> {
        self.circle.values().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.circle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.circle.is_empty()
    }
}
