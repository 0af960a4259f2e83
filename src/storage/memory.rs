use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::budget::SharedBudget;
use crate::error::StoreError;

pub const MAX_KEY_LEN: usize = 32;
pub const MAX_VALUE_LEN: usize = 10_000;
/// Bytes charged per entry on top of key and value (the version field).
const ENTRY_OVERHEAD: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreEntry {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub version: i32,
}

impl StoreEntry {
    pub fn new(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>, version: i32) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            version,
        }
    }
}

/// Which of the two replica tables an operation targets.
///
/// Slot 0 mirrors the father's primary store (depth-1 replicas), slot 1 the
/// grandfather's (depth-2 replicas).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicaSlot {
    Father = 0,
    Grandfather = 1,
}

impl ReplicaSlot {
    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Primary,
    Replica(ReplicaSlot),
}

/// An ordered key/value table with last-write-wins by key.
///
/// Lookups are linear scans: a node holds a small slice of the key space and
/// the table keeps insertion order for bulk hand-offs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Store {
    entries: Vec<StoreEntry>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<StoreEntry>) -> Self {
        let mut store = Self::new();
        store.absorb(entries);
        store
    }

    fn position(&self, key: &[u8]) -> Option<usize> {
        self.entries.iter().position(|e| e.key == key)
    }

    pub fn get(&self, key: &[u8]) -> Result<(Vec<u8>, i32), StoreError> {
        self.entries
            .iter()
            .find(|e| e.key == key)
            .map(|e| (e.value.clone(), e.version))
            .ok_or(StoreError::KeyNotFound)
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.position(key).is_some()
    }

    /// Validates sizes, asks the budget, then inserts or overwrites in place.
    pub fn put(
        &mut self,
        key: &[u8],
        value: &[u8],
        version: Option<i32>,
        budget: &SharedBudget,
    ) -> Result<(), StoreError> {
        if key.len() > MAX_KEY_LEN {
            return Err(StoreError::KeyTooLong(key.len()));
        }
        if value.len() > MAX_VALUE_LEN {
            return Err(StoreError::ValueTooLong(value.len()));
        }
        let needed = key.len() + value.len() + ENTRY_OVERHEAD;
        if !budget.can_allocate(needed) {
            return Err(StoreError::NoSpace(needed));
        }

        self.upsert(StoreEntry::new(key, value, version.unwrap_or(0)));
        Ok(())
    }

    fn upsert(&mut self, entry: StoreEntry) {
        match self.position(&entry.key) {
            Some(idx) => self.entries[idx] = entry,
            None => self.entries.push(entry),
        }
    }

    /// Removes the first entry matching `key` by swapping in the last entry.
    pub fn remove(&mut self, key: &[u8]) -> Result<StoreEntry, StoreError> {
        let idx = self.position(key).ok_or(StoreError::KeyNotFound)?;
        Ok(self.entries.swap_remove(idx))
    }

    pub fn remove_all(&mut self) {
        self.entries.clear();
    }

    /// Upserts every entry without consulting the budget.
    ///
    /// Used by chain repair, where refusing an entry would lose the only copy.
    pub fn absorb(&mut self, entries: impl IntoIterator<Item = StoreEntry>) {
        for entry in entries {
            self.upsert(entry);
        }
    }

    /// Removes and returns every entry whose key matches `predicate`.
    pub fn drain_where(&mut self, mut predicate: impl FnMut(&[u8]) -> bool) -> Vec<StoreEntry> {
        let keys: Vec<Vec<u8>> = self
            .entries
            .iter()
            .filter(|e| predicate(&e.key))
            .map(|e| e.key.clone())
            .collect();

        keys.iter().filter_map(|k| self.remove(k).ok()).collect()
    }

    pub fn entries(&self) -> &[StoreEntry] {
        &self.entries
    }

    pub fn keys(&self) -> Vec<Vec<u8>> {
        self.entries.iter().map(|e| e.key.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Default)]
struct Tables {
    primary: Store,
    replicas: [Store; 2],
}

impl Tables {
    fn table(&self, table: Table) -> &Store {
        match table {
            Table::Primary => &self.primary,
            Table::Replica(slot) => &self.replicas[slot.index()],
        }
    }

    fn table_mut(&mut self, table: Table) -> &mut Store {
        match table {
            Table::Primary => &mut self.primary,
            Table::Replica(slot) => &mut self.replicas[slot.index()],
        }
    }
}

/// The three tables of a node behind a single lock.
pub struct StoreSet {
    tables: Mutex<Tables>,
    budget: SharedBudget,
}

impl StoreSet {
    pub fn new(budget: SharedBudget) -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            budget,
        }
    }

    pub fn get(&self, table: Table, key: &[u8]) -> Result<(Vec<u8>, i32), StoreError> {
        self.tables.lock().table(table).get(key)
    }

    pub fn put(
        &self,
        table: Table,
        key: &[u8],
        value: &[u8],
        version: Option<i32>,
    ) -> Result<(), StoreError> {
        self.tables
            .lock()
            .table_mut(table)
            .put(key, value, version, &self.budget)
    }

    pub fn remove(&self, table: Table, key: &[u8]) -> Result<(), StoreError> {
        self.tables.lock().table_mut(table).remove(key).map(|_| ())
    }

    pub fn remove_all(&self, table: Table) {
        self.tables.lock().table_mut(table).remove_all();
    }

    pub fn snapshot(&self, table: Table) -> Vec<StoreEntry> {
        self.tables.lock().table(table).entries().to_vec()
    }

    pub fn len(&self, table: Table) -> usize {
        self.tables.lock().table(table).len()
    }

    /// Overwrites a replica slot with `entries`.
    pub fn replace(&self, slot: ReplicaSlot, entries: Vec<StoreEntry>) {
        self.tables.lock().replicas[slot.index()] = Store::from_entries(entries);
    }

    /// Upserts `entries` into the primary table and returns the resulting primary.
    pub fn absorb(&self, entries: Vec<StoreEntry>) -> Vec<StoreEntry> {
        let mut tables = self.tables.lock();
        tables.primary.absorb(entries);
        tables.primary.entries().to_vec()
    }

    /// Chain shift after the father died: slot 0 merges into primary, slot 1
    /// moves to slot 0 and `grandfather_data` becomes slot 1.
    ///
    /// Returns the merged primary table.
    pub fn shift_for_dead_father(&self, grandfather_data: Vec<StoreEntry>) -> Vec<StoreEntry> {
        let mut tables = self.tables.lock();
        let orphaned = std::mem::take(&mut tables.replicas[ReplicaSlot::Father.index()]);
        tables.primary.absorb(orphaned.entries);
        tables.replicas[ReplicaSlot::Father.index()] =
            std::mem::take(&mut tables.replicas[ReplicaSlot::Grandfather.index()]);
        tables.replicas[ReplicaSlot::Grandfather.index()] = Store::from_entries(grandfather_data);
        tables.primary.entries().to_vec()
    }

    /// Removes every primary entry matching `predicate` and returns them.
    pub fn drain_primary(&self, predicate: impl FnMut(&[u8]) -> bool) -> Vec<StoreEntry> {
        self.tables.lock().primary.drain_where(predicate)
    }
}
