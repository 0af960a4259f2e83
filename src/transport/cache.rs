use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use super::message_id::MessageId;
use crate::budget::SharedBudget;

#[derive(Debug, Clone)]
struct CacheEntry {
    message_id: MessageId,
    response: Vec<u8>,
    ttl: u8,
}

/// Sent responses keyed by request id, replayed on re-delivery.
///
/// This is the only at-most-once guarantee the node gives: a request whose id
/// is still cached is answered from here and never re-executed.
pub struct ResponseCache {
    entries: Mutex<Vec<CacheEntry>>,
    budget: SharedBudget,
    ttl: u8,
}

impl ResponseCache {
    pub fn new(budget: SharedBudget, ttl: u8) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            budget,
            ttl,
        }
    }

    /// Returns false when the memory budget refuses the entry.
    pub fn insert(&self, message_id: MessageId, response: Vec<u8>) -> bool {
        let mut entries = self.entries.lock();
        if !self.budget.can_allocate(message_id.0.len() + response.len() + 1) {
            return false;
        }

        let entry = CacheEntry {
            message_id,
            response,
            ttl: self.ttl,
        };
        match entries.iter_mut().find(|e| e.message_id == message_id) {
            Some(existing) => *existing = entry,
            None => entries.push(entry),
        }
        true
    }

    pub fn get(&self, message_id: &MessageId) -> Option<Vec<u8>> {
        self.entries
            .lock()
            .iter()
            .find(|e| &e.message_id == message_id)
            .map(|e| e.response.clone())
    }

    /// Ages every entry by one tick and drops the expired ones.
    pub fn sweep(&self) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain_mut(|e| {
            e.ttl = e.ttl.saturating_sub(1);
            e.ttl > 0
        });
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub async fn run_sweeper(self: Arc<Self>, every: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(every);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let purged = self.sweep();
                    if purged > 0 {
                        tracing::trace!("Cache sweep purged {} responses", purged);
                    }
                }
                _ = shutdown.changed() => {
                    tracing::debug!("Cache sweeper stopping");
                    break;
                }
            }
        }
    }
}
