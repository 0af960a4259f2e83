//! Memory admission oracle.
//!
//! Every store and cache insertion asks a [`MemoryBudget`] whether `n` more bytes
//! may be allocated. The oracle is a plain yes/no answer; it does not track
//! releases.

use std::sync::Arc;

pub trait MemoryBudget: Send + Sync {
    fn can_allocate(&self, extra_bytes: usize) -> bool;
}

/// Accepts every allocation.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unlimited;

impl MemoryBudget for Unlimited {
    fn can_allocate(&self, _extra_bytes: usize) -> bool {
        true
    }
}

/// Refuses any single allocation larger than `max_bytes`.
#[derive(Debug, Clone, Copy)]
pub struct AllocationCap {
    pub max_bytes: usize,
}

impl MemoryBudget for AllocationCap {
    fn can_allocate(&self, extra_bytes: usize) -> bool {
        extra_bytes <= self.max_bytes
    }
}

impl<F> MemoryBudget for F
where
    F: Fn(usize) -> bool + Send + Sync,
{
    fn can_allocate(&self, extra_bytes: usize) -> bool {
        self(extra_bytes)
    }
}

pub type SharedBudget = Arc<dyn MemoryBudget>;

/// Builds the budget described by an optional per-allocation cap.
pub fn from_cap(max_allocation_bytes: Option<usize>) -> SharedBudget {
    match max_allocation_bytes {
        Some(max_bytes) => Arc::new(AllocationCap { max_bytes }),
        None => Arc::new(Unlimited),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocation_cap_boundary() {
        let cap = AllocationCap { max_bytes: 64 };
        assert!(cap.can_allocate(64));
        assert!(!cap.can_allocate(65));
    }

    #[test]
    fn test_closure_budget() {
        let refuse_all = |_: usize| false;
        assert!(!refuse_all.can_allocate(1));
        assert!(from_cap(None).can_allocate(usize::MAX));
    }
}
